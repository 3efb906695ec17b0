//! Bus error types.

use thiserror::Error;

/// Errors surfaced by the fan-out bus.
///
/// A transport failure must reach the caller: silently returning an empty
/// membership set would falsely declare a user disconnected.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus transport error: {0}")]
    Transport(String),

    #[error("failed to parse bus message: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("bus control channel closed")]
    Closed,
}

impl From<redis::RedisError> for BusError {
    fn from(e: redis::RedisError) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<deadpool_redis::PoolError> for BusError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;
