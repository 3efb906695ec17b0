//! Application error types
//!
//! Unified error handling at the binary boundary.

use pulse_core::StoreError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Whether the owning worker process should terminate.
    ///
    /// Store credential/connectivity failures are process-ending; the
    /// supervising pool replaces the worker. Everything else propagates to
    /// the attempted operation.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Store(e) => e.is_fatal(),
            Self::Config(_) | Self::Server(_) => true,
            Self::Bus(_) | Self::Internal(_) => false,
        }
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
