//! Store error taxonomy.

use thiserror::Error;

/// Errors surfaced by the session and message stores.
///
/// The fatal variants follow the process-ending policy for the backing
/// store: presence correctness cannot be guaranteed against a store that
/// rejects our credentials or cannot be reached, so the owning worker must
/// stop and let the supervising pool replace it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing-store credential failure. Fatal, non-retriable.
    #[error("store authorization failed: {0}")]
    Unauthorized(String),

    /// Backing store unreachable. Fatal for presence-critical callers.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure; propagates to the attempted operation.
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the owning process should terminate rather than continue
    /// with a possibly stale or partial view.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::Unavailable(_))
    }
}
