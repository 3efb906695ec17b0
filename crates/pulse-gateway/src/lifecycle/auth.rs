//! Handshake authentication.

use pulse_core::{SessionId, StoreError, UserId};
use thiserror::Error;

/// Authentication failures, surfaced to the client as a rejected upgrade.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No session identifier in the handshake
    #[error("invalid username")]
    InvalidUsername,

    /// The session store could not be consulted
    #[error("session lookup failed: {0}")]
    Store(#[from] StoreError),
}

/// The identity a connection assumes after authentication.
///
/// Either resumed from a stored session or freshly minted for an unknown
/// session identifier.
#[derive(Debug, Clone)]
pub struct Identity {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub username: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
