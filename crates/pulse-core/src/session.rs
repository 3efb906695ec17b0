//! Session records and the explicit merge patch.
//!
//! A session is a durable identity: the client-supplied `session_id` maps to
//! a server-minted `user_id` that never changes once assigned. Records are
//! never deleted; a disconnect flips `connected` and clears the position.

use crate::ids::{SessionId, UserId};
use serde::{Deserialize, Serialize};

/// Stored presence state for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub user_id: UserId,
    /// Display label; equals `session_id` for freshly created identities.
    pub username: String,
    pub connected: bool,
    /// Last known position while online, cleared on disconnect.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl SessionRecord {
    /// Create a record for a freshly minted identity.
    #[must_use]
    pub fn new(session_id: SessionId, user_id: UserId) -> Self {
        let username = session_id.as_str().to_string();
        Self {
            session_id,
            user_id,
            username,
            connected: false,
            latitude: None,
            longitude: None,
        }
    }

    /// Apply a patch, overwriting only the fields it carries.
    ///
    /// `user_id` and `username` in a patch are honored (first save needs
    /// them) but an existing identity is never silently rewritten to a
    /// different user: callers uphold the `session_id -> user_id`
    /// immutability invariant by construction.
    pub fn apply(&mut self, patch: SessionPatch) {
        if let Some(username) = patch.username {
            self.username = username;
        }
        if let Some(connected) = patch.connected {
            self.connected = connected;
        }
        if let Some(latitude) = patch.latitude {
            self.latitude = latitude;
        }
        if let Some(longitude) = patch.longitude {
            self.longitude = longitude;
        }
    }
}

/// Explicit merge patch over a [`SessionRecord`].
///
/// Replaces the original's implicit partial-object upsert: every optional
/// field is named, so a caller cannot accidentally drop required fields on
/// first creation. Position fields are double-optional - `Some(None)`
/// clears a stored position, `None` leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    /// Required on the first save of an unknown session id.
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<Option<f64>>,
}

impl SessionPatch {
    /// Patch carrying the full state of a newly authenticated connection.
    #[must_use]
    pub fn connect(user_id: UserId, username: impl Into<String>, latitude: Option<f64>, longitude: Option<f64>) -> Self {
        Self {
            user_id: Some(user_id),
            username: Some(username.into()),
            connected: Some(true),
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    /// Patch for a position update while connected.
    #[must_use]
    pub fn position(latitude: Option<f64>, longitude: Option<f64>) -> Self {
        Self {
            user_id: None,
            username: None,
            connected: Some(true),
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    /// Patch marking the session offline with its position cleared.
    #[must_use]
    pub fn disconnect() -> Self {
        Self {
            user_id: None,
            username: None,
            connected: Some(false),
            latitude: Some(None),
            longitude: Some(None),
        }
    }

    /// Whether this patch can create a record from scratch.
    #[must_use]
    pub fn creates_identity(&self) -> bool {
        self.user_id.is_some() && self.username.is_some()
    }
}
