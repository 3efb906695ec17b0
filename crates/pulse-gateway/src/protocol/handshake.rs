//! Handshake query parsing.
//!
//! Clients authenticate via query parameters on the upgrade request:
//! `username` is the client-supplied session identifier, `latitd`/`longitd`
//! an optional initial position.

use serde::Deserialize;

/// Raw handshake parameters from the upgrade request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Handshake {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    latitd: Option<String>,
    #[serde(default)]
    longitd: Option<String>,
}

impl Handshake {
    /// The session identifier, if one was presented and non-empty.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.username.as_deref().filter(|s| !s.is_empty())
    }

    /// Initial latitude; unparsable values are treated as absent.
    #[must_use]
    pub fn latitude(&self) -> Option<f64> {
        self.latitd.as_deref().and_then(|s| s.parse().ok())
    }

    /// Initial longitude; unparsable values are treated as absent.
    #[must_use]
    pub fn longitude(&self) -> Option<f64> {
        self.longitd.as_deref().and_then(|s| s.parse().ok())
    }
}
