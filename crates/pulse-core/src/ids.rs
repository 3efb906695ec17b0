//! Opaque identifiers used throughout the relay.
//!
//! `SessionId` is client-supplied and stable across reconnects; `UserId` is
//! minted server-side on first authentication and never changes afterwards.
//! `SocketId` names one live connection, `WorkerId` one worker process.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Client-supplied session identifier, stable across reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty session identifier is never valid for authentication.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Server-minted user identifier, immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Number of random bytes behind a minted id (16 hex chars).
    const MINT_BYTES: usize = 8;

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh, unguessable user identifier.
    ///
    /// Uses the OS entropy source so ids are collision-resistant across
    /// worker processes that mint concurrently.
    #[must_use]
    pub fn mint() -> Self {
        let mut bytes = [0u8; Self::MINT_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let mut hex = String::with_capacity(Self::MINT_BYTES * 2);
        for b in bytes {
            use fmt::Write;
            // infallible for String
            let _ = write!(hex, "{b:02x}");
        }
        Self(hex)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier for one live socket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocketId(uuid::Uuid);

impl SocketId {
    /// Generate a fresh socket identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for one worker process in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(u32);

impl WorkerId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn into_inner(self) -> u32 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

impl From<u32> for WorkerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}
