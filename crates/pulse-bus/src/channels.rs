//! Pub/Sub channel definitions.
//!
//! Defines the channel naming conventions on the underlying transport.

use pulse_core::UserId;

/// Channel prefix for per-user room events
pub const USER_CHANNEL_PREFIX: &str = "user:";
/// Channel for broadcast events (all connected clients)
pub const BROADCAST_CHANNEL: &str = "broadcast";
/// Channel every worker listens on for membership queries
pub const MEMBERS_QUERY_CHANNEL: &str = "members:query";
/// Channel prefix for membership query replies
pub const MEMBERS_REPLY_PREFIX: &str = "members:reply:";

/// Bus channel types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BusChannel {
    /// Events for one user's room (all of their sockets, on any worker)
    User(UserId),
    /// Broadcast to all connected clients
    Broadcast,
    /// Membership scatter-gather request channel
    MembersQuery,
    /// One query's reply channel, keyed by request id
    MembersReply(String),
    /// Unrecognized channel name
    Other(String),
}

impl BusChannel {
    #[must_use]
    pub fn user(user_id: UserId) -> Self {
        Self::User(user_id)
    }

    #[must_use]
    pub fn reply(request_id: impl Into<String>) -> Self {
        Self::MembersReply(request_id.into())
    }

    /// Get the transport channel name
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::User(id) => format!("{USER_CHANNEL_PREFIX}{id}"),
            Self::Broadcast => BROADCAST_CHANNEL.to_string(),
            Self::MembersQuery => MEMBERS_QUERY_CHANNEL.to_string(),
            Self::MembersReply(id) => format!("{MEMBERS_REPLY_PREFIX}{id}"),
            Self::Other(name) => name.clone(),
        }
    }

    /// Parse a channel name back to a `BusChannel`
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name == BROADCAST_CHANNEL {
            return Self::Broadcast;
        }
        if name == MEMBERS_QUERY_CHANNEL {
            return Self::MembersQuery;
        }
        if let Some(id) = name.strip_prefix(MEMBERS_REPLY_PREFIX) {
            return Self::MembersReply(id.to_string());
        }
        if let Some(id) = name.strip_prefix(USER_CHANNEL_PREFIX) {
            return Self::User(UserId::new(id));
        }
        Self::Other(name.to_string())
    }
}

impl std::fmt::Display for BusChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
