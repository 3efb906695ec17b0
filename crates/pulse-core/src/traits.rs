//! Store traits (ports) - define the interface for persistence.
//!
//! The domain layer defines what it needs; the infrastructure layer
//! (`pulse-store`) provides the Redis implementation, and tests provide
//! in-memory doubles.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::ids::{SessionId, UserId};
use crate::message::MessageRecord;
use crate::session::{SessionPatch, SessionRecord};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared persistent map of presence state, visible to every worker.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up a session by its client-supplied identifier.
    async fn find_session(&self, session_id: &SessionId) -> StoreResult<Option<SessionRecord>>;

    /// Upsert-merge: fields present in the patch overwrite, absent fields
    /// are left as stored. Creating a fresh record requires the patch to
    /// carry `user_id` and `username`.
    async fn save_session(&self, session_id: &SessionId, patch: SessionPatch) -> StoreResult<()>;

    /// Full roster, unordered. Used to answer "fetch existing users" on a
    /// new connection.
    async fn find_all_sessions(&self) -> StoreResult<Vec<SessionRecord>>;
}

/// Append-only log of private messages, queryable by participant.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message. Callers treat failure as best-effort (logged, not
    /// fatal) - a lost message must not crash the relay path.
    async fn save_message(&self, message: &MessageRecord) -> StoreResult<()>;

    /// Every record where the user is sender or recipient, in storage order.
    async fn messages_for_user(&self, user_id: &UserId) -> StoreResult<Vec<MessageRecord>>;
}
