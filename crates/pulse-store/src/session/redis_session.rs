//! Session storage in Redis.
//!
//! One JSON record per session under `session:{session_id}`. The record is
//! never deleted; a disconnect flips `connected` and clears the position.
//! Concurrent writers are last-write-wins per field set, which is
//! acceptable because fields updated by different operations largely do
//! not overlap.

use crate::pool::RedisPool;
use async_trait::async_trait;
use pulse_core::{SessionId, SessionPatch, SessionRecord, SessionStore, StoreError, StoreResult};

/// Key prefix for session records
const SESSION_PREFIX: &str = "session:";
/// SCAN batch size for roster queries
const SCAN_COUNT: usize = 100;

/// Redis-backed session store shared by all worker processes.
#[derive(Debug, Clone)]
pub struct RedisSessionStore {
    pool: RedisPool,
}

impl RedisSessionStore {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn session_key(session_id: &SessionId) -> String {
        format!("{SESSION_PREFIX}{session_id}")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn find_session(&self, session_id: &SessionId) -> StoreResult<Option<SessionRecord>> {
        let key = Self::session_key(session_id);
        let record = self.pool.get_value(&key).await?;
        Ok(record)
    }

    async fn save_session(&self, session_id: &SessionId, patch: SessionPatch) -> StoreResult<()> {
        let key = Self::session_key(session_id);

        // Read-merge-write; not atomic across workers, see module docs.
        let mut record = match self.pool.get_value::<SessionRecord>(&key).await? {
            Some(existing) => existing,
            None => {
                let user_id = patch.user_id.clone().ok_or_else(|| {
                    StoreError::Backend(format!(
                        "first save of session {session_id} must carry an identity"
                    ))
                })?;
                SessionRecord::new(session_id.clone(), user_id)
            }
        };

        record.apply(patch);
        self.pool.set(&key, &record).await?;

        tracing::debug!(
            session_id = %session_id,
            user_id = %record.user_id,
            connected = record.connected,
            "Saved session"
        );

        Ok(())
    }

    async fn find_all_sessions(&self) -> StoreResult<Vec<SessionRecord>> {
        let pattern = format!("{SESSION_PREFIX}*");
        let keys = self.pool.scan_keys(&pattern, SCAN_COUNT).await?;

        let mut sessions = Vec::with_capacity(keys.len());
        for key in keys {
            match self.pool.get_value::<SessionRecord>(&key).await {
                Ok(Some(record)) => sessions.push(record),
                // Deleted between SCAN and GET; skip.
                Ok(None) => {}
                Err(e) => {
                    let err = StoreError::from(e);
                    if err.is_fatal() {
                        return Err(err);
                    }
                    tracing::warn!(key = %key, error = %err, "Skipping unreadable session record");
                }
            }
        }

        Ok(sessions)
    }
}
