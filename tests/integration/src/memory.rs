//! In-memory store doubles.
//!
//! Mirror the Redis implementations' merge and first-save semantics so
//! lifecycle tests exercise the same contract.

use async_trait::async_trait;
use dashmap::DashMap;
use pulse_core::{
    MessageRecord, MessageStore, SessionId, SessionPatch, SessionRecord, SessionStore, StoreError,
    StoreResult, UserId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// In-memory session store
#[derive(Default)]
pub struct MemorySessionStore {
    records: DashMap<SessionId, SessionRecord>,
    fail_saves: AtomicBool,
    fail_next_find_all: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves fail with a non-fatal backend error
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make the next `find_all_sessions` fail with a non-fatal backend error
    pub fn fail_next_find_all(&self) {
        self.fail_next_find_all.store(true, Ordering::SeqCst);
    }

    /// Direct record access for assertions
    pub fn record(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.records.get(session_id).map(|r| r.clone())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find_session(&self, session_id: &SessionId) -> StoreResult<Option<SessionRecord>> {
        Ok(self.records.get(session_id).map(|r| r.clone()))
    }

    async fn save_session(&self, session_id: &SessionId, patch: SessionPatch) -> StoreResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected save failure".into()));
        }

        match self.records.get_mut(session_id) {
            Some(mut record) => {
                record.apply(patch);
                Ok(())
            }
            None => {
                if !patch.creates_identity() {
                    return Err(StoreError::Backend(format!(
                        "first save of session {session_id} must carry an identity"
                    )));
                }
                let user_id = patch
                    .user_id
                    .clone()
                    .ok_or_else(|| StoreError::Backend("missing user_id".into()))?;
                let mut record = SessionRecord::new(session_id.clone(), user_id);
                record.apply(patch);
                self.records.insert(session_id.clone(), record);
                Ok(())
            }
        }
    }

    async fn find_all_sessions(&self) -> StoreResult<Vec<SessionRecord>> {
        if self.fail_next_find_all.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected scan failure".into()));
        }
        Ok(self.records.iter().map(|r| r.clone()).collect())
    }
}

/// In-memory message store
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: Mutex<Vec<MessageRecord>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<MessageRecord> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn save_message(&self, message: &MessageRecord) -> StoreResult<()> {
        self.messages
            .lock()
            .map_err(|_| StoreError::Backend("poisoned lock".into()))?
            .push(message.clone());
        Ok(())
    }

    async fn messages_for_user(&self, user_id: &UserId) -> StoreResult<Vec<MessageRecord>> {
        Ok(self
            .messages
            .lock()
            .map_err(|_| StoreError::Backend("poisoned lock".into()))?
            .iter()
            .filter(|m| m.from == *user_id || m.to == *user_id)
            .cloned()
            .collect())
    }
}
