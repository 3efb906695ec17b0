//! Private-message storage in Redis.
//!
//! Each message is RPUSHed onto both participants' lists so that
//! "messages involving user X" is a single LRANGE. Append-only, no
//! retention policy.

use crate::pool::RedisPool;
use async_trait::async_trait;
use pulse_core::{MessageRecord, MessageStore, StoreResult, UserId};

/// Key prefix for per-user message lists
const MESSAGES_PREFIX: &str = "messages:";

/// Redis-backed message store.
#[derive(Debug, Clone)]
pub struct RedisMessageStore {
    pool: RedisPool,
}

impl RedisMessageStore {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn messages_key(user_id: &UserId) -> String {
        format!("{MESSAGES_PREFIX}{user_id}")
    }
}

#[async_trait]
impl MessageStore for RedisMessageStore {
    async fn save_message(&self, message: &MessageRecord) -> StoreResult<()> {
        self.pool
            .rpush(&Self::messages_key(&message.from), message)
            .await?;

        // A self-addressed message lives in one list only.
        if message.from != message.to {
            self.pool
                .rpush(&Self::messages_key(&message.to), message)
                .await?;
        }

        tracing::debug!(from = %message.from, to = %message.to, "Saved message");

        Ok(())
    }

    async fn messages_for_user(&self, user_id: &UserId) -> StoreResult<Vec<MessageRecord>> {
        let raw = self.pool.lrange_all(&Self::messages_key(user_id)).await?;

        let mut messages = Vec::with_capacity(raw.len());
        for item in raw {
            match serde_json::from_str::<MessageRecord>(&item) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Skipping malformed message record");
                }
            }
        }

        Ok(messages)
    }
}
