//! Private message records.

use crate::ids::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One private message. Immutable once created, append-only storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub from: UserId,
    pub to: UserId,
    pub content: String,
}

impl MessageRecord {
    #[must_use]
    pub fn new(from: UserId, to: UserId, content: impl Into<String>) -> Self {
        Self {
            from,
            to,
            content: content.into(),
        }
    }

    /// The conversation partner from `me`'s point of view.
    #[must_use]
    pub fn counterpart(&self, me: &UserId) -> &UserId {
        if &self.from == me {
            &self.to
        } else {
            &self.from
        }
    }
}

/// Group a user's message history by conversation partner, preserving
/// storage order within each conversation. Used to annotate the roster
/// snapshot delivered on connect.
#[must_use]
pub fn group_by_counterpart(me: &UserId, messages: Vec<MessageRecord>) -> HashMap<UserId, Vec<MessageRecord>> {
    let mut per_user: HashMap<UserId, Vec<MessageRecord>> = HashMap::new();
    for message in messages {
        let other = message.counterpart(me).clone();
        per_user.entry(other).or_default().push(message);
    }
    per_user
}
