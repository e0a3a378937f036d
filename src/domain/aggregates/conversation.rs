//! Conversation between a customer and its assigned employee.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{ConversationId, MessageId, UserId};
use crate::{Result, ShopError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub subject: String,
    pub participants: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub author_id: UserId,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn open(subject: impl Into<String>, participants: Vec<UserId>) -> Self {
        let now = Utc::now();
        Self { id: ConversationId::new(), subject: subject.into(), participants, created_at: now, modified_at: now }
    }

    pub fn has_participant(&self, user_id: UserId) -> bool { self.participants.contains(&user_id) }

    /// Writes a new message and marks the conversation as modified.
    pub fn post(&mut self, author_id: UserId, content: impl Into<String>) -> Result<Message> {
        let content = content.into();
        if content.trim().is_empty() { return Err(ShopError::Validation("message is empty".into())); }
        let message = Message {
            id: MessageId::new(), conversation_id: self.id, author_id,
            content, is_read: false, created_at: Utc::now(),
        };
        self.modified_at = message.created_at;
        Ok(message)
    }
}

/// Keeps the `last` most recent of chronologically ordered messages.
pub fn most_recent(mut messages: Vec<Message>, last: Option<usize>) -> Vec<Message> {
    if let Some(n) = last {
        let skip = messages.len().saturating_sub(n);
        messages.drain(..skip);
    }
    messages
}
