//! In-memory store implementations.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;

use parley_common::id::{prefix, prefixed_ulid};

use crate::models::message::{MessagePreview, StoredMessage};
use crate::models::user::User;

use super::{ChatStore, SessionStore, StoreError};

/// Chat membership and message log held in process memory.
pub struct MemoryChatStore {
    rooms: DashMap<i64, HashSet<String>>,
    messages: Mutex<Vec<StoredMessage>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Create a chat with the given members, replacing any existing one.
    pub fn create_chat(&self, chat_id: i64, member_ids: &[&str]) {
        let members = member_ids.iter().map(|id| id.to_string()).collect();
        self.rooms.insert(chat_id, members);
    }

    /// All stored messages for a chat, in insertion order.
    pub fn messages_in(&self, chat_id: i64) -> Vec<StoredMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect()
    }
}

impl Default for MemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn is_member(&self, user_id: &str, chat_id: i64) -> Result<bool, StoreError> {
        Ok(self
            .rooms
            .get(&chat_id)
            .is_some_and(|members| members.contains(user_id)))
    }

    async fn store_message(
        &self,
        sender: &User,
        chat_id: i64,
        text: &str,
    ) -> Result<MessagePreview, StoreError> {
        let now = Utc::now();
        let record = StoredMessage {
            id: prefixed_ulid(prefix::MESSAGE),
            chat_id,
            sender_id: sender.id.clone(),
            content: text.to_string(),
            created_at: now,
        };

        let preview = MessagePreview {
            id: record.id.clone(),
            content: record.content.clone(),
            sender_username: sender.username.clone(),
            is_edited: false,
            is_read: false,
            updated_at: now,
            created_at: now,
        };

        self.messages.lock().push(record);
        Ok(preview)
    }
}

/// Session tokens held in process memory.
pub struct MemorySessionStore {
    sessions: DashMap<String, User>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Register a session token for a user and return the token.
    pub fn create_session(&self, user: User) -> String {
        let token = prefixed_ulid(prefix::SESSION);
        self.sessions.insert(token.clone(), user);
        token
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn resolve(&self, token: &str) -> Result<Option<User>, StoreError> {
        Ok(self.sessions.get(token).map(|entry| entry.value().clone()))
    }
}
