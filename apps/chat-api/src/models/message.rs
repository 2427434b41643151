use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Projection of a stored message, delivered to subscribed connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePreview {
    pub id: String,
    pub content: String,
    pub sender_username: String,
    pub is_edited: bool,
    pub is_read: bool,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A message record as persisted by the chat store.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: String,
    pub chat_id: i64,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
