//! Persistence gateways consumed by the hub and the HTTP surface.
//!
//! Backed by real databases in production and by in-memory maps in tests
//! and single-process deployments (see [`memory`]).

use std::fmt;

use async_trait::async_trait;

use crate::models::message::MessagePreview;
use crate::models::user::User;

pub mod memory;

pub use memory::{MemoryChatStore, MemorySessionStore};

/// Error returned by a persistence gateway.
#[derive(Debug)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StoreError {}

/// Chat membership checks and message persistence.
///
/// The hub calls `is_member` once per subscribe and `store_message` once per
/// publish; both calls run inside the hub loop under a bounded timeout.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Whether the user belongs to the given chat.
    async fn is_member(&self, user_id: &str, chat_id: i64) -> Result<bool, StoreError>;

    /// Durably store a message and return the preview projection that is
    /// fanned out to subscribers.
    async fn store_message(
        &self,
        sender: &User,
        chat_id: i64,
        text: &str,
    ) -> Result<MessagePreview, StoreError>;
}

/// Session-token resolution used by the gateway upgrade handler.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Resolve a session token to its user. `None` means unknown or expired.
    async fn resolve(&self, token: &str) -> Result<Option<User>, StoreError>;
}
