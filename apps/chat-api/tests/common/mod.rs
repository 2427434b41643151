use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chat_api::config::Config;
use chat_api::hub::coordinator::Hub;
use chat_api::models::user::{User, UserRole};
use chat_api::store::{MemoryChatStore, MemorySessionStore};
use chat_api::AppState;

use parley_common::id::{prefix, prefixed_ulid};

pub struct TestBackend {
    pub addr: SocketAddr,
    pub sessions: Arc<MemorySessionStore>,
    pub chats: Arc<MemoryChatStore>,
}

/// Start a real TCP server backed by in-memory stores. The server runs in
/// the background for the rest of the test.
pub async fn start_backend() -> TestBackend {
    let config = Arc::new(Config {
        port: 0,
        store_timeout: Duration::from_secs(2),
    });
    let sessions = Arc::new(MemorySessionStore::new());
    let chats = Arc::new(MemoryChatStore::new());
    let hub = Hub::spawn(chats.clone(), config.store_timeout);

    let state = AppState {
        config,
        sessions: sessions.clone(),
        chats: chats.clone(),
        hub,
    };
    let app = chat_api::routes::router().with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestBackend { addr, sessions, chats }
}

impl TestBackend {
    /// Create a user plus a session token for it.
    pub fn user_with_session(&self, username: &str) -> (User, String) {
        let user = User {
            id: prefixed_ulid(prefix::USER),
            username: username.to_string(),
            role: UserRole::Member,
            is_active: true,
        };
        let token = self.sessions.create_session(user.clone());
        (user, token)
    }

    /// Create a deactivated user plus a session token for it.
    pub fn deactivated_user_with_session(&self, username: &str) -> (User, String) {
        let user = User {
            id: prefixed_ulid(prefix::USER),
            username: username.to_string(),
            role: UserRole::Member,
            is_active: false,
        };
        let token = self.sessions.create_session(user.clone());
        (user, token)
    }
}
