pub mod config;
pub mod error;
pub mod hub;
pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use config::Config;
use hub::coordinator::HubHandle;
use store::{ChatStore, SessionStore};

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<dyn SessionStore>,
    pub chats: Arc<dyn ChatStore>,
    pub hub: HubHandle,
}
