//! The hub actor: single owner of the connection registry and all room
//! subscriptions.
//!
//! Registry state is loop-local to one spawned task, so no locks guard it.
//! Everything else in the process talks to the hub through [`HubHandle`],
//! which feeds the intent channel; intents from one connection are processed
//! in the order its read loop produced them.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time;

use crate::hub::connection::Connection;
use crate::hub::events::ServerFrame;
use crate::store::ChatStore;

/// Capacity of the shared intent channel. Read loops suspend on send when
/// the hub falls this far behind; that suspension is the sole inbound
/// backpressure point.
const INTENT_CAPACITY: usize = 1024;

/// An instruction sent from a read loop to the hub.
#[derive(Debug)]
pub enum Intent {
    Register(Connection),
    Unregister {
        connection_id: String,
    },
    Subscribe {
        connection_id: String,
        chat_id: i64,
    },
    Unsubscribe {
        connection_id: String,
        chat_id: i64,
    },
    Publish {
        connection_id: String,
        chat_id: i64,
        text: String,
    },
}

/// Error returned when the hub task has stopped.
#[derive(Debug)]
pub struct HubUnavailable;

impl fmt::Display for HubUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("hub is no longer running")
    }
}

impl std::error::Error for HubUnavailable {}

/// Cloneable handle used by connection tasks to reach the hub.
#[derive(Clone)]
pub struct HubHandle {
    intents: mpsc::Sender<Intent>,
}

impl HubHandle {
    pub async fn register(&self, conn: Connection) -> Result<(), HubUnavailable> {
        self.send(Intent::Register(conn)).await
    }

    pub async fn unregister(&self, connection_id: &str) -> Result<(), HubUnavailable> {
        self.send(Intent::Unregister {
            connection_id: connection_id.to_string(),
        })
        .await
    }

    pub async fn subscribe(&self, connection_id: &str, chat_id: i64) -> Result<(), HubUnavailable> {
        self.send(Intent::Subscribe {
            connection_id: connection_id.to_string(),
            chat_id,
        })
        .await
    }

    pub async fn unsubscribe(
        &self,
        connection_id: &str,
        chat_id: i64,
    ) -> Result<(), HubUnavailable> {
        self.send(Intent::Unsubscribe {
            connection_id: connection_id.to_string(),
            chat_id,
        })
        .await
    }

    pub async fn publish(
        &self,
        connection_id: &str,
        chat_id: i64,
        text: String,
    ) -> Result<(), HubUnavailable> {
        self.send(Intent::Publish {
            connection_id: connection_id.to_string(),
            chat_id,
            text,
        })
        .await
    }

    async fn send(&self, intent: Intent) -> Result<(), HubUnavailable> {
        self.intents.send(intent).await.map_err(|_| HubUnavailable)
    }
}

struct ClientEntry {
    conn: Connection,
    rooms: HashSet<i64>,
}

/// The hub itself. Constructed and consumed by [`Hub::spawn`]; only the
/// spawned task ever touches `clients`.
pub struct Hub {
    store: Arc<dyn ChatStore>,
    store_timeout: Duration,
    clients: HashMap<String, ClientEntry>,
}

impl Hub {
    /// Spawn the hub task and return the handle used to reach it. The task
    /// runs until every handle is dropped and the intent channel closes.
    pub fn spawn(store: Arc<dyn ChatStore>, store_timeout: Duration) -> HubHandle {
        let (tx, rx) = mpsc::channel(INTENT_CAPACITY);
        let hub = Hub {
            store,
            store_timeout,
            clients: HashMap::new(),
        };
        tokio::spawn(hub.run(rx));
        HubHandle { intents: tx }
    }

    async fn run(mut self, mut intents: mpsc::Receiver<Intent>) {
        while let Some(intent) = intents.recv().await {
            self.handle(intent).await;
        }
        tracing::info!("hub intent channel closed, shutting down");
    }

    async fn handle(&mut self, intent: Intent) {
        match intent {
            Intent::Register(conn) => {
                tracing::info!(
                    connection_id = %conn.id,
                    user_id = %conn.user.id,
                    connected = self.clients.len() + 1,
                    "connection registered"
                );
                self.clients.insert(
                    conn.id.clone(),
                    ClientEntry {
                        conn,
                        rooms: HashSet::new(),
                    },
                );
            }
            Intent::Unregister { connection_id } => {
                // No-op for ids that were never registered or already left.
                if let Some(entry) = self.clients.remove(&connection_id) {
                    tracing::info!(
                        connection_id = %connection_id,
                        user_id = %entry.conn.user.id,
                        connected = self.clients.len(),
                        "connection unregistered"
                    );
                }
            }
            Intent::Subscribe {
                connection_id,
                chat_id,
            } => self.subscribe(&connection_id, chat_id).await,
            Intent::Unsubscribe {
                connection_id,
                chat_id,
            } => {
                if let Some(entry) = self.clients.get_mut(&connection_id) {
                    entry.rooms.remove(&chat_id);
                    tracing::debug!(connection_id = %connection_id, chat_id, "unsubscribed");
                }
            }
            Intent::Publish {
                connection_id,
                chat_id,
                text,
            } => self.publish(&connection_id, chat_id, text).await,
        }
    }

    /// Add `chat_id` to the connection's subscription set, gated on a
    /// membership check. Membership is verified once, here, never on
    /// individual messages.
    async fn subscribe(&mut self, connection_id: &str, chat_id: i64) {
        // Stale intent from a connection that already unregistered.
        let Some(conn) = self.clients.get(connection_id).map(|e| e.conn.clone()) else {
            return;
        };

        let verdict = time::timeout(
            self.store_timeout,
            self.store.is_member(&conn.user.id, chat_id),
        )
        .await;

        match verdict {
            Ok(Ok(true)) => {
                if let Some(entry) = self.clients.get_mut(connection_id) {
                    entry.rooms.insert(chat_id);
                    tracing::debug!(connection_id = %connection_id, chat_id, "subscribed");
                }
            }
            Ok(Ok(false)) => {
                self.reject(&conn, format!("not a member of chat {chat_id}"));
            }
            Ok(Err(err)) => {
                tracing::error!(%err, connection_id = %connection_id, chat_id, "membership check failed");
                self.reject(&conn, "subscription failed");
            }
            Err(_) => {
                tracing::error!(connection_id = %connection_id, chat_id, "membership check timed out");
                self.reject(&conn, "subscription failed");
            }
        }
    }

    /// Store the message, then fan the preview out to every connection
    /// subscribed to the room (the sender included, if subscribed).
    async fn publish(&mut self, connection_id: &str, chat_id: i64, text: String) {
        let Some(sender) = self.clients.get(connection_id).map(|e| e.conn.clone()) else {
            return;
        };

        let stored = time::timeout(
            self.store_timeout,
            self.store.store_message(&sender.user, chat_id, &text),
        )
        .await;

        let preview = match stored {
            Ok(Ok(preview)) => preview,
            Ok(Err(err)) => {
                tracing::error!(%err, chat_id, sender_id = %sender.user.id, "failed to store message");
                self.reject(&sender, "message could not be delivered");
                return;
            }
            Err(_) => {
                tracing::error!(chat_id, sender_id = %sender.user.id, "message store timed out");
                self.reject(&sender, "message could not be delivered");
                return;
            }
        };

        // One encode; every mailbox gets a cheap clone of the same bytes.
        let frame = ServerFrame::Preview(preview).encode();

        let mut stale = Vec::new();
        for (id, entry) in &self.clients {
            if !entry.rooms.contains(&chat_id) {
                continue;
            }
            match entry.conn.try_deliver(frame.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(connection_id = %id, chat_id, "mailbox full, dropping frame");
                }
                Err(TrySendError::Closed(_)) => stale.push(id.clone()),
            }
        }

        // Connections whose write loop is gone; unregister will also arrive
        // eventually, but there is no point keeping them until then.
        for id in stale {
            self.clients.remove(&id);
            tracing::debug!(connection_id = %id, "removed connection with closed mailbox");
        }
    }

    fn reject(&self, conn: &Connection, reason: impl Into<String>) {
        if conn.try_deliver(ServerFrame::error(reason).encode()).is_err() {
            tracing::debug!(connection_id = %conn.id, "could not deliver error frame");
        }
    }
}
