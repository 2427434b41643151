//! Per-connection state shared between the hub and the socket loops.

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendError, TrySendError};

use parley_common::id::{prefix, prefixed_ulid};

use crate::models::user::User;

/// Capacity of a connection's outbound mailbox. Fan-out enqueues are
/// non-blocking, so a reader this far behind starts losing frames.
pub const MAILBOX_CAPACITY: usize = 256;

/// Handle to one live WebSocket connection.
///
/// Identity is fixed at upgrade time. Room subscriptions live in the hub's
/// registry, not here; only the hub reads or writes them.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: String,
    pub user: User,
    mailbox: mpsc::Sender<Utf8Bytes>,
}

impl Connection {
    /// Create a connection and the receiving half of its mailbox. The write
    /// loop is the receiver's sole consumer.
    pub fn new(user: User) -> (Self, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let conn = Self {
            id: prefixed_ulid(prefix::CONNECTION),
            user,
            mailbox: tx,
        };
        (conn, rx)
    }

    /// Queue a frame, waiting for mailbox space. Used by the connection's
    /// own read loop for local protocol errors, where suspending only slows
    /// this connection down.
    pub async fn deliver(&self, frame: Utf8Bytes) -> Result<(), SendError<Utf8Bytes>> {
        self.mailbox.send(frame).await
    }

    /// Non-blocking enqueue used by hub fan-out. A full or closed mailbox
    /// must never stall delivery to other connections.
    pub fn try_deliver(&self, frame: Utf8Bytes) -> Result<(), TrySendError<Utf8Bytes>> {
        self.mailbox.try_send(frame)
    }
}
