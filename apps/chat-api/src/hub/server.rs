//! WebSocket upgrade handler and the per-connection read/write loops.

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::ApiError;
use crate::hub::connection::Connection;
use crate::hub::coordinator::HubHandle;
use crate::hub::events::{decode_request, ClientRequest, ServerFrame};
use crate::models::user::User;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

#[derive(Debug, Deserialize)]
struct GatewayParams {
    /// Session token issued by the auth layer. Query parameter because
    /// browser WebSocket clients cannot set request headers.
    token: String,
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<GatewayParams>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .sessions
        .resolve(&params.token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    if !user.is_active {
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    let hub = state.hub.clone();
    Ok(ws.on_upgrade(move |socket| accept_connection(socket, user, hub)))
}

/// Entry point for an authenticated socket: registers with the hub, runs the
/// read and write loops, and unregisters when either side fails.
pub async fn accept_connection(socket: WebSocket, user: User, hub: HubHandle) {
    let (ws_tx, ws_rx) = socket.split();
    let (conn, mailbox_rx) = Connection::new(user);

    if hub.register(conn.clone()).await.is_err() {
        tracing::error!(connection_id = %conn.id, "hub unavailable, dropping connection");
        return;
    }

    tracing::info!(
        connection_id = %conn.id,
        user_id = %conn.user.id,
        username = %conn.user.username,
        "connection established"
    );

    let mut write_task = tokio::spawn(write_loop(ws_tx, mailbox_rx));
    let mut read_task = tokio::spawn(read_loop(ws_rx, conn.clone(), hub.clone()));

    // Whichever loop exits first tears down the other, so a dead write side
    // cannot leave a half-alive registered connection behind.
    tokio::select! {
        _ = &mut write_task => read_task.abort(),
        _ = &mut read_task => write_task.abort(),
    }

    let _ = hub.unregister(&conn.id).await;

    tracing::info!(
        connection_id = %conn.id,
        user_id = %conn.user.id,
        "connection closed"
    );
}

/// Turn inbound frames into hub intents. Protocol errors are reported to
/// this connection only and never terminate the loop; socket failure does.
async fn read_loop(mut ws_rx: SplitStream<WebSocket>, conn: Connection, hub: HubHandle) {
    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Binary(_)) => continue,
            Ok(Message::Close(_)) => break,
            Err(err) => {
                tracing::debug!(?err, connection_id = %conn.id, "ws read error");
                break;
            }
        };

        let request = match decode_request(&text) {
            Ok(request) => request,
            Err(reason) => {
                // Local error: straight into our own mailbox, no hub trip.
                if conn.deliver(ServerFrame::error(reason).encode()).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let sent = match request {
            ClientRequest::Subscribe { chat_id } => hub.subscribe(&conn.id, chat_id).await,
            ClientRequest::Unsubscribe { chat_id } => hub.unsubscribe(&conn.id, chat_id).await,
            ClientRequest::SendMessage { chat_id, message } => {
                hub.publish(&conn.id, chat_id, message).await
            }
        };
        if sent.is_err() {
            tracing::error!(connection_id = %conn.id, "hub unavailable, closing connection");
            break;
        }
    }
}

/// Drain the mailbox into the socket. Frames are already serialized; a write
/// error ends the loop and, via the teardown select, the connection.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut mailbox: mpsc::Receiver<Utf8Bytes>,
) {
    while let Some(frame) = mailbox.recv().await {
        if ws_tx.send(Message::Text(frame)).await.is_err() {
            break;
        }
    }
}
