mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Helper: connect an authenticated WebSocket client.
async fn connect(addr: SocketAddr, token: &str) -> WsClient {
    let url = format!("ws://{addr}/gateway?token={token}");
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws
}

/// Helper: send one JSON value as a text frame.
async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    ws.send(tungstenite::Message::Text(value.to_string().into()))
        .await
        .expect("ws send");
}

/// Helper: read the next text frame as JSON, with a timeout.
async fn read_json(ws: &mut WsClient) -> serde_json::Value {
    let msg = time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timeout waiting for frame")
        .expect("stream ended")
        .expect("ws read error");
    let text = msg.into_text().expect("not text");
    serde_json::from_str(&text).expect("parse frame")
}

/// Helper: assert no frame arrives within a short window.
async fn assert_silent(ws: &mut WsClient) {
    let outcome = time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(outcome.is_err(), "expected no frame, got: {outcome:?}");
}

fn subscribe_frame(chat_id: i64) -> serde_json::Value {
    serde_json::json!({ "action": "subscribe", "body": { "chat_id": chat_id } })
}

fn message_frame(chat_id: i64, message: &str) -> serde_json::Value {
    serde_json::json!({ "action": "send_message", "body": { "chat_id": chat_id, "message": message } })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_ok() {
    let backend = common::start_backend().await;

    let resp = reqwest::get(format!("http://{}/health", backend.addr))
        .await
        .expect("health request");
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.expect("parse health body");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn gateway_rejects_unknown_token() {
    let backend = common::start_backend().await;

    let url = format!("ws://{}/gateway?token=ses_bogus", backend.addr);
    let err = tokio_tungstenite::connect_async(&url)
        .await
        .expect_err("upgrade should be rejected");

    match err {
        tungstenite::Error::Http(resp) => assert_eq!(resp.status(), 401),
        other => panic!("expected HTTP rejection, got: {other:?}"),
    }
}

#[tokio::test]
async fn gateway_rejects_deactivated_account() {
    let backend = common::start_backend().await;
    let (_mallory, token) = backend.deactivated_user_with_session("mallory");

    let url = format!("ws://{}/gateway?token={token}", backend.addr);
    let err = tokio_tungstenite::connect_async(&url)
        .await
        .expect_err("upgrade should be rejected");

    match err {
        tungstenite::Error::Http(resp) => assert_eq!(resp.status(), 403),
        other => panic!("expected HTTP rejection, got: {other:?}"),
    }
}

#[tokio::test]
async fn gateway_delivers_messages_to_subscribers() {
    let backend = common::start_backend().await;
    let (alice, alice_token) = backend.user_with_session("alice");
    let (_bob, bob_token) = backend.user_with_session("bob");
    backend.chats.create_chat(10, &[&alice.id]);

    let mut alice_ws = connect(backend.addr, &alice_token).await;
    let mut bob_ws = connect(backend.addr, &bob_token).await;

    // alice subscribes and publishes; bob is connected but never subscribes.
    send_json(&mut alice_ws, subscribe_frame(10)).await;
    send_json(&mut alice_ws, message_frame(10, "hi")).await;

    let frame = read_json(&mut alice_ws).await;
    assert_eq!(frame["content"], "hi");
    assert_eq!(frame["sender_username"], "alice");
    assert_eq!(frame["is_edited"], false);
    assert_eq!(frame["is_read"], false);
    assert!(frame["id"].as_str().unwrap().starts_with("msg_"));
    assert!(frame["created_at"].is_string());

    assert_silent(&mut bob_ws).await;

    // The message was persisted through the gateway.
    let stored = backend.chats.messages_in(10);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "hi");
    assert_eq!(stored[0].sender_id, alice.id);
}

#[tokio::test]
async fn gateway_rejects_subscribe_without_membership() {
    let backend = common::start_backend().await;
    let (alice, alice_token) = backend.user_with_session("alice");
    let (_eve, eve_token) = backend.user_with_session("eve");
    backend.chats.create_chat(10, &[&alice.id]);

    let mut alice_ws = connect(backend.addr, &alice_token).await;
    let mut eve_ws = connect(backend.addr, &eve_token).await;

    // eve is not a member of chat 10.
    send_json(&mut eve_ws, subscribe_frame(10)).await;
    let frame = read_json(&mut eve_ws).await;
    assert_eq!(frame["error"], "not a member of chat 10");

    // A member's messages never reach her.
    send_json(&mut alice_ws, subscribe_frame(10)).await;
    send_json(&mut alice_ws, message_frame(10, "members only")).await;
    assert_eq!(read_json(&mut alice_ws).await["content"], "members only");

    assert_silent(&mut eve_ws).await;
}

#[tokio::test]
async fn gateway_survives_malformed_frames() {
    let backend = common::start_backend().await;
    let (alice, token) = backend.user_with_session("alice");
    backend.chats.create_chat(10, &[&alice.id]);

    let mut ws = connect(backend.addr, &token).await;

    // Invalid JSON is reported, not fatal.
    ws.send(tungstenite::Message::Text("this is not json".to_string().into()))
        .await
        .expect("ws send");
    let frame = read_json(&mut ws).await;
    assert_eq!(frame["error"], "invalid message envelope");

    // The same connection still works afterwards.
    send_json(&mut ws, subscribe_frame(10)).await;
    send_json(&mut ws, message_frame(10, "still here")).await;
    assert_eq!(read_json(&mut ws).await["content"], "still here");
}

#[tokio::test]
async fn gateway_reports_unknown_actions() {
    let backend = common::start_backend().await;
    let (_alice, token) = backend.user_with_session("alice");

    let mut ws = connect(backend.addr, &token).await;

    send_json(
        &mut ws,
        serde_json::json!({ "action": "wave", "body": {} }),
    )
    .await;
    let frame = read_json(&mut ws).await;
    assert_eq!(frame["error"], "unknown action: wave");
}

#[tokio::test]
async fn gateway_enforces_message_length() {
    let backend = common::start_backend().await;
    let (alice, token) = backend.user_with_session("alice");
    backend.chats.create_chat(10, &[&alice.id]);

    let mut ws = connect(backend.addr, &token).await;
    send_json(&mut ws, subscribe_frame(10)).await;

    let oversized = "x".repeat(201);
    send_json(&mut ws, message_frame(10, &oversized)).await;
    let frame = read_json(&mut ws).await;
    assert_eq!(frame["error"], "message must be 200 characters or fewer");

    // Nothing was stored or delivered.
    assert!(backend.chats.messages_in(10).is_empty());
    assert_silent(&mut ws).await;
}

#[tokio::test]
async fn gateway_unsubscribe_stops_delivery() {
    let backend = common::start_backend().await;
    let (alice, alice_token) = backend.user_with_session("alice");
    let (carol, carol_token) = backend.user_with_session("carol");
    backend.chats.create_chat(10, &[&alice.id, &carol.id]);

    let mut alice_ws = connect(backend.addr, &alice_token).await;
    let mut carol_ws = connect(backend.addr, &carol_token).await;

    send_json(&mut alice_ws, subscribe_frame(10)).await;
    send_json(&mut carol_ws, subscribe_frame(10)).await;

    // Give carol's subscribe a moment to land before alice publishes from
    // a different connection.
    time::sleep(Duration::from_millis(100)).await;

    send_json(&mut alice_ws, message_frame(10, "first")).await;
    assert_eq!(read_json(&mut alice_ws).await["content"], "first");
    assert_eq!(read_json(&mut carol_ws).await["content"], "first");

    send_json(
        &mut alice_ws,
        serde_json::json!({ "action": "unsubscribe", "body": { "chat_id": 10 } }),
    )
    .await;
    send_json(&mut alice_ws, message_frame(10, "second")).await;

    assert_eq!(read_json(&mut carol_ws).await["content"], "second");
    assert_silent(&mut alice_ws).await;
}
