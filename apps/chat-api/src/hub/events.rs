//! Wire-format frames exchanged over the gateway WebSocket.

use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::message::MessagePreview;

pub const ACTION_SUBSCRIBE: &str = "subscribe";
pub const ACTION_UNSUBSCRIBE: &str = "unsubscribe";
pub const ACTION_SEND_MESSAGE: &str = "send_message";

/// Maximum length of a chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 200;

/// Envelope received from the client. The body is decoded in a second step
/// once the action is known.
#[derive(Debug, Deserialize)]
pub struct ClientEnvelope {
    pub action: String,
    #[serde(default)]
    pub body: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChatRef {
    pub chat_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub chat_id: i64,
    pub message: String,
}

/// A fully decoded client request.
#[derive(Debug, PartialEq)]
pub enum ClientRequest {
    Subscribe { chat_id: i64 },
    Unsubscribe { chat_id: i64 },
    SendMessage { chat_id: i64, message: String },
}

/// Decode a raw text frame into a [`ClientRequest`].
///
/// The returned error string is what the offending connection sees in its
/// error frame; it never terminates the read loop.
pub fn decode_request(text: &str) -> Result<ClientRequest, String> {
    let envelope: ClientEnvelope =
        serde_json::from_str(text).map_err(|_| "invalid message envelope".to_string())?;

    match envelope.action.as_str() {
        ACTION_SUBSCRIBE => {
            let body: ChatRef = serde_json::from_value(envelope.body)
                .map_err(|_| "invalid subscribe body".to_string())?;
            Ok(ClientRequest::Subscribe {
                chat_id: body.chat_id,
            })
        }
        ACTION_UNSUBSCRIBE => {
            let body: ChatRef = serde_json::from_value(envelope.body)
                .map_err(|_| "invalid unsubscribe body".to_string())?;
            Ok(ClientRequest::Unsubscribe {
                chat_id: body.chat_id,
            })
        }
        ACTION_SEND_MESSAGE => {
            let body: SendMessageBody = serde_json::from_value(envelope.body)
                .map_err(|_| "invalid send_message body".to_string())?;
            if body.message.is_empty() {
                return Err("message must not be empty".to_string());
            }
            if body.message.chars().count() > MAX_MESSAGE_CHARS {
                return Err(format!(
                    "message must be {MAX_MESSAGE_CHARS} characters or fewer"
                ));
            }
            Ok(ClientRequest::SendMessage {
                chat_id: body.chat_id,
                message: body.message,
            })
        }
        other => Err(format!("unknown action: {other}")),
    }
}

/// Frame sent from the server to a connection.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Preview(MessagePreview),
    Error { error: String },
}

impl ServerFrame {
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            error: reason.into(),
        }
    }

    /// Serialize to the shared wire representation. One encode per frame:
    /// the same bytes are cloned into every recipient mailbox.
    pub fn encode(&self) -> Utf8Bytes {
        serde_json::to_string(self)
            .expect("server frames always serialize")
            .into()
    }
}
