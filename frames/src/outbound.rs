//! Frames sent by the client.

use serde::Serialize;

/// Client-originated frame. Serializes to `{"type": "...", ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Typing,
    StopTyping,
    ChatMessage { message: String },
}
