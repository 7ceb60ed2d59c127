//! Live-class channel frames.
//!
//! Presence, chat and typing frames are routed by their top-level `type`.
//! Poll, question and reaction traffic shares one `live_class_update`
//! envelope and is routed by `update_type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{FRAME_UPDATE_TYPE, FrameError, Id, field, frame_type, parse, payload};

/// A user present in a live class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUser {
    pub user_id: Id,
    #[serde(default)]
    pub user_name: String,
}

/// A chat line broadcast to the class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub user_id: Id,
    #[serde(default)]
    pub user_name: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// Second-level events carried by the `live_class_update` envelope.
#[derive(Clone, Debug, PartialEq)]
pub enum LiveClassUpdate {
    PollCreated(Value),
    PollUpdated(Value),
    PollStatusChanged(Value),
    NewQuestion(Value),
    QuestionAnswered(Value),
    QuestionUpvoted(Value),
    Reaction(Value),
    /// An `update_type` this client does not know.
    Unknown { update_type: String },
}

impl LiveClassUpdate {
    /// Decode the envelope of a `live_class_update` frame.
    ///
    /// `update_type` is read from the top level first, then from the nested
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::MissingField`] when no `update_type` is present.
    pub fn decode(frame: &Value) -> Result<Self, FrameError> {
        let data = payload(frame);
        let update_type = frame
            .get(FRAME_UPDATE_TYPE)
            .or_else(|| data.get(FRAME_UPDATE_TYPE))
            .and_then(Value::as_str)
            .ok_or_else(|| FrameError::MissingField {
                kind: LiveClassEvent::UPDATE.to_owned(),
                field: FRAME_UPDATE_TYPE,
            })?;

        let data = data.clone();
        Ok(match update_type {
            "poll_created" => Self::PollCreated(data),
            "poll_updated" => Self::PollUpdated(data),
            "poll_status_changed" => Self::PollStatusChanged(data),
            "new_question" => Self::NewQuestion(data),
            "question_answered" => Self::QuestionAnswered(data),
            "question_upvoted" => Self::QuestionUpvoted(data),
            "reaction" => Self::Reaction(data),
            other => Self::Unknown { update_type: other.to_owned() },
        })
    }
}

/// Inbound events on the live-class channel.
#[derive(Clone, Debug, PartialEq)]
pub enum LiveClassEvent {
    Update(LiveClassUpdate),
    ChatMessage(ChatMessage),
    UserJoined(OnlineUser),
    UserLeft { user_id: Id },
    /// Authoritative presence snapshot.
    OnlineUsers(Vec<OnlineUser>),
    UserTyping(OnlineUser),
    UserStoppedTyping { user_id: Id },
    Unknown { kind: String },
}

impl LiveClassEvent {
    pub const UPDATE: &'static str = "live_class_update";

    /// Decode a raw frame.
    ///
    /// # Errors
    ///
    /// Returns an error when the discriminator is missing or a known frame
    /// kind carries a malformed payload. Unknown kinds are not errors.
    pub fn decode(frame: &Value) -> Result<Self, FrameError> {
        let kind = frame_type(frame)?;
        let data = payload(frame);
        Ok(match kind {
            Self::UPDATE => Self::Update(LiveClassUpdate::decode(frame)?),
            "chat_message" => Self::ChatMessage(parse(kind, data)?),
            "user_joined" => Self::UserJoined(parse(kind, data)?),
            "user_left" => Self::UserLeft { user_id: field(kind, data, "user_id")? },
            "online_users" => Self::OnlineUsers(field(kind, data, "users")?),
            "user_typing" => Self::UserTyping(parse(kind, data)?),
            "user_stopped_typing" => Self::UserStoppedTyping { user_id: field(kind, data, "user_id")? },
            other => Self::Unknown { kind: other.to_owned() },
        })
    }
}

#[cfg(test)]
#[path = "live_class_test.rs"]
mod tests;
