//! Discussion-thread channel frames.

use serde_json::Value;

use crate::{FrameError, Id, field, frame_type, parse, payload};
use crate::live_class::OnlineUser;

/// Inbound events on a discussion-thread channel.
#[derive(Clone, Debug, PartialEq)]
pub enum DiscussionEvent {
    NewReply(Value),
    ReplyUpdated(Value),
    ReplyDeleted { reply_id: Id },
    ThreadUpdated(Value),
    UserTyping(OnlineUser),
    UserStoppedTyping { user_id: Id },
    Unknown { kind: String },
}

impl DiscussionEvent {
    /// Decode a raw frame.
    ///
    /// # Errors
    ///
    /// Returns an error when the discriminator is missing or a known frame
    /// kind carries a malformed payload.
    pub fn decode(frame: &Value) -> Result<Self, FrameError> {
        let kind = frame_type(frame)?;
        let data = payload(frame);
        Ok(match kind {
            "new_reply" => Self::NewReply(data.clone()),
            "reply_updated" => Self::ReplyUpdated(data.clone()),
            "reply_deleted" => Self::ReplyDeleted { reply_id: field(kind, data, "reply_id")? },
            "thread_updated" => Self::ThreadUpdated(data.clone()),
            "user_typing" => Self::UserTyping(parse(kind, data)?),
            "user_stopped_typing" => Self::UserStoppedTyping { user_id: field(kind, data, "user_id")? },
            other => Self::Unknown { kind: other.to_owned() },
        })
    }
}

#[cfg(test)]
#[path = "discussion_test.rs"]
mod tests;
