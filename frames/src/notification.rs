//! Notification channel frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{FrameError, Id, frame_type, parse, payload};

/// Delivery priority of a notification. Unrecognized values fall back to
/// [`Priority::Normal`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl From<String> for Priority {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            "urgent" => Self::Urgent,
            _ => Self::Normal,
        }
    }
}

/// A single user notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Id,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    /// Server-side category (`notification_type` on the wire).
    #[serde(default, alias = "notification_type")]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub action_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, alias = "is_read")]
    pub read: bool,
}

/// Inbound events on the notification channel.
#[derive(Clone, Debug, PartialEq)]
pub enum NotificationEvent {
    Notification(Notification),
    Unknown { kind: String },
}

impl NotificationEvent {
    /// Decode a raw frame. The notification body may be nested under `data`
    /// or flattened next to `type`.
    ///
    /// # Errors
    ///
    /// Returns an error when the discriminator is missing or a `notification`
    /// frame has no usable body.
    pub fn decode(frame: &Value) -> Result<Self, FrameError> {
        let kind = frame_type(frame)?;
        Ok(match kind {
            "notification" => Self::Notification(parse(kind, payload(frame))?),
            other => Self::Unknown { kind: other.to_owned() },
        })
    }
}

#[cfg(test)]
#[path = "notification_test.rs"]
mod tests;
