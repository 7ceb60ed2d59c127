//! Shared frame model for the realtime classroom channels.
//!
//! Every frame on the wire is a UTF-8 JSON object with a mandatory `type`
//! discriminator. The live-class channel adds a second routing level through
//! `update_type`. Payload shape is a contract with the server and is only
//! decoded as far as routing needs.
//!
//! DESIGN
//! ======
//! Each channel gets its own event enum with an explicit `Unknown` variant,
//! so "ignore unrecognized frames" is a branch callers match on rather than
//! an implicit fallthrough. Payloads that routing does not inspect stay as
//! `serde_json::Value`.

pub mod discussion;
pub mod live_class;
pub mod notification;
pub mod outbound;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub use discussion::DiscussionEvent;
pub use live_class::{ChatMessage, LiveClassEvent, LiveClassUpdate, OnlineUser};
pub use notification::{Notification, NotificationEvent, Priority};
pub use outbound::ClientFrame;

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Top-level discriminator key.
pub const FRAME_TYPE: &str = "type";

/// Second-level discriminator key used by the live-class envelope.
pub const FRAME_UPDATE_TYPE: &str = "update_type";

/// Nested payload key.
pub const FRAME_DATA: &str = "data";

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned when a frame cannot be decoded into a channel event.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame is not an object or carries no string `type`.
    #[error("frame has no `type` discriminator")]
    MissingType,
    /// A known frame kind is missing a field routing depends on.
    #[error("`{kind}` frame has no `{field}` field")]
    MissingField { kind: String, field: &'static str },
    /// A known frame kind carries a payload of the wrong shape.
    #[error("invalid `{kind}` payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Server-assigned identifier. The server sends both numeric and string ids,
/// so both are normalized to their string form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Signed(n) => Self(n.to_string()),
            RawId::Unsigned(n) => Self(n.to_string()),
        })
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Read the `type` discriminator of a frame.
///
/// # Errors
///
/// Returns [`FrameError::MissingType`] when the frame is not an object or the
/// discriminator is absent or not a string.
pub fn frame_type(frame: &Value) -> Result<&str, FrameError> {
    frame
        .get(FRAME_TYPE)
        .and_then(Value::as_str)
        .ok_or(FrameError::MissingType)
}

/// Payload carried by a frame: the nested `data` object when present,
/// otherwise the frame itself.
#[must_use]
pub fn payload(frame: &Value) -> &Value {
    match frame.get(FRAME_DATA) {
        Some(data) if data.is_object() => data,
        _ => frame,
    }
}

/// Deserialize the payload of a frame of kind `kind`.
pub(crate) fn parse<T: DeserializeOwned>(kind: &str, value: &Value) -> Result<T, FrameError> {
    serde_json::from_value(value.clone()).map_err(|source| FrameError::Payload {
        kind: kind.to_owned(),
        source,
    })
}

/// Deserialize a single required field of a frame payload.
pub(crate) fn field<T: DeserializeOwned>(
    kind: &str,
    value: &Value,
    name: &'static str,
) -> Result<T, FrameError> {
    let raw = value.get(name).ok_or_else(|| FrameError::MissingField {
        kind: kind.to_owned(),
        field: name,
    })?;
    parse(kind, raw)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
