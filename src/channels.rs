//! Per-resource channel construction.
//!
//! A [`ChannelFactory`] knows the WebSocket base URL, the reconnect policy and
//! the connector, and stamps out a fresh [`Connection`] per call. There is no
//! pooling: the caller owns the returned connection and must disconnect it
//! before asking for another one for the same resource.

use std::fmt;
use std::sync::Arc;

use crate::config::{ConfigError, RealtimeConfig};
use crate::transport::{Connection, Connector, ReconnectPolicy, TungsteniteConnector};

/// Path prefix shared by every realtime endpoint.
pub const WS_PATH_PREFIX: &str = "/api/v1/ws";

/// Server resource a channel is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Per-user notification stream.
    Notifications,
    /// One discussion thread.
    Discussion,
    /// One live quiz session.
    LiveQuiz,
    /// One whiteboard session.
    Whiteboard,
    /// One live class.
    LiveClass,
}

impl ChannelKind {
    pub const ALL: [Self; 5] = [
        Self::Notifications,
        Self::Discussion,
        Self::LiveQuiz,
        Self::Whiteboard,
        Self::LiveClass,
    ];

    /// Path segment between the prefix and the resource id.
    #[must_use]
    pub fn segment(self) -> &'static str {
        match self {
            Self::Notifications => "notifications",
            Self::Discussion => "discussions",
            Self::LiveQuiz => "live-quiz",
            Self::Whiteboard => "whiteboard",
            Self::LiveClass => "live-class",
        }
    }

    /// Endpoint path for `resource_id`, e.g. `/api/v1/ws/live-class/42`.
    /// The id is percent-encoded as one path segment.
    #[must_use]
    pub fn path(self, resource_id: &str) -> String {
        format!("{WS_PATH_PREFIX}/{}/{}", self.segment(), urlencoding::encode(resource_id))
    }

    /// Parse a path segment (or a few friendly aliases) back into a kind.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "notifications" | "notification" => Some(Self::Notifications),
            "discussions" | "discussion" => Some(Self::Discussion),
            "live-quiz" | "live_quiz" | "quiz" => Some(Self::LiveQuiz),
            "whiteboard" => Some(Self::Whiteboard),
            "live-class" | "live_class" | "class" => Some(Self::LiveClass),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// Builds unconnected [`Connection`]s for server resources.
#[derive(Clone)]
pub struct ChannelFactory {
    ws_base: String,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
}

impl ChannelFactory {
    /// Factory for the configured API host using the real network connector.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the API base URL has an
    /// unsupported scheme.
    pub fn from_config(config: &RealtimeConfig) -> Result<Self, ConfigError> {
        Self::new(config, Arc::new(TungsteniteConnector))
    }

    /// Factory with an explicit connector.
    ///
    /// # Errors
    ///
    /// See [`Self::from_config`].
    pub fn new(config: &RealtimeConfig, connector: Arc<dyn Connector>) -> Result<Self, ConfigError> {
        Ok(Self {
            ws_base: config.ws_base_url()?,
            policy: config.reconnect,
            connector,
        })
    }

    #[must_use]
    pub fn ws_base(&self) -> &str {
        &self.ws_base
    }

    /// Full endpoint URL (without token) for a resource.
    #[must_use]
    pub fn endpoint(&self, kind: ChannelKind, resource_id: &str) -> String {
        format!("{}{}", self.ws_base, kind.path(resource_id))
    }

    /// A new, unconnected connection for `kind`/`resource_id`.
    #[must_use]
    pub fn channel(&self, kind: ChannelKind, resource_id: &str) -> Connection {
        Connection::new(
            self.endpoint(kind, resource_id),
            self.policy,
            Arc::clone(&self.connector),
        )
    }

    #[must_use]
    pub fn notifications(&self, user_id: &str) -> Connection {
        self.channel(ChannelKind::Notifications, user_id)
    }

    #[must_use]
    pub fn discussion(&self, thread_id: &str) -> Connection {
        self.channel(ChannelKind::Discussion, thread_id)
    }

    #[must_use]
    pub fn live_quiz(&self, quiz_session_id: &str) -> Connection {
        self.channel(ChannelKind::LiveQuiz, quiz_session_id)
    }

    #[must_use]
    pub fn whiteboard(&self, session_id: &str) -> Connection {
        self.channel(ChannelKind::Whiteboard, session_id)
    }

    #[must_use]
    pub fn live_class(&self, class_id: &str) -> Connection {
        self.channel(ChannelKind::LiveClass, class_id)
    }
}

#[cfg(test)]
#[path = "channels_test.rs"]
mod tests;
