//! Application-level realtime context.
//!
//! Built once at startup and handed to whatever needs a channel. It owns the
//! single [`NotificationCenter`] for the logged-in user, so every holder of a
//! `Realtime` (or a clone of the center) sees the same inbox, and tests can
//! build their own instance around a fake connector.

use std::sync::Arc;

use tracing::info;

use crate::channels::{ChannelFactory, ChannelKind};
use crate::config::{ConfigError, RealtimeConfig};
use crate::dispatch::{
    AlertSink, DiscussionListener, DiscussionRoom, LiveClassListener, LiveClassRoom, LogAlertSink,
    NotificationCenter,
};
use crate::progress::{FileStorage, ProgressStorage, SessionKey, SessionProgress};
use crate::transport::{Connection, Connector, TungsteniteConnector};

#[derive(Clone)]
pub struct Realtime {
    config: RealtimeConfig,
    factory: ChannelFactory,
    notifications: NotificationCenter,
    storage: Arc<dyn ProgressStorage>,
}

impl Realtime {
    /// Real network connector, log-backed alerts and file-backed progress.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] for an unsupported API URL.
    pub fn from_config(config: RealtimeConfig) -> Result<Self, ConfigError> {
        let storage: Arc<dyn ProgressStorage> = Arc::new(FileStorage::new(config.progress_path.clone()));
        Self::with_parts(config, Arc::new(TungsteniteConnector), Arc::new(LogAlertSink), storage)
    }

    /// # Errors
    ///
    /// See [`Self::from_config`].
    pub fn with_parts(
        config: RealtimeConfig,
        connector: Arc<dyn Connector>,
        alerts: Arc<dyn AlertSink>,
        storage: Arc<dyn ProgressStorage>,
    ) -> Result<Self, ConfigError> {
        let factory = ChannelFactory::new(&config, connector)?;
        let notifications = NotificationCenter::new(factory.clone(), alerts);
        info!(ws_base = %factory.ws_base(), "realtime: initialized");
        Ok(Self { config, factory, notifications, storage })
    }

    #[must_use]
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    #[must_use]
    pub fn channels(&self) -> &ChannelFactory {
        &self.factory
    }

    /// The one notification stream of this application.
    #[must_use]
    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Raw connection for any channel kind.
    #[must_use]
    pub fn channel(&self, kind: ChannelKind, resource_id: &str) -> Connection {
        self.factory.channel(kind, resource_id)
    }

    pub fn live_class<L: LiveClassListener>(&self, listener: L) -> LiveClassRoom<L> {
        LiveClassRoom::new(self.factory.clone(), listener, self.config.typing_timeout)
    }

    pub fn discussion<L: DiscussionListener>(&self, listener: L) -> DiscussionRoom<L> {
        DiscussionRoom::new(self.factory.clone(), listener, self.config.typing_timeout)
    }

    #[must_use]
    pub fn progress_storage(&self) -> &Arc<dyn ProgressStorage> {
        &self.storage
    }

    /// Open (or resume) a learning session.
    #[must_use]
    pub fn session(&self, key: SessionKey) -> SessionProgress {
        SessionProgress::open(key, Arc::clone(&self.storage), self.config.autosave_interval)
    }
}

#[cfg(test)]
#[path = "realtime_test.rs"]
mod tests;
