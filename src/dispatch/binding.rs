//! Mount/unmount lifecycle shared by every channel consumer.
//!
//! A binding owns at most one [`Connection`]. Mounting with both a resource
//! id and a token creates a fresh connection and connects it; mounting again
//! (dependency change) or unmounting disconnects the previous one first.
//!
//! Callbacks from a connection are fenced by a mount epoch. Once a connection
//! is abandoned, its late frames and open/close events are ignored and can
//! never flip the state of the newer mount.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::channels::{ChannelFactory, ChannelKind};
use crate::transport::{Connection, TransportError, WILDCARD, handler};

/// Receives every frame and connectivity change of a bound channel.
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch(&self, frame: &Value);

    fn connection_changed(&self, _connected: bool) {}
}

pub struct ChannelBinding<D: Dispatch> {
    factory: ChannelFactory,
    kind: ChannelKind,
    dispatcher: Arc<D>,
    connected: Arc<AtomicBool>,
    epoch: Arc<AtomicU64>,
    active: Option<Mounted>,
}

struct Mounted {
    resource_id: String,
    connection: Connection,
}

impl<D: Dispatch> ChannelBinding<D> {
    pub fn new(factory: ChannelFactory, kind: ChannelKind, dispatcher: Arc<D>) -> Self {
        Self {
            factory,
            kind,
            dispatcher,
            connected: Arc::new(AtomicBool::new(false)),
            epoch: Arc::new(AtomicU64::new(0)),
            active: None,
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<D> {
        &self.dispatcher
    }

    #[must_use]
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Resource the current connection is bound to.
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        self.active.as_ref().map(|m| m.resource_id.as_str())
    }

    #[must_use]
    pub fn connection(&self) -> Option<&Connection> {
        self.active.as_ref().map(|m| &m.connection)
    }

    /// Last connectivity reported by the current connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Tear down any previous connection, then connect to `resource_id` if
    /// both it and `token` are present. Returns whether a connection was
    /// started.
    pub fn mount(&mut self, resource_id: Option<&str>, token: Option<&str>) -> bool {
        self.unmount();
        let (Some(resource_id), Some(token)) = (resource_id, token) else {
            debug!(kind = %self.kind, "binding: resource id or token missing, staying disconnected");
            return false;
        };

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let connection = self.factory.channel(self.kind, resource_id);

        let (current, connected, dispatcher) = self.fence();
        connection.on_connect(move || {
            if current.load(Ordering::SeqCst) == epoch {
                connected.store(true, Ordering::SeqCst);
                dispatcher.connection_changed(true);
            }
        });

        let (current, connected, dispatcher) = self.fence();
        connection.on_disconnect(move || {
            if current.load(Ordering::SeqCst) == epoch && connected.swap(false, Ordering::SeqCst) {
                dispatcher.connection_changed(false);
            }
        });

        let (current, _, dispatcher) = self.fence();
        connection.on(
            WILDCARD,
            handler(move |frame| {
                if current.load(Ordering::SeqCst) == epoch {
                    dispatcher.dispatch(frame);
                }
            }),
        );

        connection.connect(token);
        self.active = Some(Mounted { resource_id: resource_id.to_owned(), connection });
        true
    }

    /// Disconnect and forget the current connection, if any.
    pub fn unmount(&mut self) {
        let Some(mounted) = self.active.take() else {
            return;
        };
        self.epoch.fetch_add(1, Ordering::SeqCst);
        mounted.connection.clear_handlers();
        mounted.connection.disconnect();
        if self.connected.swap(false, Ordering::SeqCst) {
            self.dispatcher.connection_changed(false);
        }
        debug!(kind = %self.kind, resource_id = %mounted.resource_id, "binding: unmounted");
    }

    /// Send on the current connection. Dropped with a warning when unmounted
    /// or not open.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        match &self.active {
            Some(mounted) => mounted.connection.send(message),
            None => {
                warn!(kind = %self.kind, "binding: not mounted, dropping outbound message");
                false
            }
        }
    }

    /// Wait until the current connection opens.
    ///
    /// # Errors
    ///
    /// [`TransportError::WsClosed`] when nothing is mounted, otherwise see
    /// [`Connection::wait_open`].
    pub async fn wait_connected(&self) -> Result<(), TransportError> {
        let connection = self.connection().cloned().ok_or(TransportError::WsClosed)?;
        connection.wait_open().await
    }

    fn fence(&self) -> (Arc<AtomicU64>, Arc<AtomicBool>, Arc<D>) {
        (
            Arc::clone(&self.epoch),
            Arc::clone(&self.connected),
            Arc::clone(&self.dispatcher),
        )
    }
}

impl<D: Dispatch> Drop for ChannelBinding<D> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
#[path = "binding_test.rs"]
mod tests;
