//! Reconnecting WebSocket connection with a pub/sub dispatch surface.
//!
//! DESIGN
//! ======
//! A [`Connection`] owns at most one live socket. `connect` spawns a task that
//! opens the socket, pumps inbound frames into the handler registry and
//! forwards outbound frames from an in-memory channel. When the socket drops
//! without an intentional `disconnect`, the task sleeps for the current
//! backoff delay and tries again with the stored token, up to the policy's
//! attempt ceiling.
//!
//! LIFECYCLE
//! =========
//! `Disconnected → Connecting → Open → (drop) → Disconnected → Connecting …`
//! ending in `Closed` (intentional) or `Failed` (ceiling reached). Every
//! `connect` bumps a generation counter; a task whose generation is stale
//! exits without touching state or firing handlers.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here returns errors to the caller on the realtime path. Connect
//! failures, malformed frames and sends while disconnected are logged and
//! dropped. `wait_open` is the one place a terminal failure is observable.

mod backoff;
mod registry;
mod socket;

pub use backoff::ReconnectPolicy;
pub use registry::{Handler, WILDCARD, handler};
pub use socket::{Connector, Socket, TextSink, TextStream, TransportError, TungsteniteConnector};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use self::backoff::Backoff;
use self::registry::HandlerRegistry;

/// Callback invoked on open or close.
pub type LifecycleHandler = Arc<dyn Fn() + Send + Sync>;

/// Observable connection state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Never connected, or between reconnect attempts.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The socket is open and frames flow.
    Open,
    /// `disconnect` was called.
    Closed,
    /// The reconnect ceiling was reached.
    Failed,
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Handle to one logical channel. Cloning shares the same connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: String,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    state: Mutex<ConnState>,
    handlers: Mutex<Handlers>,
    status: watch::Sender<ConnectionStatus>,
}

struct ConnState {
    token: Option<String>,
    backoff: Backoff,
    intentional_close: bool,
    generation: u64,
    /// Present only while a socket is open.
    outbound: Option<mpsc::UnboundedSender<String>>,
}

#[derive(Default)]
struct Handlers {
    messages: HandlerRegistry,
    on_connect: Vec<LifecycleHandler>,
    on_disconnect: Vec<LifecycleHandler>,
}

impl Connection {
    /// Create a disconnected connection for `endpoint`, a `ws://` or `wss://`
    /// URL without query string.
    pub fn new(endpoint: impl Into<String>, policy: ReconnectPolicy, connector: Arc<dyn Connector>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            inner: Arc::new(Inner {
                endpoint: endpoint.into(),
                policy,
                connector,
                state: Mutex::new(ConnState {
                    token: None,
                    backoff: Backoff::new(policy),
                    intentional_close: false,
                    generation: 0,
                    outbound: None,
                }),
                handlers: Mutex::new(Handlers::default()),
                status,
            }),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    /// Subscribe to status transitions.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// True iff a socket exists and is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Open && self.inner.lock_state().outbound.is_some()
    }

    /// Number of reconnect attempts since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock_state().backoff.attempts()
    }

    /// Open the socket with `token`, tearing down any previous socket first.
    ///
    /// Returns immediately; use [`Self::wait_open`] or an
    /// [`Self::on_connect`] handler to learn when the channel is usable. Must
    /// be called from within a tokio runtime, otherwise the call is logged
    /// and ignored.
    pub fn connect(&self, token: &str) {
        if !self.inner.endpoint.starts_with("ws://") && !self.inner.endpoint.starts_with("wss://") {
            let err = TransportError::InvalidUrl(self.inner.endpoint.clone());
            error!(endpoint = %self.inner.endpoint, error = %err, "ws: connect failed");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!(endpoint = %self.inner.endpoint, "ws: connect called outside a tokio runtime");
            return;
        };

        let generation = {
            let mut state = self.inner.lock_state();
            state.generation = state.generation.wrapping_add(1);
            state.token = Some(token.to_owned());
            state.intentional_close = false;
            // Dropping the sender ends the previous socket's pump.
            state.outbound = None;
            state.generation
        };
        self.inner.status.send_replace(ConnectionStatus::Connecting);

        runtime.spawn(run_connection(Arc::clone(&self.inner), generation));
    }

    /// Wait until the socket is open.
    ///
    /// Stays pending across reconnect attempts.
    ///
    /// # Errors
    ///
    /// [`TransportError::ReconnectExhausted`] when the attempt ceiling is
    /// reached, [`TransportError::WsClosed`] when `disconnect` is called first.
    pub async fn wait_open(&self) -> Result<(), TransportError> {
        let mut rx = self.inner.status.subscribe();
        let status = *rx
            .wait_for(|s| {
                matches!(
                    s,
                    ConnectionStatus::Open | ConnectionStatus::Closed | ConnectionStatus::Failed
                )
            })
            .await
            .map_err(|_| TransportError::WsClosed)?;

        match status {
            ConnectionStatus::Open => Ok(()),
            ConnectionStatus::Failed => Err(TransportError::ReconnectExhausted {
                attempts: self.inner.policy.max_attempts,
            }),
            _ => Err(TransportError::WsClosed),
        }
    }

    /// [`Self::connect`] followed by [`Self::wait_open`].
    ///
    /// # Errors
    ///
    /// See [`Self::wait_open`].
    pub async fn connect_and_wait(&self, token: &str) -> Result<(), TransportError> {
        self.connect(token);
        self.wait_open().await
    }

    /// Close the socket and suppress any further reconnects. Safe to call at
    /// any time, including when already disconnected.
    pub fn disconnect(&self) {
        let had_socket = {
            let mut state = self.inner.lock_state();
            state.intentional_close = true;
            state.outbound.take().is_some()
        };
        self.inner.status.send_replace(ConnectionStatus::Closed);
        debug!(endpoint = %self.inner.endpoint, had_socket, "ws: disconnect requested");
    }

    /// Serialize `message` and write it if the socket is open. Otherwise the
    /// message is dropped with a warning. Returns whether it was queued.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        let state = self.inner.lock_state();
        let Some(outbound) = state.outbound.as_ref() else {
            warn!(endpoint = %self.inner.endpoint, "ws: not connected, dropping outbound message");
            return false;
        };
        match serde_json::to_string(message) {
            Ok(text) => outbound.send(text).is_ok(),
            Err(e) => {
                warn!(endpoint = %self.inner.endpoint, error = %e, "ws: failed to serialize outbound message");
                false
            }
        }
    }

    /// Register `handler` for frames whose `type` equals `kind`, or for every
    /// frame when `kind` is [`WILDCARD`].
    pub fn on(&self, kind: &str, handler: Handler) {
        self.inner.lock_handlers().messages.on(kind, handler);
    }

    /// Remove one registration of `handler` for `kind`.
    pub fn off(&self, kind: &str, handler: &Handler) -> bool {
        self.inner.lock_handlers().messages.off(kind, handler)
    }

    /// Run `f` every time a socket opens.
    pub fn on_connect<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.lock_handlers().on_connect.push(Arc::new(f));
    }

    /// Run `f` every time an open socket closes.
    pub fn on_disconnect<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.lock_handlers().on_disconnect.push(Arc::new(f));
    }

    /// Drop every registered handler.
    pub fn clear_handlers(&self) {
        let mut handlers = self.inner.lock_handlers();
        handlers.messages.clear();
        handlers.on_connect.clear();
        handlers.on_disconnect.clear();
    }
}

// =============================================================================
// CONNECTION TASK
// =============================================================================

async fn run_connection(inner: Arc<Inner>, generation: u64) {
    loop {
        let Some(url) = inner.socket_url(generation) else {
            return;
        };
        inner.status.send_replace(ConnectionStatus::Connecting);

        match inner.connector.connect(&url).await {
            Ok(socket) => {
                let Some(outbound) = inner.opened(generation) else {
                    return;
                };
                pump(&inner, socket, outbound).await;
                if !inner.closed(generation) {
                    return;
                }
            }
            Err(e) => {
                warn!(endpoint = %inner.endpoint, error = %e, "ws: connection attempt failed");
            }
        }

        let Some(delay) = inner.next_reconnect_delay(generation) else {
            return;
        };
        tokio::time::sleep(delay).await;
    }
}

async fn pump(inner: &Inner, socket: Socket, mut outbound: mpsc::UnboundedReceiver<String>) {
    let Socket { mut sink, mut stream } = socket;
    loop {
        tokio::select! {
            out = outbound.recv() => {
                let Some(text) = out else {
                    let _ = sink.close().await;
                    return;
                };
                if let Err(e) = sink.send(text).await {
                    warn!(endpoint = %inner.endpoint, error = %e, "ws: send failed");
                    return;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(text)) => inner.dispatch_text(&text),
                Some(Err(e)) => {
                    warn!(endpoint = %inner.endpoint, error = %e, "ws: receive failed");
                    return;
                }
                None => return,
            }
        }
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, ConnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_handlers(&self) -> MutexGuard<'_, Handlers> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// URL for the next attempt, or `None` when this task should stop.
    fn socket_url(&self, generation: u64) -> Option<String> {
        let state = self.lock_state();
        if state.generation != generation || state.intentional_close {
            return None;
        }
        let token = state.token.as_deref()?;
        Some(format!("{}?token={}", self.endpoint, urlencoding::encode(token)))
    }

    /// Install the outbound channel for a freshly opened socket and fire
    /// connect handlers. `None` means the socket is no longer wanted.
    fn opened(&self, generation: u64) -> Option<mpsc::UnboundedReceiver<String>> {
        let rx = {
            let mut state = self.lock_state();
            if state.generation != generation || state.intentional_close {
                return None;
            }
            let (tx, rx) = mpsc::unbounded_channel();
            state.outbound = Some(tx);
            state.backoff.reset();
            rx
        };
        self.status.send_replace(ConnectionStatus::Open);
        info!(endpoint = %self.endpoint, "ws: connected");

        let handlers = self.lock_handlers().on_connect.clone();
        for h in handlers {
            h();
        }
        Some(rx)
    }

    /// Clear socket state after the pump ends and fire disconnect handlers.
    /// Returns `false` if the socket was superseded by a newer `connect`.
    fn closed(&self, generation: u64) -> bool {
        {
            let mut state = self.lock_state();
            if state.generation != generation {
                return false;
            }
            state.outbound = None;
            if !state.intentional_close {
                self.status.send_replace(ConnectionStatus::Disconnected);
            }
        }
        info!(endpoint = %self.endpoint, "ws: disconnected");

        let handlers = self.lock_handlers().on_disconnect.clone();
        for h in handlers {
            h();
        }
        true
    }

    /// Decide whether to reconnect and how long to wait first.
    fn next_reconnect_delay(&self, generation: u64) -> Option<std::time::Duration> {
        let mut state = self.lock_state();
        if state.generation != generation || state.intentional_close || state.token.is_none() {
            return None;
        }
        let Some(delay) = state.backoff.next_delay() else {
            error!(
                endpoint = %self.endpoint,
                max_attempts = self.policy.max_attempts,
                "ws: max reconnect attempts reached, giving up"
            );
            self.status.send_replace(ConnectionStatus::Failed);
            return None;
        };
        info!(
            endpoint = %self.endpoint,
            attempt = state.backoff.attempts(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "ws: scheduling reconnect"
        );
        self.status.send_replace(ConnectionStatus::Disconnected);
        Some(delay)
    }

    fn dispatch_text(&self, text: &str) {
        let frame: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "ws: dropping malformed frame");
                return;
            }
        };
        let kind = frame.get(frames::FRAME_TYPE).and_then(Value::as_str);
        let handlers = self.lock_handlers().messages.matching(kind);
        for h in handlers {
            h(&frame);
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
