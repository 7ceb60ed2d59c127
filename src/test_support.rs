//! In-memory connector for tests.
//!
//! `FakeConnector` records every connection attempt with the (virtual) time
//! it happened. In accepting mode each attempt yields a [`FakePeer`] holding
//! the server side of the socket.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::transport::{Connector, Socket, TransportError};

/// Server side of one accepted fake socket.
pub struct FakePeer {
    pub url: String,
    to_client: fmpsc::UnboundedSender<String>,
    from_client: fmpsc::UnboundedReceiver<String>,
}

impl FakePeer {
    /// Push a raw text frame to the client.
    pub fn push_text(&self, text: &str) {
        self.to_client.unbounded_send(text.to_owned()).expect("client gone");
    }

    /// Push a JSON frame to the client.
    pub fn push(&self, frame: &Value) {
        self.push_text(&frame.to_string());
    }

    /// Next frame the client sent, parsed as JSON.
    pub async fn recv(&mut self) -> Option<Value> {
        let text = self.from_client.next().await?;
        Some(serde_json::from_str(&text).expect("client sent invalid json"))
    }

    /// Close the socket from the server side.
    pub fn close(self) {
        drop(self);
    }

    /// True once the client dropped its end.
    pub fn is_closed(&self) -> bool {
        self.to_client.is_closed()
    }
}

pub struct FakeConnector {
    accept: bool,
    calls: Mutex<Vec<(String, Instant)>>,
    peers: mpsc::UnboundedSender<FakePeer>,
}

impl FakeConnector {
    /// Connector that fails every attempt.
    pub fn refusing() -> Arc<Self> {
        let (peers, _) = mpsc::unbounded_channel();
        Arc::new(Self { accept: false, calls: Mutex::default(), peers })
    }

    /// Connector that accepts every attempt and hands out the server side.
    pub fn accepting() -> (Arc<Self>, mpsc::UnboundedReceiver<FakePeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { accept: true, calls: Mutex::default(), peers }), rx)
    }

    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, url: &str) -> Result<Socket, TransportError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((url.to_owned(), Instant::now()));
        if !self.accept {
            return Err(TransportError::WsClosed);
        }

        let (to_client, client_rx) = fmpsc::unbounded::<String>();
        let (client_tx, from_client) = fmpsc::unbounded::<String>();
        let peer = FakePeer { url: url.to_owned(), to_client, from_client };
        self.peers.send(peer).map_err(|_| TransportError::WsClosed)?;

        let sink = client_tx.sink_map_err(|_| TransportError::WsClosed);
        Ok(Socket::new(sink, client_rx.map(Ok)))
    }
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
