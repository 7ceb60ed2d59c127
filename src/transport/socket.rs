//! Socket seam between [`Connection`](super::Connection) and the network.
//!
//! A [`Socket`] is a pair of boxed text halves. The production
//! [`TungsteniteConnector`] adapts a `tokio-tungstenite` stream; tests plug in
//! an in-memory connector that speaks the same shape.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Transport-level failure.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint is not a `ws://` or `wss://` URL.
    #[error("invalid websocket url: {0}")]
    InvalidUrl(String),
    /// The WebSocket handshake failed.
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    /// Reading from or writing to an open socket failed.
    #[error("websocket stream failed: {0}")]
    WsStream(Box<tokio_tungstenite::tungstenite::Error>),
    /// The socket (or the connection owning it) was closed.
    #[error("websocket closed")]
    WsClosed,
    /// Reconnection gave up after the configured number of attempts.
    #[error("gave up after {attempts} reconnect attempts")]
    ReconnectExhausted { attempts: u32 },
}

/// Outbound half: accepts serialized JSON text frames.
pub type TextSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound half: yields text frames until the peer closes.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// One established socket.
pub struct Socket {
    pub sink: TextSink,
    pub stream: TextStream,
}

impl Socket {
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<String, Error = TransportError> + Send + 'static,
        R: Stream<Item = Result<String, TransportError>> + Send + 'static,
    {
        Self { sink: Box::pin(sink), stream: Box::pin(stream) }
    }
}

/// Opens sockets. One call per connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a socket to a fully-formed URL (token already appended).
    async fn connect(&self, url: &str) -> Result<Socket, TransportError>;
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Socket, TransportError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::WsConnect(Box::new(e)))?;
        let (write, read) = stream.split();

        let sink = write
            .sink_map_err(|e| TransportError::WsStream(Box::new(e)))
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text.into()))));

        let stream = read.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                // Some servers send JSON in binary frames.
                Ok(Message::Binary(bytes)) => String::from_utf8(bytes.to_vec()).ok().map(Ok),
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::WsStream(Box::new(e)))),
            })
        });

        Ok(Socket::new(sink, stream))
    }
}

#[cfg(test)]
#[path = "socket_test.rs"]
mod tests;
