//! WebSocket transport implementation.
//!
//! This module provides a WebSocket client transport using tokio-tungstenite.
//! Envelopes are sent as text frames; text and binary frames are accepted.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, trace, warn};

use crate::traits::{Connection, ConnectionId, FrameSink, FrameStream, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Maximum incoming message size in bytes.
    pub max_message_size: usize,
    /// Timeout for the TCP connect and WebSocket handshake.
    pub connect_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: 1024 * 1024, // 1 MiB
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// WebSocket client transport.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport {
    config: WebSocketConfig,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        Self { config }
    }

    /// Get the transport configuration.
    #[must_use]
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, uri: &str) -> Result<Connection, TransportError> {
        debug!(uri = %uri, "Opening WebSocket connection");

        let (stream, response) = tokio::time::timeout(self.config.connect_timeout, connect_async(uri))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| {
                error!(uri = %uri, error = %e, "WebSocket handshake failed");
                TransportError::ConnectFailed {
                    uri: uri.to_string(),
                    reason: e.to_string(),
                }
            })?;

        let id = ConnectionId::generate();
        info!(connection = %id, uri = %uri, status = %response.status(), "WebSocket connected");

        let open = Arc::new(AtomicBool::new(true));
        let (sink, stream) = stream.split();

        Ok(Connection::new(
            id,
            Some(uri.to_string()),
            Box::new(WebSocketSink {
                sink,
                open: Arc::clone(&open),
            }),
            Box::new(WebSocketReader {
                stream,
                open,
                max_message_size: self.config.max_message_size,
            }),
        ))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// Sending half of a WebSocket connection.
pub struct WebSocketSink {
    sink: SplitSink<WsStream, Message>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        let text = String::from_utf8(data.to_vec())
            .map_err(|e| TransportError::SendFailed(format!("envelope is not UTF-8: {}", e)))?;

        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(()); // Already closed
        }

        self.sink
            .close()
            .await
            .map_err(|e| TransportError::Other(format!("Failed to close: {}", e)))
    }
}

/// Receiving half of a WebSocket connection.
pub struct WebSocketReader {
    stream: SplitStream<WsStream>,
    open: Arc<AtomicBool>,
    max_message_size: usize,
}

impl WebSocketReader {
    fn check_size(&self, size: usize) -> Result<(), TransportError> {
        if size > self.max_message_size {
            warn!(
                "Message too large: {} bytes (max: {})",
                size, self.max_message_size
            );
            return Err(TransportError::MessageTooLarge {
                size,
                max: self.max_message_size,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FrameStream for WebSocketReader {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    self.check_size(text.len())?;
                    return Ok(Some(Bytes::from(text.into_bytes())));
                }
                Some(Ok(Message::Binary(data))) => {
                    self.check_size(data.len())?;
                    return Ok(Some(Bytes::from(data)));
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    // tungstenite answers pings on its own
                    trace!("Control frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Received close frame");
                    self.open.store(false, Ordering::SeqCst);
                    return Ok(None);
                }
                Some(Ok(Message::Frame(_))) => {
                    // Raw frame, ignore
                }
                Some(Err(WsError::ConnectionClosed)) | Some(Err(WsError::AlreadyClosed)) => {
                    debug!("Connection closed");
                    self.open.store(false, Ordering::SeqCst);
                    return Ok(None);
                }
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    self.open.store(false, Ordering::SeqCst);
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    debug!("WebSocket stream ended");
                    self.open.store(false, Ordering::SeqCst);
                    return Ok(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_config_default() {
        let config = WebSocketConfig::default();
        assert_eq!(config.max_message_size, 1024 * 1024);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Port 9 (discard) is closed on any sane test host.
        let transport = WebSocketTransport::new(WebSocketConfig {
            connect_timeout: Duration::from_secs(2),
            ..Default::default()
        });
        let result = transport.connect("ws://127.0.0.1:9/ws").await;
        assert!(matches!(
            result,
            Err(TransportError::ConnectFailed { .. }) | Err(TransportError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_invalid_uri() {
        let transport = WebSocketTransport::default();
        assert!(transport.connect("not a uri").await.is_err());
    }
}
