//! In-process transport backed by tokio channels.
//!
//! Every successful `connect` hands a [`MemoryPeer`] to the paired
//! [`MemoryListener`], which plays the server side of the conversation.

use async_trait::async_trait;
use bytes::Bytes;
use echochat_protocol::{codec, ProtocolError, Request, Response};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::traits::{Connection, ConnectionId, FrameSink, FrameStream, Transport, TransportError};

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicUsize,
    refuse_remaining: AtomicUsize,
}

/// Channel-backed client transport.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    counters: Arc<Counters>,
}

impl MemoryTransport {
    /// Create a transport and the listener that receives its server-side peers.
    #[must_use]
    pub fn new() -> (Self, MemoryListener) {
        let (peers, incoming) = mpsc::unbounded_channel();
        (
            Self {
                peers,
                counters: Arc::new(Counters::default()),
            },
            MemoryListener { incoming },
        )
    }

    /// Refuse the next `count` connection attempts.
    pub fn refuse_next(&self, count: usize) {
        self.counters
            .refuse_remaining
            .store(count, Ordering::SeqCst);
    }

    /// Number of connection attempts so far, refused ones included.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.counters.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, uri: &str) -> Result<Connection, TransportError> {
        self.counters.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .counters
            .refuse_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::ConnectFailed {
                uri: uri.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();
        let id = ConnectionId::generate();

        let peer = MemoryPeer {
            id: id.clone(),
            incoming: from_client,
            outgoing: Some(to_client),
        };
        self.peers.send(peer).map_err(|_| TransportError::ConnectFailed {
            uri: uri.to_string(),
            reason: "listener dropped".to_string(),
        })?;

        debug!(connection = %id, uri = %uri, "Memory connection opened");

        Ok(Connection::new(
            id,
            Some(uri.to_string()),
            Box::new(MemorySink {
                outgoing: Some(to_server),
            }),
            Box::new(MemoryStream {
                incoming: from_server,
            }),
        ))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Receives the server side of every connection opened on a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemoryListener {
    incoming: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryListener {
    /// Wait for the next connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.incoming.recv().await
    }
}

/// Server side of a memory connection.
#[derive(Debug)]
pub struct MemoryPeer {
    id: ConnectionId,
    incoming: mpsc::UnboundedReceiver<Bytes>,
    outgoing: Option<mpsc::UnboundedSender<Bytes>>,
}

impl MemoryPeer {
    /// The connection identifier shared with the client side.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Receive the next raw payload sent by the client.
    pub async fn recv_raw(&mut self) -> Option<Bytes> {
        self.incoming.recv().await
    }

    /// Receive and decode the next request sent by the client.
    ///
    /// Returns `None` once the client side is closed.
    pub async fn recv_request(&mut self) -> Option<Result<Request, ProtocolError>> {
        let data = self.incoming.recv().await?;
        Some(codec::decode_request(&data))
    }

    /// Take a request that is already queued, without waiting.
    pub fn try_recv_request(&mut self) -> Option<Result<Request, ProtocolError>> {
        let data = self.incoming.try_recv().ok()?;
        Some(codec::decode_request(&data))
    }

    /// Send a raw payload to the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the client side is gone or the peer was closed.
    pub fn send_raw(&self, data: impl Into<Bytes>) -> Result<(), TransportError> {
        self.outgoing
            .as_ref()
            .ok_or(TransportError::ConnectionClosed)?
            .send(data.into())
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Encode and send a response to the client.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the client side is gone.
    pub fn send(&self, response: &Response) -> Result<(), TransportError> {
        let data = codec::encode_response(response)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        self.send_raw(data)
    }

    /// Close the server side. The client observes a clean close.
    pub fn close(&mut self) {
        self.outgoing = None;
    }
}

struct MemorySink {
    outgoing: Option<mpsc::UnboundedSender<Bytes>>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError> {
        self.outgoing
            .as_ref()
            .ok_or(TransportError::ConnectionClosed)?
            .send(data)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.outgoing = None;
        Ok(())
    }
}

struct MemoryStream {
    incoming: mpsc::UnboundedReceiver<Bytes>,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.incoming.recv().await)
    }
}
