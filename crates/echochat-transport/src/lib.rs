//! # echochat-transport
//!
//! Client transport abstraction layer for EchoChat.
//!
//! This crate provides a unified interface for the connections an EchoChat
//! client can open:
//!
//! - **WebSocket** - The production transport
//! - **Memory** - In-process channels, for tests and embedding
//!
//! ## Transport Abstraction
//!
//! All transports implement the `Transport` trait and hand out a
//! `Connection` that splits into a `FrameSink` and a `FrameStream`,
//! allowing the session core to be wire-agnostic.
//!
//! ```rust,ignore
//! use echochat_transport::{Transport, WebSocketTransport};
//!
//! async fn listen(transport: &WebSocketTransport) {
//!     let (_sink, mut stream) = transport.connect("ws://127.0.0.1:8000/ws").await?.split();
//!     while let Ok(Some(payload)) = stream.recv().await {
//!         // Decode envelope
//!     }
//! }
//! ```

pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use memory::{MemoryListener, MemoryPeer, MemoryTransport};
pub use traits::{Connection, ConnectionId, FrameSink, FrameStream, Transport, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketTransport};
