//! # echochat-core
//!
//! Client session state and protocol plumbing for EchoChat.
//!
//! This crate provides the building blocks of a client:
//!
//! - **Client** - Session facade driving a [`Renderer`]
//! - **Dispatcher** - Outgoing requests with correlation ids
//! - **Router** - Incoming envelope dispatch by operation
//! - **Topics** - Known topics and their subscriber counts
//! - **Echo** - Recognizes broadcasts of the client's own messages
//! - **Connection** - Transport lifecycle, writer task and reconnects
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐ payload ┌─────────────┐     ┌─────────────┐
//! │ Connection  │────────▶│   Router    │────▶│  Session    │
//! │  Manager    │         └─────────────┘     └─────────────┘
//! └─────────────┘                │                   │
//!        ▲                       ▼                   ▼
//!        │ outbound       ┌─────────────┐     ┌─────────────┐
//!        └────────────────│ Dispatcher  │     │  Renderer   │
//!                         └─────────────┘     └─────────────┘
//! ```

pub mod client;
pub mod connection;
pub mod dispatcher;
pub mod echo;
pub mod error;
pub mod metrics;
pub mod pending;
pub mod render;
pub mod router;
pub mod session;
pub mod state;
pub mod topics;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{Client, ClientConfig};
pub use connection::{Command, ConnectionManager, ReconnectPolicy};
pub use dispatcher::Dispatcher;
pub use echo::{EchoState, EchoSuppressor, Side, Verdict};
pub use error::ClientError;
pub use pending::{PendingRequest, PendingRequests};
pub use render::Renderer;
pub use router::{ResponseRouter, Routed};
pub use session::{ChatMessage, Session};
pub use state::ConnectionState;
pub use topics::{Topic, TopicStore};
