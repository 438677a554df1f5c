//! # echochat-protocol
//!
//! Wire envelope definitions for the EchoChat publish/subscribe chat service.
//!
//! Clients send requests naming an operation and its parameters; the server
//! answers with a status, the operation tag and an operation-specific `data`
//! object, and pushes `UPDATE_TOPIC` notifications to subscribers.
//!
//! ## Operations
//!
//! - `SUBSCRIBE_TOPIC` / `UNSUBSCRIBE_TOPIC` - Topic membership
//! - `PUBLISH_TOPIC` - Broadcast a message into a topic
//! - `LIST_TOPICS` / `GET_TOPIC_STATUS` - Topic discovery
//! - `UPDATE_TOPIC` - Server push of a published message
//!
//! ## Example
//!
//! ```rust
//! use echochat_protocol::{codec, Request};
//!
//! let encoded = codec::encode(&Request::subscribe("general")).unwrap();
//! assert!(std::str::from_utf8(&encoded).unwrap().contains("SUBSCRIBE_TOPIC"));
//!
//! let reply = br#"{"status": "success", "function": "SUBSCRIBE_TOPIC", "data": {"topic": "general"}}"#;
//! let response = codec::decode(reply).unwrap();
//! assert!(response.is_success());
//! ```

pub mod codec;
pub mod envelope;

pub use codec::{decode, encode, EnvelopeCodec, ProtocolError, MAX_ENVELOPE_SIZE};
pub use envelope::{
    Confirmation, OperationTag, Parameters, Request, RequestId, Response, Status, TopicList,
    TopicStatus, TopicUpdate,
};
