//! Client error taxonomy.

use echochat_protocol::ProtocolError;
use echochat_transport::TransportError;
use thiserror::Error;

/// Errors raised by the client core.
///
/// Everything except [`ClientError::ReconnectExhausted`] is recovered
/// locally: it is logged, reported to the renderer and the session carries on.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A request was attempted while the transport is not open.
    #[error("Not connected")]
    NotConnected,

    /// An incoming payload could not be decoded.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(#[source] ProtocolError),

    /// An outgoing request could not be encoded.
    #[error("Failed to encode request: {0}")]
    Encode(#[source] ProtocolError),

    /// The server answered with a non-success status.
    #[error(
        "Server error on {}: {message}",
        .function.as_deref().unwrap_or("unknown operation")
    )]
    ServerError {
        /// Operation tag, when the server reported one.
        function: Option<String>,
        /// Error text from the server.
        message: String,
    },

    /// A success response carried an unrecognized operation tag.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// A status reply named a topic that is no longer listed.
    #[error("Status for unlisted topic: {0}")]
    StaleReference(String),

    /// Publishing without a topic while none is subscribed.
    #[error("No topic subscribed")]
    NoCurrentTopic,

    /// Publishing blank text.
    #[error("Message is empty")]
    EmptyMessage,

    /// Transport failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Every reconnection attempt failed.
    #[error("Gave up reconnecting after {0} attempts")]
    ReconnectExhausted(u32),
}

impl ClientError {
    /// Short, stable name used for logs and metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::NotConnected => "not_connected",
            ClientError::MalformedEnvelope(_) => "malformed_envelope",
            ClientError::Encode(_) => "encode",
            ClientError::ServerError { .. } => "server_error",
            ClientError::UnknownOperation(_) => "unknown_operation",
            ClientError::StaleReference(_) => "stale_reference",
            ClientError::NoCurrentTopic => "no_current_topic",
            ClientError::EmptyMessage => "empty_message",
            ClientError::Transport(_) => "transport",
            ClientError::ReconnectExhausted(_) => "reconnect_exhausted",
        }
    }

    /// Whether the error ends the client session.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::ReconnectExhausted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let err = ClientError::ServerError {
            function: Some("PUBLISH_TOPIC".to_string()),
            message: "you are not subscribed to that topic".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Server error on PUBLISH_TOPIC: you are not subscribed to that topic"
        );

        let err = ClientError::ServerError {
            function: None,
            message: "could not interpret request".to_string(),
        };
        assert!(err.to_string().contains("unknown operation"));
    }

    #[test]
    fn test_only_exhaustion_is_fatal() {
        assert!(ClientError::ReconnectExhausted(3).is_fatal());
        assert!(!ClientError::NotConnected.is_fatal());
        assert!(!ClientError::StaleReference("a".into()).is_fatal());
        assert!(!ClientError::UnknownOperation("X".into()).is_fatal());
    }
}
