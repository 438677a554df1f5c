//! Connection lifecycle state.

use std::fmt;

/// Lifecycle state of the client's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Opening the transport.
    Connecting,
    /// Transport open; requests may be sent.
    Open,
    /// No transport, no reconnection in progress.
    #[default]
    Closed,
    /// Waiting to retry after the transport was lost.
    Reconnecting,
}

impl ConnectionState {
    /// Whether requests can be sent.
    #[must_use]
    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }

    /// Lowercase name, as used in logs and JSON output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
