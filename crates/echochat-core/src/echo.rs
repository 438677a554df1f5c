//! Own-message echo suppression.
//!
//! The server broadcasts every published message to all subscribers of the
//! topic, the publisher included. Messages this client published are queued
//! here until their broadcast comes back, so the echo can be rendered as the
//! client's own rather than as a remote message.

use std::collections::VecDeque;

use echochat_protocol::TopicUpdate;
use serde::Serialize;
use tracing::warn;

/// Default number of own messages awaiting their echo.
pub const DEFAULT_MAX_PENDING: usize = 32;

/// Which side of the conversation a chat message is shown on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Messages from other clients.
    Left,
    /// Messages this client published.
    Right,
}

/// Whether any own message is awaiting its echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoState {
    Idle,
    AwaitingEcho,
}

/// Classification of an incoming broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Echo of a message this client published.
    Own,
    /// Message from another client.
    Remote,
    /// Broadcast for a topic other than the current one.
    Discarded,
}

impl Verdict {
    /// Display side, `None` for discarded broadcasts.
    #[must_use]
    pub fn side(self) -> Option<Side> {
        match self {
            Verdict::Own => Some(Side::Right),
            Verdict::Remote => Some(Side::Left),
            Verdict::Discarded => None,
        }
    }
}

/// Bounded FIFO of own messages awaiting their broadcast.
#[derive(Debug, Clone)]
pub struct EchoSuppressor {
    pending: VecDeque<String>,
    capacity: usize,
}

impl Default for EchoSuppressor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING)
    }
}

impl EchoSuppressor {
    /// Create a suppressor holding at most `capacity` messages (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pending: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[must_use]
    pub fn state(&self) -> EchoState {
        if self.pending.is_empty() {
            EchoState::Idle
        } else {
            EchoState::AwaitingEcho
        }
    }

    /// Remember an own message before it is sent.
    pub fn arm(&mut self, message: &str) {
        if self.pending.len() == self.capacity {
            if let Some(dropped) = self.pending.pop_front() {
                warn!(
                    capacity = self.capacity,
                    message = %dropped,
                    "Too many messages awaiting echo, forgetting the oldest"
                );
            }
        }
        self.pending.push_back(message.to_string());
    }

    /// Undo the latest [`arm`](Self::arm) of `message` after a failed send.
    pub fn disarm(&mut self, message: &str) {
        if let Some(index) = self.pending.iter().rposition(|m| m == message) {
            self.pending.remove(index);
        }
    }

    /// Classify a broadcast against the current topic.
    ///
    /// An echo of a pending message consumes the earliest matching entry.
    pub fn classify(&mut self, current_topic: Option<&str>, update: &TopicUpdate) -> Verdict {
        if current_topic != Some(update.name.as_str()) {
            return Verdict::Discarded;
        }
        match self.take(&update.message) {
            Some(_) => Verdict::Own,
            None => Verdict::Remote,
        }
    }

    /// Handle a publish acknowledgment.
    ///
    /// Clears the earliest entry equal to `message`, or the oldest entry when
    /// the acknowledgment does not name one. Returns the cleared message.
    pub fn acknowledge(&mut self, message: Option<&str>) -> Option<String> {
        match message {
            Some(message) => self.take(message),
            None => self.pending.pop_front(),
        }
    }

    fn take(&mut self, message: &str) -> Option<String> {
        let index = self.pending.iter().position(|m| m == message)?;
        self.pending.remove(index)
    }

    /// Oldest message awaiting its echo.
    #[must_use]
    pub fn front(&self) -> Option<&str> {
        self.pending.front().map(String::as_str)
    }

    /// All messages awaiting their echo, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(topic: &str, message: &str) -> TopicUpdate {
        TopicUpdate {
            name: topic.to_string(),
            message: message.to_string(),
            timestamp: None,
        }
    }

    #[test]
    fn test_own_echo() {
        let mut echo = EchoSuppressor::default();
        echo.arm("hello");
        assert_eq!(echo.state(), EchoState::AwaitingEcho);

        assert_eq!(echo.classify(Some("general"), &update("general", "hello")), Verdict::Own);
        assert_eq!(echo.state(), EchoState::Idle);
    }

    #[test]
    fn test_remote_message_keeps_waiting() {
        let mut echo = EchoSuppressor::default();
        echo.arm("hello");

        let verdict = echo.classify(Some("general"), &update("general", "hi there"));
        assert_eq!(verdict, Verdict::Remote);
        assert_eq!(verdict.side(), Some(Side::Left));
        assert_eq!(echo.front(), Some("hello"));
    }

    #[test]
    fn test_other_topic_discarded() {
        let mut echo = EchoSuppressor::default();
        echo.arm("hello");

        assert_eq!(echo.classify(Some("general"), &update("random", "hello")), Verdict::Discarded);
        assert_eq!(echo.classify(None, &update("general", "hello")), Verdict::Discarded);
        assert_eq!(echo.len(), 1);
    }

    #[test]
    fn test_rapid_publishes_all_recognized() {
        let mut echo = EchoSuppressor::default();
        echo.arm("one");
        echo.arm("two");
        echo.arm("one");

        assert_eq!(echo.classify(Some("t"), &update("t", "two")), Verdict::Own);
        assert_eq!(echo.classify(Some("t"), &update("t", "one")), Verdict::Own);
        assert_eq!(echo.classify(Some("t"), &update("t", "one")), Verdict::Own);
        assert_eq!(echo.classify(Some("t"), &update("t", "one")), Verdict::Remote);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut echo = EchoSuppressor::new(2);
        echo.arm("a");
        echo.arm("b");
        echo.arm("c");
        assert_eq!(echo.pending().collect::<Vec<_>>(), vec!["b", "c"]);

        assert_eq!(EchoSuppressor::new(0).capacity(), 1);
    }

    #[test]
    fn test_acknowledge() {
        let mut echo = EchoSuppressor::default();
        echo.arm("a");
        echo.arm("b");

        assert_eq!(echo.acknowledge(Some("b")).as_deref(), Some("b"));
        assert_eq!(echo.acknowledge(Some("zzz")), None);
        assert_eq!(echo.acknowledge(None).as_deref(), Some("a"));
        assert_eq!(echo.state(), EchoState::Idle);
    }

    #[test]
    fn test_disarm_removes_latest() {
        let mut echo = EchoSuppressor::default();
        echo.arm("x");
        echo.arm("y");
        echo.arm("x");
        echo.disarm("x");
        assert_eq!(echo.pending().collect::<Vec<_>>(), vec!["x", "y"]);
    }
}
