//! Per-connection client session.

use serde::Serialize;
use tracing::debug;

use crate::echo::{EchoSuppressor, Side};
use crate::topics::TopicStore;

/// A chat message received for the current topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub topic: String,
    pub text: String,
    pub side: Side,
    pub timestamp: Option<String>,
}

/// Everything the client knows about the conversation on one connection.
///
/// Built empty when a connection opens and [`reset`](Session::reset) when it
/// closes; every response handler works on this explicitly.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub(crate) topics: TopicStore,
    pub(crate) echo: EchoSuppressor,
    pub(crate) current_topic: Option<String>,
    pub(crate) chat: Vec<ChatMessage>,
    pub(crate) spinner: bool,
}

impl Session {
    /// Create an empty session tracking at most `max_pending` own messages.
    #[must_use]
    pub fn new(max_pending: usize) -> Self {
        Self {
            echo: EchoSuppressor::new(max_pending),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn topics(&self) -> &TopicStore {
        &self.topics
    }

    #[must_use]
    pub fn echo(&self) -> &EchoSuppressor {
        &self.echo
    }

    #[must_use]
    pub fn current_topic(&self) -> Option<&str> {
        self.current_topic.as_deref()
    }

    /// Messages received for the current topic, oldest first.
    #[must_use]
    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    /// Whether a topic list request is in progress.
    #[must_use]
    pub fn spinner(&self) -> bool {
        self.spinner
    }

    /// Enter a topic. Chat state of the previous topic is dropped, and so are
    /// own messages still awaiting their echo there.
    pub(crate) fn enter_topic(&mut self, topic: String) {
        if self
            .current_topic
            .as_deref()
            .is_some_and(|previous| previous != topic)
        {
            self.echo.clear();
        }
        self.chat.clear();
        debug!(topic = %topic, "Current topic set");
        self.current_topic = Some(topic);
    }

    /// Leave the current topic.
    pub(crate) fn leave_topic(&mut self) -> Option<String> {
        self.chat.clear();
        self.echo.clear();
        self.current_topic.take()
    }

    /// Teardown on connection close.
    pub fn reset(&mut self) {
        self.topics.clear();
        self.echo.clear();
        self.current_topic = None;
        self.chat.clear();
        self.spinner = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switching_topic_drops_previous_state() {
        let mut session = Session::new(4);
        session.enter_topic("a".to_string());
        session.echo.arm("hello");
        session.chat.push(ChatMessage {
            topic: "a".to_string(),
            text: "hi".to_string(),
            side: Side::Left,
            timestamp: None,
        });

        session.enter_topic("b".to_string());
        assert_eq!(session.current_topic(), Some("b"));
        assert!(session.chat().is_empty());
        assert!(session.echo().is_empty());
    }

    #[test]
    fn test_first_topic_keeps_early_publish() {
        // Subscribe and publish sent back to back, confirmation arrives after
        let mut session = Session::new(4);
        session.echo.arm("hello");
        session.enter_topic("a".to_string());
        assert_eq!(session.echo().front(), Some("hello"));
    }

    #[test]
    fn test_reset() {
        let mut session = Session::new(4);
        session.topics.replace(vec!["a".to_string()]);
        session.enter_topic("a".to_string());
        session.spinner = true;

        session.reset();
        assert!(session.topics().is_empty());
        assert_eq!(session.current_topic(), None);
        assert!(!session.spinner());
        assert_eq!(session.echo().capacity(), 4);
    }
}
