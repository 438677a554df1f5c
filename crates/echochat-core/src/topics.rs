//! Known topics and their last reported status.

use echochat_protocol::TopicStatus;
use serde::Serialize;
use tracing::debug;

use crate::error::ClientError;

/// A topic known to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topic {
    pub name: String,
    /// `None` until a status reply arrives.
    pub subscriber_count: Option<u64>,
    /// Whether the server reports this client as subscribed.
    pub subscribed: Option<bool>,
    /// Time of the last publish, as reported by the server.
    pub last_update: Option<String>,
}

impl Topic {
    fn new(name: String) -> Self {
        Self {
            name,
            subscriber_count: None,
            subscribed: None,
            last_update: None,
        }
    }
}

/// Ordered list of topics from the latest `LIST_TOPICS` reply.
#[derive(Debug, Clone, Default)]
pub struct TopicStore {
    topics: Vec<Topic>,
}

impl TopicStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list. Order is kept; repeated names collapse onto
    /// their first occurrence.
    pub fn replace<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.topics.clear();
        for name in names {
            if self.position(&name).is_none() {
                self.topics.push(Topic::new(name));
            }
        }
        debug!(count = self.topics.len(), "Topic list replaced");
    }

    /// Apply a status reply to the matching topic.
    ///
    /// Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::StaleReference`] if the topic is not listed;
    /// the store is left untouched.
    pub fn apply_status(&mut self, status: &TopicStatus) -> Result<bool, ClientError> {
        let index = self
            .position(&status.topic)
            .ok_or_else(|| ClientError::StaleReference(status.topic.clone()))?;
        let topic = &mut self.topics[index];

        let subscribed = status.is_subscribed().or(topic.subscribed);
        let last_update = status.last_update.clone().or_else(|| topic.last_update.clone());
        let changed = topic.subscriber_count != Some(status.subscribers)
            || topic.subscribed != subscribed
            || topic.last_update != last_update;

        topic.subscriber_count = Some(status.subscribers);
        topic.subscribed = subscribed;
        topic.last_update = last_update;
        Ok(changed)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.topics.iter().position(|t| t.name == name)
    }

    /// Topic names in list order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.topics.iter().map(|t| t.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn clear(&mut self) {
        self.topics.clear();
    }
}
