//! Outstanding requests awaiting a reply.

use std::collections::VecDeque;

use echochat_protocol::{OperationTag, RequestId};

/// Default number of unanswered requests remembered.
pub const DEFAULT_MAX_PENDING_REQUESTS: usize = 256;

/// A request that has been sent and not yet answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: RequestId,
    pub function: OperationTag,
    pub topic: Option<String>,
    /// Text of a publish request.
    pub message: Option<String>,
    /// Issued by a topic list refresh rather than by the user.
    pub fan_out: bool,
}

/// Requests in send order.
///
/// Replies that echo a request id are matched by id. The current server does
/// not echo ids, so replies without one are matched to the oldest request
/// with the same operation tag (and the same topic, when the reply names one).
///
/// The queue is bounded: a request the server never answers is eventually
/// pushed out by newer ones.
#[derive(Debug, Clone)]
pub struct PendingRequests {
    entries: VecDeque<PendingRequest>,
    capacity: usize,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_PENDING_REQUESTS)
    }
}

impl PendingRequests {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Remember a sent request, returning the oldest one if it had to make
    /// room.
    pub fn insert(&mut self, request: PendingRequest) -> Option<PendingRequest> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(request);
        evicted
    }

    /// Remove the request with the given id.
    pub fn remove(&mut self, id: RequestId) -> Option<PendingRequest> {
        let index = self.entries.iter().position(|p| p.id == id)?;
        self.entries.remove(index)
    }

    /// Remove and return the request a reply answers, if any.
    pub fn resolve(
        &mut self,
        id: Option<RequestId>,
        function: OperationTag,
        topic: Option<&str>,
    ) -> Option<PendingRequest> {
        let by_id = id.and_then(|id| self.entries.iter().position(|p| p.id == id));
        let index = by_id.or_else(|| {
            self.entries.iter().position(|p| {
                p.function == function
                    && match (topic, p.topic.as_deref()) {
                        (Some(reply), Some(sent)) => reply == sent,
                        _ => true,
                    }
            })
        })?;
        self.entries.remove(index)
    }

    /// Drop the outstanding status requests of a list refresh.
    pub fn abandon_fan_out(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|p| !p.fan_out);
        before - self.entries.len()
    }

    /// Number of status requests of a list refresh still unanswered.
    #[must_use]
    pub fn fan_out_count(&self) -> usize {
        self.entries.iter().filter(|p| p.fan_out).count()
    }

    /// Number of outstanding requests with the given tag.
    #[must_use]
    pub fn count(&self, function: OperationTag) -> usize {
        self.entries.iter().filter(|p| p.function == function).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(id: RequestId, function: OperationTag, topic: Option<&str>) -> PendingRequest {
        PendingRequest {
            id,
            function,
            topic: topic.map(str::to_string),
            message: None,
            fan_out: false,
        }
    }

    #[test]
    fn test_resolve_by_id() {
        let mut requests = PendingRequests::new();
        requests.insert(pending(1, OperationTag::SubscribeTopic, Some("a")));
        requests.insert(pending(2, OperationTag::SubscribeTopic, Some("b")));

        let resolved = requests.resolve(Some(2), OperationTag::SubscribeTopic, None).unwrap();
        assert_eq!(resolved.id, 2);
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn test_resolve_oldest_with_same_tag() {
        let mut requests = PendingRequests::new();
        requests.insert(pending(1, OperationTag::ListTopics, None));
        requests.insert(pending(2, OperationTag::PublishTopic, Some("a")));
        requests.insert(pending(3, OperationTag::PublishTopic, Some("a")));

        let resolved = requests.resolve(None, OperationTag::PublishTopic, None).unwrap();
        assert_eq!(resolved.id, 2);
        assert!(requests.resolve(None, OperationTag::UnsubscribeTopic, None).is_none());
    }

    #[test]
    fn test_resolve_status_by_topic() {
        let mut requests = PendingRequests::new();
        requests.insert(pending(1, OperationTag::GetTopicStatus, Some("a")));
        requests.insert(pending(2, OperationTag::GetTopicStatus, Some("b")));

        let resolved = requests
            .resolve(None, OperationTag::GetTopicStatus, Some("b"))
            .unwrap();
        assert_eq!(resolved.id, 2);
        assert!(requests
            .resolve(None, OperationTag::GetTopicStatus, Some("zzz"))
            .is_none());
        assert_eq!(requests.count(OperationTag::GetTopicStatus), 1);
    }

    #[test]
    fn test_fan_out_tracked_apart_from_user_requests() {
        let mut requests = PendingRequests::new();
        requests.insert(PendingRequest {
            fan_out: true,
            ..pending(1, OperationTag::GetTopicStatus, Some("a"))
        });
        requests.insert(pending(2, OperationTag::GetTopicStatus, Some("b")));
        requests.insert(PendingRequest {
            fan_out: true,
            ..pending(3, OperationTag::GetTopicStatus, Some("c"))
        });

        assert_eq!(requests.fan_out_count(), 2);
        assert_eq!(requests.count(OperationTag::GetTopicStatus), 3);
        assert_eq!(requests.abandon_fan_out(), 2);
        assert_eq!(requests.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_oldest_evicted_when_full() {
        let mut requests = PendingRequests::with_capacity(2);
        assert!(requests.insert(pending(1, OperationTag::ListTopics, None)).is_none());
        assert!(requests.insert(pending(2, OperationTag::ListTopics, None)).is_none());

        let evicted = requests.insert(pending(3, OperationTag::ListTopics, None));
        assert_eq!(evicted.map(|p| p.id), Some(1));
        assert_eq!(requests.len(), 2);
        assert_eq!(requests.remove(3).map(|p| p.id), Some(3));
        assert!(requests.remove(3).is_none());
    }
}
