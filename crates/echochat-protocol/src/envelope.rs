//! Envelope types for the EchoChat protocol.
//!
//! Every exchange is a JSON object. Requests name an operation and carry its
//! parameters; responses and server pushes carry a status, the operation they
//! concern and an operation-specific `data` object.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::ProtocolError;

/// Correlation identifier attached to outgoing requests.
pub type RequestId = u64;

/// Operation identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationTag {
    SubscribeTopic,
    UnsubscribeTopic,
    PublishTopic,
    ListTopics,
    GetTopicStatus,
    /// Server push announcing a message published into a topic.
    UpdateTopic,
}

impl OperationTag {
    /// Every known tag, in declaration order.
    pub const ALL: [OperationTag; 6] = [
        OperationTag::SubscribeTopic,
        OperationTag::UnsubscribeTopic,
        OperationTag::PublishTopic,
        OperationTag::ListTopics,
        OperationTag::GetTopicStatus,
        OperationTag::UpdateTopic,
    ];

    /// The tag as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationTag::SubscribeTopic => "SUBSCRIBE_TOPIC",
            OperationTag::UnsubscribeTopic => "UNSUBSCRIBE_TOPIC",
            OperationTag::PublishTopic => "PUBLISH_TOPIC",
            OperationTag::ListTopics => "LIST_TOPICS",
            OperationTag::GetTopicStatus => "GET_TOPIC_STATUS",
            OperationTag::UpdateTopic => "UPDATE_TOPIC",
        }
    }

    /// Parse a wire tag. Unknown tags yield `None`.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }

    /// Whether a client may send this operation.
    #[must_use]
    pub fn is_request(&self) -> bool {
        !matches!(self, OperationTag::UpdateTopic)
    }
}

impl fmt::Display for OperationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request parameters. Absent fields are not serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    /// Topic name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Message text, for publishes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, echoed back by servers that support it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Operation to perform.
    pub function: OperationTag,
    /// Operation parameters.
    #[serde(default)]
    pub parameters: Parameters,
}

impl Request {
    fn new(function: OperationTag, parameters: Parameters) -> Self {
        Self {
            id: None,
            function,
            parameters,
        }
    }

    /// Create a SUBSCRIBE_TOPIC request.
    #[must_use]
    pub fn subscribe(name: impl Into<String>) -> Self {
        Self::new(
            OperationTag::SubscribeTopic,
            Parameters {
                name: Some(name.into()),
                message: None,
            },
        )
    }

    /// Create an UNSUBSCRIBE_TOPIC request.
    #[must_use]
    pub fn unsubscribe(name: impl Into<String>) -> Self {
        Self::new(
            OperationTag::UnsubscribeTopic,
            Parameters {
                name: Some(name.into()),
                message: None,
            },
        )
    }

    /// Create a PUBLISH_TOPIC request.
    #[must_use]
    pub fn publish(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            OperationTag::PublishTopic,
            Parameters {
                name: Some(name.into()),
                message: Some(message.into()),
            },
        )
    }

    /// Create a LIST_TOPICS request.
    #[must_use]
    pub fn list_topics() -> Self {
        Self::new(OperationTag::ListTopics, Parameters::default())
    }

    /// Create a GET_TOPIC_STATUS request.
    #[must_use]
    pub fn topic_status(name: impl Into<String>) -> Self {
        Self::new(
            OperationTag::GetTopicStatus,
            Parameters {
                name: Some(name.into()),
                message: None,
            },
        )
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_id(mut self, id: RequestId) -> Self {
        self.id = Some(id);
        self
    }

    /// The topic name parameter, if any.
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.parameters.name.as_deref()
    }
}

/// Response status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Success,
    /// Any other status string, typically "failure".
    Other(String),
}

impl Status {
    /// Whether this is the success status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }

    /// The status as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Status::Success => "success",
            Status::Other(s) => s,
        }
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        if s == "success" {
            Status::Success
        } else {
            Status::Other(s)
        }
    }
}

impl From<Status> for String {
    fn from(status: Status) -> String {
        match status {
            Status::Success => "success".to_string(),
            Status::Other(s) => s,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An incoming response or server notification.
///
/// `function` is kept as the raw wire string so an unrecognized tag can be
/// reported rather than rejected at decode time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// Correlation id echoed from the request, if the server supports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Outcome of the operation.
    pub status: Status,
    /// Operation tag, absent on some failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// Operation-specific payload.
    pub data: serde_json::Value,
    /// Error description on failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Create a success response.
    #[must_use]
    pub fn success(function: OperationTag, data: serde_json::Value) -> Self {
        Self {
            id: None,
            status: Status::Success,
            function: Some(function.as_str().to_string()),
            data,
            error: None,
        }
    }

    /// Create a failure response.
    #[must_use]
    pub fn failure(function: Option<OperationTag>, error: impl Into<String>) -> Self {
        Self {
            id: None,
            status: Status::Other("failure".to_string()),
            function: function.map(|f| f.as_str().to_string()),
            data: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_id(mut self, id: RequestId) -> Self {
        self.id = Some(id);
        self
    }

    /// Whether the status is success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The parsed operation tag. `None` if absent or unknown.
    #[must_use]
    pub fn operation(&self) -> Option<OperationTag> {
        self.function.as_deref().and_then(OperationTag::parse)
    }

    /// Deserialize `data` into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidData`] if `data` has the wrong shape.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            ProtocolError::InvalidData(format!(
                "{}: {}",
                self.function.as_deref().unwrap_or("<no function>"),
                e
            ))
        })
    }

    /// LIST_TOPICS payload.
    ///
    /// # Errors
    ///
    /// Returns an error if `data.topic_list` is missing or not a string list.
    pub fn topic_list(&self) -> Result<TopicList, ProtocolError> {
        self.payload()
    }

    /// GET_TOPIC_STATUS payload.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` lacks `topic` or a numeric `subscribers`.
    pub fn topic_status(&self) -> Result<TopicStatus, ProtocolError> {
        self.payload()
    }

    /// UPDATE_TOPIC payload.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` lacks `name` or `message`.
    pub fn topic_update(&self) -> Result<TopicUpdate, ProtocolError> {
        self.payload()
    }

    /// Subscribe/unsubscribe/publish confirmation payload. Every field is optional.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is neither null nor an object.
    pub fn confirmation(&self) -> Result<Confirmation, ProtocolError> {
        if self.data.is_null() {
            return Ok(Confirmation::default());
        }
        self.payload()
    }
}

/// `data` of a LIST_TOPICS response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicList {
    pub topic_list: Vec<String>,
}

/// `data` of a GET_TOPIC_STATUS response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStatus {
    /// Topic the status describes.
    pub topic: String,
    /// Number of subscribers.
    pub subscribers: u64,
    /// "subscribed" or "not subscribed", relative to the asking client.
    #[serde(default)]
    pub topic_status: Option<String>,
    /// Time of the last publish, or "never".
    #[serde(default)]
    pub last_update: Option<String>,
}

impl TopicStatus {
    /// Whether the server reports the asking client as subscribed.
    #[must_use]
    pub fn is_subscribed(&self) -> Option<bool> {
        match self.topic_status.as_deref() {
            Some("subscribed") => Some(true),
            Some("not subscribed") => Some(false),
            _ => None,
        }
    }
}

/// `data` of an UPDATE_TOPIC push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicUpdate {
    /// Topic the message was published into.
    pub name: String,
    /// Message text.
    pub message: String,
    /// Server-side publish time.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// `data` of subscribe, unsubscribe and publish confirmations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_tag_wire_names() {
        for tag in OperationTag::ALL {
            assert_eq!(OperationTag::parse(tag.as_str()), Some(tag));
            let json = serde_json::to_value(tag).unwrap();
            assert_eq!(json, json!(tag.as_str()));
        }
        assert_eq!(OperationTag::parse("DELETE_TOPIC"), None);
        assert!(!OperationTag::UpdateTopic.is_request());
        assert!(OperationTag::ListTopics.is_request());
    }

    #[test]
    fn test_request_shapes() {
        let list = serde_json::to_value(Request::list_topics()).unwrap();
        assert_eq!(list, json!({"function": "LIST_TOPICS", "parameters": {}}));

        let publish = serde_json::to_value(Request::publish("general", "hello").with_id(7)).unwrap();
        assert_eq!(
            publish,
            json!({
                "id": 7,
                "function": "PUBLISH_TOPIC",
                "parameters": {"name": "general", "message": "hello"}
            })
        );
    }

    #[test]
    fn test_status_conversion() {
        assert!(Status::from("success".to_string()).is_success());
        let failure = Status::from("failure".to_string());
        assert!(!failure.is_success());
        assert_eq!(failure.as_str(), "failure");
    }

    #[test]
    fn test_topic_status_payload() {
        let response = Response::success(
            OperationTag::GetTopicStatus,
            json!({
                "topic": "general",
                "topic_status": "not subscribed",
                "last_update": "never",
                "subscribers": 3
            }),
        );
        let status = response.topic_status().unwrap();
        assert_eq!(status.topic, "general");
        assert_eq!(status.subscribers, 3);
        assert_eq!(status.is_subscribed(), Some(false));
        assert_eq!(status.last_update.as_deref(), Some("never"));
    }

    #[test]
    fn test_invalid_payload() {
        let response = Response::success(OperationTag::ListTopics, json!({"topics": []}));
        assert!(matches!(
            response.topic_list(),
            Err(ProtocolError::InvalidData(_))
        ));
    }

    #[test]
    fn test_empty_confirmation() {
        let response = Response::success(OperationTag::UnsubscribeTopic, serde_json::Value::Null);
        assert_eq!(response.confirmation().unwrap(), Confirmation::default());
    }
}
