//! JSON frames exchanged with publishers and subscribers.
//!
//! The same shapes are used by the balancer, which only needs to peek at the
//! routing fields, and by the broker and replay tiers, which act on them.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::keys::{TopicError, validate_topic};

/// Status value carried by successful publish responses and acknowledgements.
pub const STATUS_OK: &str = "ok";

/// Error for malformed client input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error(transparent)]
    InvalidTopic(#[from] TopicError),
    #[error("subscriber_id '{0}' cannot be used as a key component")]
    InvalidSubscriberId(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::InvalidJson(err.to_string())
    }
}

/// Body of `POST /publish`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_id: Option<String>,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub message: String,
}

impl PublishRequest {
    /// Parses and validates a publish body.
    ///
    /// Missing or empty `topic`/`message` are rejected, as is a topic that
    /// cannot be used as a key component.
    pub fn from_body(body: &[u8]) -> Result<Self, ProtocolError> {
        let request: PublishRequest = serde_json::from_slice(body)?;
        if request.topic.is_empty() {
            return Err(ProtocolError::MissingField("topic"));
        }
        if request.message.is_empty() {
            return Err(ProtocolError::MissingField("message"));
        }
        validate_topic(&request.topic)?;
        Ok(request)
    }

    /// Raw payload bytes as stored and fanned out.
    pub fn payload(&self) -> Bytes {
        Bytes::copy_from_slice(self.message.as_bytes())
    }
}

/// Body returned by a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResponse {
    pub status: String,
}

impl PublishResponse {
    pub fn ok() -> Self {
        Self {
            status: STATUS_OK.to_string(),
        }
    }
}

/// First frame a subscriber sends on a push or replay connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub subscriber_id: String,
    #[serde(default)]
    pub topic: String,
}

impl SubscribeRequest {
    pub fn new(subscriber_id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            topic: topic.into(),
        }
    }

    /// Parses and validates a subscription handshake frame.
    ///
    /// `subscriber_id` names the checkpoint blob, so it follows the same
    /// rules as a topic.
    pub fn from_frame(frame: &[u8]) -> Result<Self, ProtocolError> {
        let request: SubscribeRequest = serde_json::from_slice(frame)?;
        if request.subscriber_id.is_empty() {
            return Err(ProtocolError::MissingField("subscriber_id"));
        }
        if request.topic.is_empty() {
            return Err(ProtocolError::MissingField("topic"));
        }
        validate_topic(&request.topic)?;
        if validate_topic(&request.subscriber_id).is_err() {
            return Err(ProtocolError::InvalidSubscriberId(request.subscriber_id));
        }
        Ok(request)
    }
}

/// Error notification sent to a client before the server closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub error: String,
}

impl ErrorFrame {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({ "error": self.error }).to_string()
    }
}

/// One archived segment streamed by the replay tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFrame {
    /// Segment key; the client echoes it back in its acknowledgement.
    pub batch_id: String,
    /// Segment content. Non UTF-8 bytes are replaced.
    pub messages: String,
}

impl BatchFrame {
    pub fn new(batch_id: impl Into<String>, content: &[u8]) -> Self {
        Self {
            batch_id: batch_id.into(),
            messages: String::from_utf8_lossy(content).into_owned(),
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Acknowledgement a replay client sends after processing a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckFrame {
    pub batch_id: String,
    #[serde(default)]
    pub status: String,
}

impl AckFrame {
    pub fn ok(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            status: STATUS_OK.to_string(),
        }
    }

    pub fn from_frame(frame: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(frame)?)
    }

    /// Returns true if this is a successful acknowledgement of `batch_id`.
    pub fn acknowledges(&self, batch_id: &str) -> bool {
        self.batch_id == batch_id && self.status == STATUS_OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_publish_request() {
        // given
        let body = br#"{"publisher_id":"p1","topic":"orders","message":"m1"}"#;

        // when
        let request = PublishRequest::from_body(body).unwrap();

        // then
        assert_eq!(request.publisher_id.as_deref(), Some("p1"));
        assert_eq!(request.topic, "orders");
        assert_eq!(request.payload(), Bytes::from("m1"));
    }

    #[test]
    fn should_accept_publish_without_publisher_id() {
        let request = PublishRequest::from_body(br#"{"topic":"orders","message":"m1"}"#).unwrap();
        assert!(request.publisher_id.is_none());
    }

    #[test]
    fn should_reject_publish_with_missing_fields() {
        assert_eq!(
            PublishRequest::from_body(br#"{"message":"m1"}"#),
            Err(ProtocolError::MissingField("topic"))
        );
        assert_eq!(
            PublishRequest::from_body(br#"{"topic":"orders"}"#),
            Err(ProtocolError::MissingField("message"))
        );
    }

    #[test]
    fn should_reject_publish_with_invalid_json() {
        let result = PublishRequest::from_body(b"not json");
        assert!(matches!(result, Err(ProtocolError::InvalidJson(_))));
    }

    #[test]
    fn should_reject_publish_with_path_in_topic() {
        let result = PublishRequest::from_body(br#"{"topic":"a/b","message":"m1"}"#);
        assert!(matches!(result, Err(ProtocolError::InvalidTopic(_))));
    }

    #[test]
    fn should_parse_subscribe_request() {
        // given
        let frame = br#"{"subscriber_id":"user-42","topic":"orders"}"#;

        // when
        let request = SubscribeRequest::from_frame(frame).unwrap();

        // then
        assert_eq!(request, SubscribeRequest::new("user-42", "orders"));
    }

    #[test]
    fn should_reject_subscriber_id_that_is_not_a_key_component() {
        for id in ["a/b", "a\\b", "..", "."] {
            let frame = serde_json::json!({ "subscriber_id": id, "topic": "orders" }).to_string();
            let result = SubscribeRequest::from_frame(frame.as_bytes());
            assert_eq!(
                result,
                Err(ProtocolError::InvalidSubscriberId(id.to_string())),
                "accepted {}",
                id
            );
        }
    }

    #[test]
    fn should_reject_subscribe_without_subscriber_id() {
        let result = SubscribeRequest::from_frame(br#"{"topic":"orders"}"#);
        assert_eq!(result, Err(ProtocolError::MissingField("subscriber_id")));
    }

    #[test]
    fn should_encode_batch_frame() {
        // given
        let frame = BatchFrame::new("orders/2024-01-01/orders_1000.dat", b"m1\nm2\n");

        // when
        let json: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();

        // then
        assert_eq!(json["batch_id"], "orders/2024-01-01/orders_1000.dat");
        assert_eq!(json["messages"], "m1\nm2\n");
    }

    #[test]
    fn should_only_acknowledge_matching_ok_ack() {
        // given
        let ok = AckFrame::from_frame(br#"{"batch_id":"k1","status":"ok"}"#).unwrap();
        let failed = AckFrame::from_frame(br#"{"batch_id":"k1","status":"error"}"#).unwrap();
        let missing_status = AckFrame::from_frame(br#"{"batch_id":"k1"}"#).unwrap();

        // then
        assert!(ok.acknowledges("k1"));
        assert!(!ok.acknowledges("k2"));
        assert!(!failed.acknowledges("k1"));
        assert!(!missing_status.acknowledges("k1"));
    }

    #[test]
    fn should_encode_error_frame() {
        let frame = ErrorFrame::new("Invalid subscription request");
        assert_eq!(frame.to_json(), r#"{"error":"Invalid subscription request"}"#);
    }
}
