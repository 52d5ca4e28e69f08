//! Blob key layout shared by the broker and the replay tier.
//!
//! Archived segment keys embed a sortable timestamp, so lexicographic order of
//! the keys under one topic's prefix is creation order. The replay tier relies
//! on that to resume strictly after a checkpointed key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Namespace used by the JSONL emitter, checkpoints and the topic registry.
pub const NAMESPACE: &str = "rayflux";

/// Suffix of segments sealed by the ingestion engine.
pub const DATED_SEGMENT_SUFFIX: &str = ".dat";

/// Suffix of batches written by the JSONL emitter.
pub const JSONL_SEGMENT_SUFFIX: &str = ".jsonl";

/// Reason a topic name was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    #[error("topic must not be empty")]
    Empty,
    #[error("topic '{0}' contains a path separator")]
    PathSeparator(String),
    #[error("topic '{0}' is a reserved path component")]
    Reserved(String),
}

/// Checks that `topic` can be embedded in file names and blob keys.
pub fn validate_topic(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }
    if topic.contains('/') || topic.contains('\\') {
        return Err(TopicError::PathSeparator(topic.to_string()));
    }
    if topic == "." || topic == ".." {
        return Err(TopicError::Reserved(topic.to_string()));
    }
    Ok(())
}

/// Where archived segments of a topic live and how they are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentLayout {
    /// `{topic}/{YYYY-MM-DD}/{topic}_{unixtime}.dat`, written by the segment engine.
    #[default]
    Dated,
    /// `rayflux/{topic}/{ISO8601-millis}.jsonl`, written by the JSONL emitter.
    Jsonl,
}

impl SegmentLayout {
    /// Listing prefix holding every segment of `topic`.
    pub fn prefix(&self, topic: &str) -> String {
        match self {
            SegmentLayout::Dated => format!("{}/", topic),
            SegmentLayout::Jsonl => format!("{}/{}/", NAMESPACE, topic),
        }
    }

    /// Returns true if `key` is a segment of `topic` in this layout.
    pub fn matches(&self, topic: &str, key: &str) -> bool {
        let suffix = match self {
            SegmentLayout::Dated => DATED_SEGMENT_SUFFIX,
            SegmentLayout::Jsonl => JSONL_SEGMENT_SUFFIX,
        };
        key.starts_with(&self.prefix(topic)) && key.ends_with(suffix)
    }
}

impl std::str::FromStr for SegmentLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dated" => Ok(SegmentLayout::Dated),
            "jsonl" => Ok(SegmentLayout::Jsonl),
            other => Err(format!("unknown segment layout '{}'", other)),
        }
    }
}

/// Local file name of the ingestion segment with the given id.
pub fn segment_file_name(topic: &str, segment_id: u64) -> String {
    format!("{}_{}{}", topic, segment_id, DATED_SEGMENT_SUFFIX)
}

/// Archive key of an ingestion segment.
///
/// `segment_id` is the segment's creation time in Unix seconds; the date
/// directory is derived from the same instant so keys stay ordered.
pub fn dated_segment_key(topic: &str, segment_id: u64) -> String {
    let date = DateTime::<Utc>::from_timestamp(segment_id as i64, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d");
    format!("{}/{}/{}", topic, date, segment_file_name(topic, segment_id))
}

/// Archive key of a JSONL emitter batch flushed at `unix_millis`.
pub fn jsonl_segment_key(topic: &str, unix_millis: i64) -> String {
    let stamp = DateTime::<Utc>::from_timestamp_millis(unix_millis)
        .unwrap_or_default()
        .format("%Y-%m-%dT%H-%M-%S%.3fZ");
    format!("{}/{}/{}{}", NAMESPACE, topic, stamp, JSONL_SEGMENT_SUFFIX)
}

/// Key of the checkpoint of `subscriber_id` on `topic`.
pub fn checkpoint_key(topic: &str, subscriber_id: &str) -> String {
    format!("{}/checkpoints/{}/{}.json", NAMESPACE, topic, subscriber_id)
}

/// Key of the topic registry record.
pub fn topic_record_key(topic: &str) -> String {
    format!("{}/topic/{}.json", NAMESPACE, topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_reject_invalid_topics() {
        assert_eq!(validate_topic(""), Err(TopicError::Empty));
        assert!(matches!(
            validate_topic("a/b"),
            Err(TopicError::PathSeparator(_))
        ));
        assert!(matches!(validate_topic(".."), Err(TopicError::Reserved(_))));
        assert!(validate_topic("orders").is_ok());
    }

    #[test]
    fn should_build_dated_segment_key() {
        // given: 2024-01-01T00:00:00Z
        let segment_id = 1_704_067_200;

        // when
        let key = dated_segment_key("orders", segment_id);

        // then
        assert_eq!(key, "orders/2024-01-01/orders_1704067200.dat");
    }

    #[test]
    fn should_build_jsonl_segment_key_with_millis() {
        // given
        let unix_millis = 1_704_067_200_123;

        // when
        let key = jsonl_segment_key("orders", unix_millis);

        // then
        assert_eq!(key, "rayflux/orders/2024-01-01T00-00-00.123Z.jsonl");
    }

    #[test]
    fn should_order_dated_keys_across_midnight() {
        // given: one second before and at midnight
        let before = dated_segment_key("orders", 1_704_067_199);
        let after = dated_segment_key("orders", 1_704_067_200);

        // then
        assert!(before < after);
    }

    #[test]
    fn should_build_checkpoint_and_registry_keys() {
        assert_eq!(
            checkpoint_key("orders", "sub-1"),
            "rayflux/checkpoints/orders/sub-1.json"
        );
        assert_eq!(topic_record_key("orders"), "rayflux/topic/orders.json");
    }

    #[test]
    fn should_match_only_segments_of_layout() {
        // given
        let dated = SegmentLayout::Dated;
        let jsonl = SegmentLayout::Jsonl;

        // then
        assert!(dated.matches("orders", "orders/2024-01-01/orders_1000.dat"));
        assert!(!dated.matches("orders", "orders/notes.txt"));
        assert!(jsonl.matches("orders", "rayflux/orders/2024-01-01T00-00-00.000Z.jsonl"));
        assert!(!jsonl.matches("checkpoints", "rayflux/checkpoints/orders/sub-1.json"));
    }

    #[test]
    fn should_parse_layout_names() {
        assert_eq!("dated".parse::<SegmentLayout>(), Ok(SegmentLayout::Dated));
        assert_eq!("jsonl".parse::<SegmentLayout>(), Ok(SegmentLayout::Jsonl));
        assert!("other".parse::<SegmentLayout>().is_err());
    }
}
