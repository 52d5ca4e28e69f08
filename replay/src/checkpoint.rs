//! Durable per-subscriber read cursors.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use common::keys::checkpoint_key;
use common::{BlobStore, Clock};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Last segment delivered to a subscriber on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub topic: String,
    pub subscriber_id: String,
    /// Key of the last acknowledged segment; empty before the first one.
    #[serde(alias = "last_read_file")]
    pub last_read_key: String,
    #[serde(alias = "last_read_time_utc")]
    pub last_read_time: DateTime<Utc>,
}

impl Checkpoint {
    /// A cursor positioned before every segment.
    pub fn new(
        topic: impl Into<String>,
        subscriber_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            topic: topic.into(),
            subscriber_id: subscriber_id.into(),
            last_read_key: String::new(),
            last_read_time: now,
        }
    }

    /// Moves the cursor to `key`.
    pub fn advance(&mut self, key: impl Into<String>, now: DateTime<Utc>) {
        self.last_read_key = key.into();
        self.last_read_time = now;
    }
}

/// Loads and saves checkpoints under `rayflux/checkpoints/{topic}/{subscriber}.json`.
#[derive(Clone)]
pub struct CheckpointStore {
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
}

impl CheckpointStore {
    pub fn new(store: Arc<dyn BlobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns the stored checkpoint, or a fresh one if none exists.
    pub async fn load(&self, topic: &str, subscriber_id: &str) -> Result<Checkpoint> {
        let key = checkpoint_key(topic, subscriber_id);
        match self.store.get(&key).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| Error::InvalidCheckpoint {
                key,
                message: e.to_string(),
            }),
            None => {
                tracing::debug!(topic, subscriber_id, "no checkpoint, starting from the beginning");
                Ok(Checkpoint::new(topic, subscriber_id, self.clock.utc()))
            }
        }
    }

    /// Stamps `last_read_time` and writes the checkpoint.
    pub async fn save(&self, checkpoint: &mut Checkpoint) -> Result<()> {
        checkpoint.last_read_time = self.clock.utc();
        let key = checkpoint_key(&checkpoint.topic, &checkpoint.subscriber_id);
        let body = serde_json::to_vec(checkpoint)?;
        self.store.put(&key, Bytes::from(body)).await?;
        Ok(())
    }
}
