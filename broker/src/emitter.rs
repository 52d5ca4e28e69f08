//! JSONL archive path.
//!
//! Accepted publishes are cached per topic as JSON lines and flushed to
//! `rayflux/{topic}/{timestamp}.jsonl` when the cache fills up or on the
//! auto-flush interval. A topic's cache stays locked while its batch uploads,
//! so batches of one topic reach the store one at a time and in key order. A
//! failed upload puts the bytes back before anything newer is cached.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use bytes::BytesMut;
use chrono::SecondsFormat;
use common::keys::jsonl_segment_key;
use common::{BlobStore, Clock};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use crate::config::EmitterConfig;
use crate::error::Result;

/// One line of a JSONL batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub topic: String,
    /// RFC 3339 UTC time the message was accepted.
    pub timestamp: String,
    pub message: String,
}

#[derive(Default)]
struct TopicCache {
    bytes: BytesMut,
    last_flush: Option<SystemTime>,
    last_stamp_millis: i64,
}

/// Per-topic JSONL cache with size and interval based flushing.
pub struct JsonlEmitter {
    config: EmitterConfig,
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    caches: RwLock<HashMap<String, Arc<Mutex<TopicCache>>>>,
}

impl JsonlEmitter {
    pub fn new(config: EmitterConfig, store: Arc<dyn BlobStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store,
            clock,
            caches: RwLock::new(HashMap::new()),
        }
    }

    /// Caches `message` for `topic`, flushing when the cache reaches
    /// `max_cache_bytes`.
    pub async fn add(&self, topic: &str, message: &str) -> Result<()> {
        let record = StoredMessage {
            topic: topic.to_string(),
            timestamp: self.clock.utc().to_rfc3339_opts(SecondsFormat::Secs, true),
            message: message.to_string(),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let topic_cache = self.cache(topic);
        let mut cache = topic_cache.lock().await;
        let mut result = Ok(());
        if !cache.bytes.is_empty() && cache.bytes.len() + line.len() >= self.config.max_cache_bytes {
            result = self.flush(topic, &mut cache).await;
        }
        cache.bytes.extend_from_slice(&line);
        if result.is_ok() && cache.bytes.len() >= self.config.max_cache_bytes {
            result = self.flush(topic, &mut cache).await;
        }
        result
    }

    /// Number of bytes currently cached for `topic`.
    pub async fn cached_bytes(&self, topic: &str) -> usize {
        let cache = self
            .caches
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(topic)
            .cloned();
        match cache {
            Some(cache) => cache.lock().await.bytes.len(),
            None => 0,
        }
    }

    /// Flushes every non-empty cache whose last flush is at least one
    /// interval old. Returns the number of batches uploaded.
    pub async fn flush_due(&self) -> usize {
        let now = self.clock.now();
        let interval = self.config.flush_interval;
        self.flush_where(|cache| match cache.last_flush {
            Some(last) => now.duration_since(last).unwrap_or_default() >= interval,
            None => true,
        })
        .await
    }

    /// Flushes every non-empty cache.
    pub async fn flush_all(&self) -> usize {
        self.flush_where(|_| true).await
    }

    /// Spawns the auto-flush task. On cancellation everything left in the
    /// caches is flushed before the task ends.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let emitter = self.clone();
        tokio::spawn(async move {
            let period = emitter.config.flush_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        emitter.flush_due().await;
                    }
                }
            }
            let flushed = emitter.flush_all().await;
            tracing::info!("emitter stopped after flushing {} batches", flushed);
        })
    }

    fn cache(&self, topic: &str) -> Arc<Mutex<TopicCache>> {
        if let Some(cache) = self
            .caches
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(topic)
        {
            return cache.clone();
        }
        self.caches
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(topic.to_string())
            .or_default()
            .clone()
    }

    async fn flush_where(&self, due: impl Fn(&TopicCache) -> bool) -> usize {
        let caches: Vec<(String, Arc<Mutex<TopicCache>>)> = self
            .caches
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(topic, cache)| (topic.clone(), cache.clone()))
            .collect();

        let mut flushed = 0;
        for (topic, topic_cache) in caches {
            let mut cache = topic_cache.lock().await;
            if cache.bytes.is_empty() || !due(&cache) {
                continue;
            }
            match self.flush(&topic, &mut cache).await {
                Ok(()) => flushed += 1,
                Err(e) => tracing::error!(topic = %topic, "failed to flush JSONL cache: {}", e),
            }
        }
        flushed
    }

    /// Uploads the cache under a fresh, strictly increasing key. On failure
    /// the bytes go back into the cache and are retried with the next flush.
    async fn flush(&self, topic: &str, cache: &mut TopicCache) -> Result<()> {
        let stamp = self.clock.unix_millis().max(cache.last_stamp_millis + 1);
        cache.last_stamp_millis = stamp;
        cache.last_flush = Some(self.clock.now());
        let key = jsonl_segment_key(topic, stamp);
        let bytes = cache.bytes.split().freeze();

        match self.store.put(&key, bytes.clone()).await {
            Ok(()) => {
                tracing::debug!(topic, bytes = bytes.len(), "flushed {}", key);
                Ok(())
            }
            Err(e) => {
                let mut restored = BytesMut::with_capacity(bytes.len() + cache.bytes.len());
                restored.extend_from_slice(&bytes);
                restored.extend_from_slice(&cache.bytes);
                cache.bytes = restored;
                Err(e.into())
            }
        }
    }
}
