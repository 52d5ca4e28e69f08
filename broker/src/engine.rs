//! Durable segment engine.
//!
//! Each topic owns a [`BufferPair`] of recent payloads and at most one open
//! segment file, both guarded by the topic's lock. Two supervised tasks run
//! per topic: one rotates the buffers on an interval, the other seals the
//! segment when it grows too large or too old. Sealed segments are uploaded
//! by detached tasks so ingestion never waits on the blob store. Uploads of
//! one topic are chained: each waits for the previous one to finish, so keys
//! become visible in the blob store in key order.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use common::{BlobStore, Clock, validate_topic};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use serde::Serialize;
use tokio::sync::{Mutex, oneshot};
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::buffer::BufferPair;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::segment::{OpenSegment, SealedSegment, next_segment_id};

/// Point-in-time view of a topic's buffers and open segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicStats {
    pub topic: String,
    pub active_buffer: usize,
    pub active_messages: usize,
    pub active_bytes: u64,
    pub standby_bytes: u64,
    pub segment_id: Option<u64>,
    pub segment_bytes: u64,
    pub segment_age_secs: u64,
}

#[derive(Clone, Default)]
struct EngineMetrics {
    topics: Gauge,
    segments_sealed_total: Counter,
    segments_uploaded_total: Counter,
    segment_upload_failures_total: Counter,
    segment_bytes_uploaded_total: Counter,
}

struct TopicState {
    name: String,
    inner: Mutex<TopicInner>,
    cancel: CancellationToken,
}

struct TopicInner {
    buffers: BufferPair,
    segment: Option<OpenSegment>,
    last_segment_id: Option<u64>,
    /// Completes when the most recently scheduled upload has finished.
    upload_tail: Option<oneshot::Receiver<()>>,
}

/// Everything a topic task needs, shared without holding the engine itself.
struct Shared {
    config: EngineConfig,
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    uploads: TaskTracker,
    metrics: EngineMetrics,
}

/// Per-topic double buffering, segment files and archival.
pub struct SegmentEngine {
    shared: Arc<Shared>,
    topics: RwLock<HashMap<String, Arc<TopicState>>>,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl SegmentEngine {
    /// Creates the engine, making sure the data directory exists.
    pub async fn open(
        config: EngineConfig,
        store: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;
        tracing::info!("segment engine writing to {:?}", config.data_dir);
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                store,
                clock,
                uploads: TaskTracker::new(),
                metrics: EngineMetrics::default(),
            }),
            topics: RwLock::new(HashMap::new()),
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
        })
    }

    /// Registers the engine's counters with a Prometheus registry.
    pub fn register_metrics(&self, registry: &mut Registry) {
        let metrics = &self.shared.metrics;
        registry.register(
            "broker_topics",
            "Number of topics with engine state",
            metrics.topics.clone(),
        );
        registry.register(
            "broker_segments_sealed_total",
            "Total number of segments sealed",
            metrics.segments_sealed_total.clone(),
        );
        registry.register(
            "broker_segments_uploaded_total",
            "Total number of segments uploaded to the blob store",
            metrics.segments_uploaded_total.clone(),
        );
        registry.register(
            "broker_segment_upload_failures_total",
            "Total number of failed segment uploads",
            metrics.segment_upload_failures_total.clone(),
        );
        registry.register(
            "broker_segment_bytes_uploaded_total",
            "Total number of segment bytes uploaded",
            metrics.segment_bytes_uploaded_total.clone(),
        );
    }

    /// Appends a payload to the topic's segment file and active buffer.
    ///
    /// The topic state is created on first use.
    pub async fn ingest(&self, topic: &str, payload: Bytes) -> Result<()> {
        validate_topic(topic)?;
        if self.cancel.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        let state = self.topic_state(topic);
        let mut inner = state.inner.lock().await;

        if inner.segment.is_none() {
            let now = self.shared.clock.now();
            let id = next_segment_id(self.shared.clock.unix_secs(), inner.last_segment_id);
            let segment =
                OpenSegment::create(&self.shared.config.data_dir, topic, id, now).await?;
            inner.last_segment_id = Some(segment.id());
            inner.segment = Some(segment);
        }
        if let Some(segment) = inner.segment.as_mut() {
            segment.append(&payload).await?;
        }

        if inner.buffers.push(payload) {
            tracing::debug!(topic, "active buffer reached threshold, rotated");
        }
        Ok(())
    }

    /// Returns a copy of the topic's active buffer, or `None` for an unknown topic.
    pub async fn current_buffer(&self, topic: &str) -> Option<Vec<Bytes>> {
        let state = self.get_topic(topic)?;
        let inner = state.inner.lock().await;
        Some(inner.buffers.active().to_vec())
    }

    /// Returns the names of all topics with engine state, sorted.
    pub fn topics(&self) -> Vec<String> {
        let topics = self.topics.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = topics.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns buffer and segment statistics of a topic.
    pub async fn stats(&self, topic: &str) -> Option<TopicStats> {
        let state = self.get_topic(topic)?;
        let inner = state.inner.lock().await;
        let now = self.shared.clock.now();
        Some(TopicStats {
            topic: state.name.clone(),
            active_buffer: inner.buffers.active_index(),
            active_messages: inner.buffers.active().len(),
            active_bytes: inner.buffers.active_bytes(),
            standby_bytes: inner.buffers.standby_bytes(),
            segment_id: inner.segment.as_ref().map(|s| s.id()),
            segment_bytes: inner.segment.as_ref().map(|s| s.size()).unwrap_or(0),
            segment_age_secs: inner
                .segment
                .as_ref()
                .map(|s| s.age(now).as_secs())
                .unwrap_or(0),
        })
    }

    /// Rotates the topic's buffers regardless of their size.
    pub async fn rotate(&self, topic: &str) {
        if let Some(state) = self.get_topic(topic) {
            state.inner.lock().await.buffers.rotate();
        }
    }

    /// Seals the topic's segment if it is due and schedules its upload.
    ///
    /// Returns the archive key of the sealed segment.
    pub async fn seal_if_due(&self, topic: &str) -> Result<Option<String>> {
        match self.get_topic(topic) {
            Some(state) => self.shared.seal(&state, false).await,
            None => Ok(None),
        }
    }

    /// Waits until every scheduled upload has finished.
    pub async fn wait_for_uploads(&self) {
        self.shared.uploads.close();
        self.shared.uploads.wait().await;
        self.shared.uploads.reopen();
    }

    /// Stops the topic tasks, seals every non-empty segment and waits for
    /// all uploads.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tasks.close();
        self.tasks.wait().await;

        let states: Vec<Arc<TopicState>> = {
            let topics = self.topics.read().unwrap_or_else(|e| e.into_inner());
            topics.values().cloned().collect()
        };
        for state in states {
            if let Err(e) = self.shared.seal(&state, true).await {
                tracing::error!(topic = %state.name, "failed to seal segment on shutdown: {}", e);
            }
        }

        self.shared.uploads.close();
        self.shared.uploads.wait().await;
        tracing::info!("segment engine shut down");
    }

    fn get_topic(&self, topic: &str) -> Option<Arc<TopicState>> {
        let topics = self.topics.read().unwrap_or_else(|e| e.into_inner());
        topics.get(topic).cloned()
    }

    fn topic_state(&self, topic: &str) -> Arc<TopicState> {
        if let Some(state) = self.get_topic(topic) {
            return state;
        }

        let mut topics = self.topics.write().unwrap_or_else(|e| e.into_inner());
        if let Some(state) = topics.get(topic) {
            return state.clone();
        }

        let state = Arc::new(TopicState {
            name: topic.to_string(),
            inner: Mutex::new(TopicInner {
                buffers: BufferPair::new(self.shared.config.buffer_threshold_bytes),
                segment: None,
                last_segment_id: None,
                upload_tail: None,
            }),
            cancel: self.cancel.child_token(),
        });
        topics.insert(topic.to_string(), state.clone());
        self.shared.metrics.topics.set(topics.len() as i64);

        self.tasks.spawn(run_rotation(
            state.clone(),
            self.shared.config.rotation_interval,
        ));
        self.tasks
            .spawn(run_flush_checks(state.clone(), self.shared.clone()));
        tracing::info!(topic, "created topic");
        state
    }
}

impl Drop for SegmentEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Shared {
    /// Seals the topic's segment when due (or whenever non-empty if `force`)
    /// and hands it to a detached upload task queued behind the topic's
    /// previous upload.
    async fn seal(&self, state: &TopicState, force: bool) -> Result<Option<String>> {
        let (sealed, previous, done) = {
            let mut inner = state.inner.lock().await;
            let now = self.clock.now();
            let due = match inner.segment.as_ref() {
                Some(segment) if force => segment.size() > 0,
                Some(segment) => segment.is_due(
                    now,
                    self.config.segment_max_bytes,
                    self.config.segment_max_age,
                ),
                None => false,
            };
            if !due {
                return Ok(None);
            }
            let sealed = match inner.segment.take() {
                Some(segment) => segment.close().await?,
                None => return Ok(None),
            };
            let (done, tail) = oneshot::channel();
            let previous = inner.upload_tail.replace(tail);
            (sealed, previous, done)
        };

        tracing::info!(
            topic = %sealed.topic,
            size = sealed.size,
            "sealed segment {}",
            sealed.key
        );
        self.metrics.segments_sealed_total.inc();
        let key = sealed.key.clone();
        let store = self.store.clone();
        let metrics = self.metrics.clone();
        self.uploads.spawn(async move {
            if let Some(previous) = previous {
                // an error only means the previous upload task is gone
                let _ = previous.await;
            }
            upload_segment(sealed, store, metrics).await;
            let _ = done.send(());
        });
        Ok(Some(key))
    }
}

async fn upload_segment(sealed: SealedSegment, store: Arc<dyn BlobStore>, metrics: EngineMetrics) {
    match sealed.upload(store.as_ref()).await {
        Ok(()) => {
            metrics.segments_uploaded_total.inc();
            metrics.segment_bytes_uploaded_total.inc_by(sealed.size);
            tracing::info!(topic = %sealed.topic, "uploaded segment {}", sealed.key);
        }
        Err(e) => {
            metrics.segment_upload_failures_total.inc();
            tracing::error!(
                topic = %sealed.topic,
                "failed to upload segment {}, keeping {:?}: {}",
                sealed.key,
                sealed.path,
                e
            );
        }
    }
}

async fn run_rotation(state: Arc<TopicState>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = state.cancel.cancelled() => break,
            _ = ticker.tick() => {
                state.inner.lock().await.buffers.rotate();
            }
        }
    }
}

async fn run_flush_checks(state: Arc<TopicState>, shared: Arc<Shared>) {
    let period = shared.config.flush_check_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = state.cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = shared.seal(&state, false).await {
                    tracing::error!(topic = %state.name, "failed to seal segment: {}", e);
                }
            }
        }
    }
}
