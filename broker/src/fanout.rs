//! Live fanout of accepted publishes to connected push subscribers.
//!
//! Subscribers are grouped per topic. A dispatch pushes the payload to every
//! subscriber of the topic concurrently, one task per subscriber, each under
//! that subscriber's send lock. Any failed write removes the subscriber.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

/// Outbound half of a push subscriber's connection.
#[async_trait]
pub trait PushSink: Send {
    /// Sends one payload as a binary frame.
    async fn push(&mut self, payload: Bytes) -> std::io::Result<()>;

    /// Sends a keepalive probe.
    async fn ping(&mut self) -> std::io::Result<()>;

    /// Closes the connection. Errors are ignored.
    async fn close(&mut self);
}

/// A registered push subscriber.
pub struct Subscriber {
    id: u64,
    subscriber_id: String,
    topic: String,
    sink: Mutex<Box<dyn PushSink>>,
    closed: CancellationToken,
}

impl Subscriber {
    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Fires once the subscriber has been removed and its connection closed.
    pub fn closed(&self) -> &CancellationToken {
        &self.closed
    }
}

#[derive(Clone, Default)]
struct FanoutMetrics {
    live_subscribers: Gauge,
    deliveries_total: Counter,
    delivery_failures_total: Counter,
}

#[derive(Default)]
struct FanoutInner {
    subscribers: RwLock<HashMap<String, HashMap<u64, Arc<Subscriber>>>>,
    next_id: AtomicU64,
    metrics: FanoutMetrics,
}

/// Registry of live subscribers per topic.
///
/// Cheap to clone; clones share the registry.
#[derive(Clone, Default)]
pub struct Fanout {
    inner: Arc<FanoutInner>,
}

/// Push tasks spawned by [`Fanout::dispatch`].
pub struct FanoutDispatch {
    handles: Vec<JoinHandle<bool>>,
}

impl FanoutDispatch {
    /// Number of subscribers the payload was dispatched to.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every push and returns how many succeeded.
    pub async fn wait(self) -> usize {
        let mut delivered = 0;
        for handle in self.handles {
            if let Ok(true) = handle.await {
                delivered += 1;
            }
        }
        delivered
    }
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the fanout gauges and counters with a Prometheus registry.
    pub fn register_metrics(&self, registry: &mut Registry) {
        let metrics = &self.inner.metrics;
        registry.register(
            "broker_live_subscribers",
            "Number of connected push subscribers",
            metrics.live_subscribers.clone(),
        );
        registry.register(
            "broker_fanout_deliveries_total",
            "Total number of payloads pushed to subscribers",
            metrics.deliveries_total.clone(),
        );
        registry.register(
            "broker_fanout_failures_total",
            "Total number of failed pushes to subscribers",
            metrics.delivery_failures_total.clone(),
        );
    }

    /// Adds a subscriber to `topic`.
    pub fn register(
        &self,
        subscriber_id: impl Into<String>,
        topic: impl Into<String>,
        sink: Box<dyn PushSink>,
    ) -> Arc<Subscriber> {
        let subscriber = Arc::new(Subscriber {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            subscriber_id: subscriber_id.into(),
            topic: topic.into(),
            sink: Mutex::new(sink),
            closed: CancellationToken::new(),
        });

        let mut subscribers = self.write_subscribers();
        subscribers
            .entry(subscriber.topic.clone())
            .or_default()
            .insert(subscriber.id, subscriber.clone());
        self.inner.metrics.live_subscribers.inc();
        tracing::info!(
            topic = %subscriber.topic,
            subscriber_id = %subscriber.subscriber_id,
            "subscriber connected"
        );
        subscriber
    }

    /// Removes a subscriber and closes its connection.
    ///
    /// Idempotent: only the first call closes the connection. Returns true
    /// if this call removed the subscriber. Removing the last subscriber of a
    /// topic drops the topic's entry.
    pub async fn remove(&self, subscriber: &Subscriber) -> bool {
        let removed = {
            let mut subscribers = self.write_subscribers();
            let removed = match subscribers.get_mut(&subscriber.topic) {
                Some(set) => {
                    let removed = set.remove(&subscriber.id).is_some();
                    if set.is_empty() {
                        subscribers.remove(&subscriber.topic);
                    }
                    removed
                }
                None => false,
            };
            removed
        };
        if !removed {
            return false;
        }

        self.inner.metrics.live_subscribers.dec();
        subscriber.sink.lock().await.close().await;
        subscriber.closed.cancel();
        tracing::info!(
            topic = %subscriber.topic,
            subscriber_id = %subscriber.subscriber_id,
            "subscriber removed"
        );
        true
    }

    /// Number of live subscribers of `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.read_subscribers()
            .get(topic)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    /// Returns true if the registry holds an entry for `topic`.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.read_subscribers().contains_key(topic)
    }

    /// Pushes `payload` to every subscriber of `topic` concurrently.
    ///
    /// The registry lock is only held while taking the snapshot of
    /// subscribers; the pushes run in detached tasks.
    pub fn dispatch(&self, topic: &str, payload: Bytes) -> FanoutDispatch {
        let targets: Vec<Arc<Subscriber>> = self
            .read_subscribers()
            .get(topic)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default();

        let handles = targets
            .into_iter()
            .map(|subscriber| {
                let fanout = self.clone();
                let payload = payload.clone();
                tokio::spawn(async move {
                    let result = subscriber.sink.lock().await.push(payload).await;
                    match result {
                        Ok(()) => {
                            fanout.inner.metrics.deliveries_total.inc();
                            true
                        }
                        Err(e) => {
                            fanout.inner.metrics.delivery_failures_total.inc();
                            tracing::warn!(
                                topic = %subscriber.topic,
                                subscriber_id = %subscriber.subscriber_id,
                                "push failed, removing subscriber: {}",
                                e
                            );
                            fanout.remove(&subscriber).await;
                            false
                        }
                    }
                })
            })
            .collect();

        FanoutDispatch { handles }
    }

    /// Spawns a task pinging `subscriber` every `period` through its send
    /// lock. A failed ping removes the subscriber. The task ends once the
    /// subscriber is closed.
    pub fn spawn_keepalive(&self, subscriber: Arc<Subscriber>, period: Duration) -> JoinHandle<()> {
        let fanout = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = subscriber.closed.cancelled() => break,
                    _ = ticker.tick() => {
                        let result = subscriber.sink.lock().await.ping().await;
                        if let Err(e) = result {
                            tracing::debug!(
                                subscriber_id = %subscriber.subscriber_id,
                                "keepalive failed: {}",
                                e
                            );
                            fanout.remove(&subscriber).await;
                            break;
                        }
                    }
                }
            }
        })
    }

    fn read_subscribers(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, HashMap<u64, Arc<Subscriber>>>> {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn write_subscribers(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, HashMap<u64, Arc<Subscriber>>>> {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
    }
}
