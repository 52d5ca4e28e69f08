//! Acknowledged replay of archived segments to one subscriber.
//!
//! A session polls the segment listing from the subscriber's checkpoint and
//! streams unseen segments one at a time, oldest first. Each segment is sent
//! as a batch and must be acknowledged within the ack timeout; a missing or
//! mismatched acknowledgement is a failed attempt and the same segment is
//! sent again. Only an acknowledged segment advances (and persists) the
//! checkpoint. When every attempt fails the session closes the connection and
//! ends, leaving the checkpoint where it was.
//!
//! The session shares a done-signal with the connection's inbound reader and
//! its keepalive pinger. Whichever notices the connection is gone cancels it
//! and every loop stops, including a wait for an acknowledgement.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{AckFrame, BatchFrame, BlobStore, Clock};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::ReplayConfig;
use crate::error::Result;
use crate::listing::pending_segments;

/// Close reason sent when a subscriber never acknowledged a segment.
pub const NO_ACK_REASON: &str = "No ACK received";

/// Outbound half of a replay connection.
///
/// Implementations serialize writes internally so the session and the
/// keepalive pinger never write at the same time.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn send_batch(&self, batch: &BatchFrame) -> std::io::Result<()>;

    async fn ping(&self) -> std::io::Result<()>;

    /// Sends a close notification with `reason` and closes the connection.
    async fn close(&self, reason: &str);
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The connection went away.
    Disconnected,
    /// The subscriber failed to acknowledge `batch_id` within the attempts.
    Terminated { batch_id: String },
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    /// Number of segments acknowledged during the session.
    pub delivered: usize,
    pub checkpoint: Checkpoint,
}

/// Counters shared by all sessions of a server.
#[derive(Clone, Default)]
pub struct ReplayMetrics {
    pub sessions_active: Gauge,
    pub batches_sent_total: Counter,
    pub acks_total: Counter,
    pub ack_timeouts_total: Counter,
    pub sessions_terminated_total: Counter,
    pub checkpoint_failures_total: Counter,
}

impl ReplayMetrics {
    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "replay_sessions_active",
            "Number of running replay sessions",
            self.sessions_active.clone(),
        );
        registry.register(
            "replay_batches_sent_total",
            "Total number of batches sent, retries included",
            self.batches_sent_total.clone(),
        );
        registry.register(
            "replay_acks_total",
            "Total number of acknowledged batches",
            self.acks_total.clone(),
        );
        registry.register(
            "replay_ack_timeouts_total",
            "Total number of sends without acknowledgement in time",
            self.ack_timeouts_total.clone(),
        );
        registry.register(
            "replay_sessions_terminated_total",
            "Total number of sessions ended for missing acknowledgements",
            self.sessions_terminated_total.clone(),
        );
        registry.register(
            "replay_checkpoint_failures_total",
            "Total number of checkpoints that failed to persist",
            self.checkpoint_failures_total.clone(),
        );
    }
}

enum Delivery {
    Acked,
    Exhausted,
    Disconnected,
}

enum Poll {
    Idle,
    Stop(SessionOutcome),
}

/// One subscriber's replay of one topic.
pub struct ReplaySession {
    topic: String,
    subscriber_id: String,
    config: ReplayConfig,
    store: Arc<dyn BlobStore>,
    checkpoints: CheckpointStore,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn BatchSink>,
    acks: mpsc::Receiver<AckFrame>,
    done: CancellationToken,
    metrics: ReplayMetrics,
}

impl ReplaySession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        topic: impl Into<String>,
        subscriber_id: impl Into<String>,
        config: ReplayConfig,
        store: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn BatchSink>,
        acks: mpsc::Receiver<AckFrame>,
        done: CancellationToken,
    ) -> Self {
        Self {
            topic: topic.into(),
            subscriber_id: subscriber_id.into(),
            checkpoints: CheckpointStore::new(store.clone(), clock.clone()),
            config,
            store,
            clock,
            sink,
            acks,
            done,
            metrics: ReplayMetrics::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: ReplayMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Runs the session until the connection goes away or the subscriber
    /// stops acknowledging.
    ///
    /// Fails only if the checkpoint cannot be loaded; nothing has been sent
    /// in that case.
    pub async fn run(mut self) -> Result<SessionReport> {
        let mut checkpoint = self.checkpoints.load(&self.topic, &self.subscriber_id).await?;
        tracing::info!(
            topic = %self.topic,
            subscriber_id = %self.subscriber_id,
            "replay session starting after '{}'",
            checkpoint.last_read_key
        );

        self.metrics.sessions_active.inc();
        let keepalive = tokio::spawn(run_keepalive(
            self.sink.clone(),
            self.done.clone(),
            self.config.ping_interval,
        ));

        let mut delivered = 0;
        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        let outcome = loop {
            tokio::select! {
                _ = self.done.cancelled() => break SessionOutcome::Disconnected,
                _ = ticker.tick() => {}
            }
            match self.poll_once(&mut checkpoint, &mut delivered).await {
                Poll::Idle => {}
                Poll::Stop(outcome) => break outcome,
            }
        };

        self.done.cancel();
        let _ = keepalive.await;
        self.metrics.sessions_active.dec();

        match &outcome {
            SessionOutcome::Disconnected => tracing::info!(
                topic = %self.topic,
                subscriber_id = %self.subscriber_id,
                delivered,
                "replay session disconnected"
            ),
            SessionOutcome::Terminated { batch_id } => tracing::warn!(
                topic = %self.topic,
                subscriber_id = %self.subscriber_id,
                delivered,
                "replay session terminated, no ack for {}",
                batch_id
            ),
        }

        Ok(SessionReport {
            outcome,
            delivered,
            checkpoint,
        })
    }

    /// Lists new segments and delivers them in order.
    ///
    /// A listing or download failure ends this cycle; the same segment is
    /// tried again on the next tick.
    async fn poll_once(&mut self, checkpoint: &mut Checkpoint, delivered: &mut usize) -> Poll {
        let keys = match pending_segments(
            self.store.as_ref(),
            self.config.layout,
            &self.topic,
            &checkpoint.last_read_key,
        )
        .await
        {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(topic = %self.topic, "failed to list segments: {}", e);
                return Poll::Idle;
            }
        };

        for key in keys {
            if self.done.is_cancelled() {
                return Poll::Stop(SessionOutcome::Disconnected);
            }

            let content = match self.store.get(&key).await {
                Ok(Some(content)) => content,
                Ok(None) => {
                    tracing::warn!(topic = %self.topic, "segment {} vanished, skipping", key);
                    continue;
                }
                Err(e) => {
                    tracing::warn!(topic = %self.topic, "failed to download {}: {}", key, e);
                    return Poll::Idle;
                }
            };

            let batch = BatchFrame::new(key.clone(), &content);
            match self.deliver(&batch).await {
                Delivery::Acked => {
                    self.metrics.acks_total.inc();
                    checkpoint.advance(key, self.clock.utc());
                    if let Err(e) = self.checkpoints.save(checkpoint).await {
                        self.metrics.checkpoint_failures_total.inc();
                        tracing::warn!(
                            topic = %self.topic,
                            subscriber_id = %self.subscriber_id,
                            "failed to persist checkpoint, continuing: {}",
                            e
                        );
                    }
                    *delivered += 1;
                }
                Delivery::Exhausted => {
                    self.metrics.sessions_terminated_total.inc();
                    self.sink.close(NO_ACK_REASON).await;
                    return Poll::Stop(SessionOutcome::Terminated { batch_id: key });
                }
                Delivery::Disconnected => return Poll::Stop(SessionOutcome::Disconnected),
            }
        }
        Poll::Idle
    }

    /// Sends `batch` until it is acknowledged or the attempts run out.
    async fn deliver(&mut self, batch: &BatchFrame) -> Delivery {
        for attempt in 1..=self.config.max_attempts {
            if let Err(e) = self.sink.send_batch(batch).await {
                tracing::debug!(
                    subscriber_id = %self.subscriber_id,
                    "send failed, connection gone: {}",
                    e
                );
                return Delivery::Disconnected;
            }
            self.metrics.batches_sent_total.inc();

            tokio::select! {
                _ = self.done.cancelled() => return Delivery::Disconnected,
                ack = tokio::time::timeout(self.config.ack_timeout, self.acks.recv()) => match ack {
                    Ok(Some(ack)) if ack.acknowledges(&batch.batch_id) => return Delivery::Acked,
                    Ok(Some(ack)) => tracing::debug!(
                        subscriber_id = %self.subscriber_id,
                        "attempt {}: unexpected ack {:?} for {}",
                        attempt,
                        ack,
                        batch.batch_id
                    ),
                    Ok(None) => return Delivery::Disconnected,
                    Err(_) => {
                        self.metrics.ack_timeouts_total.inc();
                        tracing::debug!(
                            subscriber_id = %self.subscriber_id,
                            "attempt {}: ack timeout for {}",
                            attempt,
                            batch.batch_id
                        );
                    }
                },
            }
        }
        Delivery::Exhausted
    }
}

async fn run_keepalive(sink: Arc<dyn BatchSink>, done: CancellationToken, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = done.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = sink.ping().await {
                    tracing::debug!("ping failed, ending session: {}", e);
                    done.cancel();
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use bytes::Bytes;
    use common::{BlobError, BlobResult, MockClock, ObjectBlobStore};

    use super::*;

    /// Records everything sent and optionally acknowledges each batch.
    struct RecordingSink {
        sent: Mutex<Vec<BatchFrame>>,
        closed: Mutex<Option<String>>,
        ack_tx: Option<mpsc::Sender<AckFrame>>,
        fail_pings: bool,
    }

    impl RecordingSink {
        fn new(ack_tx: Option<mpsc::Sender<AckFrame>>) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                closed: Mutex::new(None),
                ack_tx,
                fail_pings: false,
            })
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        fn sent_ids(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|b| b.batch_id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl BatchSink for RecordingSink {
        async fn send_batch(&self, batch: &BatchFrame) -> std::io::Result<()> {
            self.sent.lock().unwrap().push(batch.clone());
            if let Some(tx) = &self.ack_tx {
                let _ = tx.try_send(AckFrame::ok(batch.batch_id.clone()));
            }
            Ok(())
        }

        async fn ping(&self) -> std::io::Result<()> {
            if self.fail_pings {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "connection reset",
                ));
            }
            Ok(())
        }

        async fn close(&self, reason: &str) {
            *self.closed.lock().unwrap() = Some(reason.to_string());
        }
    }

    /// Store whose checkpoint writes always fail.
    struct ReadOnlyCheckpoints {
        inner: ObjectBlobStore,
    }

    #[async_trait]
    impl BlobStore for ReadOnlyCheckpoints {
        async fn list(&self, prefix: &str) -> BlobResult<Vec<String>> {
            self.inner.list(prefix).await
        }

        async fn get(&self, key: &str) -> BlobResult<Option<Bytes>> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: Bytes) -> BlobResult<()> {
            if key.starts_with("rayflux/checkpoints/") {
                return Err(BlobError::Storage("read only".to_string()));
            }
            self.inner.put(key, value).await
        }

        async fn delete(&self, key: &str) -> BlobResult<()> {
            self.inner.delete(key).await
        }
    }

    fn fast_config() -> ReplayConfig {
        ReplayConfig {
            poll_interval: Duration::from_millis(10),
            ack_timeout: Duration::from_millis(20),
            ping_interval: Duration::from_secs(3600),
            ..ReplayConfig::default()
        }
    }

    async fn seed(store: &dyn BlobStore, keys: &[&str]) {
        for key in keys {
            store
                .put(key, Bytes::from(format!("content of {}\n", key)))
                .await
                .unwrap();
        }
    }

    /// Ends the session once `sink` has seen `count` sends.
    fn stop_after_sends(sink: Arc<RecordingSink>, count: usize, done: CancellationToken) {
        tokio::spawn(async move {
            while sink.sent_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            // let the last ack be processed
            tokio::time::sleep(Duration::from_millis(50)).await;
            done.cancel();
        });
    }

    fn clock() -> Arc<MockClock> {
        Arc::new(MockClock::at_unix_secs(1_704_067_200))
    }

    #[tokio::test]
    async fn should_deliver_single_segment_and_advance_checkpoint() {
        // given
        let store = Arc::new(ObjectBlobStore::in_memory());
        seed(store.as_ref(), &["orders/2024-01-01/orders_1000.dat"]).await;
        let (ack_tx, ack_rx) = mpsc::channel(1);
        let sink = RecordingSink::new(Some(ack_tx));
        let done = CancellationToken::new();
        stop_after_sends(sink.clone(), 1, done.clone());

        // when
        let session = ReplaySession::new(
            "orders",
            "sub-1",
            fast_config(),
            store.clone(),
            clock(),
            sink.clone(),
            ack_rx,
            done,
        );
        let report = session.run().await.unwrap();

        // then
        assert_eq!(report.outcome, SessionOutcome::Disconnected);
        assert_eq!(report.delivered, 1);
        assert_eq!(
            report.checkpoint.last_read_key,
            "orders/2024-01-01/orders_1000.dat"
        );
        let sent = sink.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].messages,
            "content of orders/2024-01-01/orders_1000.dat\n"
        );
        let stored = CheckpointStore::new(store.clone(), clock())
            .load("orders", "sub-1")
            .await
            .unwrap();
        assert_eq!(stored.last_read_key, "orders/2024-01-01/orders_1000.dat");
    }

    #[tokio::test]
    async fn should_deliver_every_segment_once_in_order() {
        // given
        let store = Arc::new(ObjectBlobStore::in_memory());
        let keys = [
            "orders/2024-01-01/orders_1704067200.dat",
            "orders/2024-01-01/orders_1704067201.dat",
            "orders/2024-01-02/orders_1704153600.dat",
        ];
        seed(store.as_ref(), &[keys[2], keys[0], keys[1]]).await;
        let (ack_tx, ack_rx) = mpsc::channel(1);
        let sink = RecordingSink::new(Some(ack_tx));
        let done = CancellationToken::new();
        stop_after_sends(sink.clone(), 3, done.clone());

        // when
        let report = ReplaySession::new(
            "orders",
            "sub-1",
            fast_config(),
            store.clone(),
            clock(),
            sink.clone(),
            ack_rx,
            done,
        )
        .run()
        .await
        .unwrap();

        // then
        assert_eq!(sink.sent_ids(), keys.to_vec());
        assert_eq!(report.delivered, 3);
        assert_eq!(report.checkpoint.last_read_key, keys[2]);
    }

    #[tokio::test]
    async fn should_resume_strictly_after_checkpoint() {
        // given
        let store = Arc::new(ObjectBlobStore::in_memory());
        seed(
            store.as_ref(),
            &[
                "orders/2024-01-01/orders_1000.dat",
                "orders/2024-01-01/orders_2000.dat",
            ],
        )
        .await;
        let checkpoints = CheckpointStore::new(store.clone(), clock());
        let mut checkpoint = checkpoints.load("orders", "sub-1").await.unwrap();
        checkpoint.advance("orders/2024-01-01/orders_1000.dat", chrono::Utc::now());
        checkpoints.save(&mut checkpoint).await.unwrap();

        let (ack_tx, ack_rx) = mpsc::channel(1);
        let sink = RecordingSink::new(Some(ack_tx));
        let done = CancellationToken::new();
        stop_after_sends(sink.clone(), 1, done.clone());

        // when
        ReplaySession::new(
            "orders",
            "sub-1",
            fast_config(),
            store.clone(),
            clock(),
            sink.clone(),
            ack_rx,
            done,
        )
        .run()
        .await
        .unwrap();

        // then
        assert_eq!(sink.sent_ids(), vec!["orders/2024-01-01/orders_2000.dat"]);
    }

    #[tokio::test]
    async fn should_give_up_after_three_unacknowledged_sends() {
        // given
        let store = Arc::new(ObjectBlobStore::in_memory());
        seed(
            store.as_ref(),
            &[
                "orders/2024-01-01/orders_1000.dat",
                "orders/2024-01-01/orders_2000.dat",
            ],
        )
        .await;
        let (_ack_tx, ack_rx) = mpsc::channel(1);
        let sink = RecordingSink::new(None);

        // when
        let report = ReplaySession::new(
            "orders",
            "sub-1",
            fast_config(),
            store.clone(),
            clock(),
            sink.clone(),
            ack_rx,
            CancellationToken::new(),
        )
        .run()
        .await
        .unwrap();

        // then
        assert_eq!(
            report.outcome,
            SessionOutcome::Terminated {
                batch_id: "orders/2024-01-01/orders_1000.dat".to_string()
            }
        );
        assert_eq!(
            sink.sent_ids(),
            vec!["orders/2024-01-01/orders_1000.dat"; 3]
        );
        assert_eq!(sink.closed.lock().unwrap().as_deref(), Some(NO_ACK_REASON));
        assert_eq!(report.checkpoint.last_read_key, "");
        assert!(
            store
                .get("rayflux/checkpoints/orders/sub-1.json")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn should_treat_mismatched_ack_as_failed_attempt() {
        // given
        let store = Arc::new(ObjectBlobStore::in_memory());
        seed(store.as_ref(), &["orders/2024-01-01/orders_1000.dat"]).await;
        let (ack_tx, ack_rx) = mpsc::channel(1);
        let sink = RecordingSink::new(None);
        ack_tx.send(AckFrame::ok("some/other/key.dat")).await.unwrap();

        // when
        let report = ReplaySession::new(
            "orders",
            "sub-1",
            fast_config(),
            store.clone(),
            clock(),
            sink.clone(),
            ack_rx,
            CancellationToken::new(),
        )
        .run()
        .await
        .unwrap();

        // then
        assert!(matches!(report.outcome, SessionOutcome::Terminated { .. }));
        assert_eq!(sink.sent_count(), 3);
    }

    #[tokio::test]
    async fn should_continue_when_checkpoint_cannot_be_persisted() {
        // given
        let store = Arc::new(ReadOnlyCheckpoints {
            inner: ObjectBlobStore::in_memory(),
        });
        seed(
            store.as_ref(),
            &[
                "orders/2024-01-01/orders_1000.dat",
                "orders/2024-01-01/orders_2000.dat",
            ],
        )
        .await;
        let (ack_tx, ack_rx) = mpsc::channel(1);
        let sink = RecordingSink::new(Some(ack_tx));
        let done = CancellationToken::new();
        stop_after_sends(sink.clone(), 2, done.clone());

        // when
        let report = ReplaySession::new(
            "orders",
            "sub-1",
            fast_config(),
            store.clone(),
            clock(),
            sink.clone(),
            ack_rx,
            done,
        )
        .run()
        .await
        .unwrap();

        // then: in-memory cursor advanced past both segments, no redelivery
        assert_eq!(report.delivered, 2);
        assert_eq!(
            report.checkpoint.last_read_key,
            "orders/2024-01-01/orders_2000.dat"
        );
        assert_eq!(sink.sent_count(), 2);
    }

    #[tokio::test]
    async fn should_stop_when_ping_fails() {
        // given
        let store = Arc::new(ObjectBlobStore::in_memory());
        let (_ack_tx, ack_rx) = mpsc::channel(1);
        let sink = Arc::new(RecordingSink {
            sent: Mutex::new(Vec::new()),
            closed: Mutex::new(None),
            ack_tx: None,
            fail_pings: true,
        });
        let config = ReplayConfig {
            ping_interval: Duration::from_millis(10),
            ..fast_config()
        };

        // when
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            ReplaySession::new(
                "orders",
                "sub-1",
                config,
                store,
                clock(),
                sink,
                ack_rx,
                CancellationToken::new(),
            )
            .run(),
        )
        .await
        .expect("session did not stop")
        .unwrap();

        // then
        assert_eq!(report.outcome, SessionOutcome::Disconnected);
    }

    #[tokio::test]
    async fn should_stop_waiting_for_ack_when_done_fires() {
        // given: long ack timeout, nobody acknowledges
        let store = Arc::new(ObjectBlobStore::in_memory());
        seed(store.as_ref(), &["orders/2024-01-01/orders_1000.dat"]).await;
        let (_ack_tx, ack_rx) = mpsc::channel(1);
        let sink = RecordingSink::new(None);
        let done = CancellationToken::new();
        stop_after_sends(sink.clone(), 1, done.clone());
        let config = ReplayConfig {
            ack_timeout: Duration::from_secs(3600),
            ..fast_config()
        };

        // when
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            ReplaySession::new(
                "orders",
                "sub-1",
                config,
                store,
                clock(),
                sink.clone(),
                ack_rx,
                done,
            )
            .run(),
        )
        .await
        .expect("session did not stop")
        .unwrap();

        // then
        assert_eq!(report.outcome, SessionOutcome::Disconnected);
        assert_eq!(report.checkpoint.last_read_key, "");
        assert_eq!(sink.sent_count(), 1);
    }

    #[tokio::test]
    async fn should_retry_segment_after_download_failure() {
        // given: listing succeeds but the first download fails
        struct FlakyGet {
            inner: ObjectBlobStore,
            failed_once: AtomicBool,
        }

        #[async_trait]
        impl BlobStore for FlakyGet {
            async fn list(&self, prefix: &str) -> BlobResult<Vec<String>> {
                self.inner.list(prefix).await
            }

            async fn get(&self, key: &str) -> BlobResult<Option<Bytes>> {
                if key.ends_with(".dat") && !self.failed_once.swap(true, Ordering::SeqCst) {
                    return Err(BlobError::Storage("timeout".to_string()));
                }
                self.inner.get(key).await
            }

            async fn put(&self, key: &str, value: Bytes) -> BlobResult<()> {
                self.inner.put(key, value).await
            }

            async fn delete(&self, key: &str) -> BlobResult<()> {
                self.inner.delete(key).await
            }
        }

        let store = Arc::new(FlakyGet {
            inner: ObjectBlobStore::in_memory(),
            failed_once: AtomicBool::new(false),
        });
        seed(store.as_ref(), &["orders/2024-01-01/orders_1000.dat"]).await;
        let (ack_tx, ack_rx) = mpsc::channel(1);
        let sink = RecordingSink::new(Some(ack_tx));
        let done = CancellationToken::new();
        stop_after_sends(sink.clone(), 1, done.clone());

        // when
        let report = ReplaySession::new(
            "orders",
            "sub-1",
            fast_config(),
            store,
            clock(),
            sink.clone(),
            ack_rx,
            done,
        )
        .run()
        .await
        .unwrap();

        // then
        assert_eq!(report.delivered, 1);
        assert_eq!(sink.sent_ids(), vec!["orders/2024-01-01/orders_1000.dat"]);
    }
}
