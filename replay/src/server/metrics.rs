//! Prometheus metrics for the replay server.

use std::sync::Arc;

use common::metrics::{HttpMetrics, encode_registry};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

use crate::session::ReplayMetrics;

/// Container for all replay metrics.
pub struct Metrics {
    registry: Registry,

    /// Shared HTTP request metrics.
    pub http: Arc<HttpMetrics>,

    /// Counters shared by every session.
    pub sessions: ReplayMetrics,

    /// Counter of subscription handshakes rejected as malformed.
    pub rejected_subscriptions_total: Counter,

    /// Counter of sessions that could not load their checkpoint.
    pub checkpoint_load_failures_total: Counter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let http = Arc::new(HttpMetrics::register(&mut registry));

        let sessions = ReplayMetrics::default();
        sessions.register(&mut registry);

        let rejected_subscriptions_total = Counter::default();
        registry.register(
            "replay_rejected_subscriptions_total",
            "Total number of malformed subscription handshakes",
            rejected_subscriptions_total.clone(),
        );

        let checkpoint_load_failures_total = Counter::default();
        registry.register(
            "replay_checkpoint_load_failures_total",
            "Total number of sessions refused because their checkpoint failed to load",
            checkpoint_load_failures_total.clone(),
        );

        Self {
            registry,
            http,
            sessions,
            rejected_subscriptions_total,
            checkpoint_load_failures_total,
        }
    }

    /// Encode all metrics to Prometheus text format.
    pub fn encode(&self) -> String {
        encode_registry(&self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_register_session_metrics() {
        // given/when
        let metrics = Metrics::new();

        // then
        let encoded = metrics.encode();
        assert!(encoded.contains("# HELP replay_sessions_active"));
        assert!(encoded.contains("# HELP replay_acks"));
        assert!(encoded.contains("# HELP http_requests_total"));
    }
}
