//! Prometheus metrics for the broker server.

use std::sync::Arc;

use common::metrics::{HttpMetrics, encode_registry};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

/// Container for all broker metrics.
pub struct Metrics {
    registry: Registry,

    /// Shared HTTP request metrics.
    pub http: Arc<HttpMetrics>,

    /// Counter of accepted publishes.
    pub published_messages_total: Counter,

    /// Counter of accepted payload bytes.
    pub published_bytes_total: Counter,

    /// Counter of subscription handshakes rejected as malformed.
    pub rejected_subscriptions_total: Counter,

    /// Counter of payloads the JSONL emitter failed to archive.
    pub emitter_failures_total: Counter,
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

        let published_messages_total = Counter::default();
        registry.register(
            "broker_published_messages_total",
            "Total number of messages accepted for publishing",
            published_messages_total.clone(),
        );

        let published_bytes_total = Counter::default();
        registry.register(
            "broker_published_bytes_total",
            "Total number of payload bytes accepted for publishing",
            published_bytes_total.clone(),
        );

        let rejected_subscriptions_total = Counter::default();
        registry.register(
            "broker_rejected_subscriptions_total",
            "Total number of malformed subscription handshakes",
            rejected_subscriptions_total.clone(),
        );

        let emitter_failures_total = Counter::default();
        registry.register(
            "broker_emitter_failures_total",
            "Total number of failed JSONL emitter writes",
            emitter_failures_total.clone(),
        );

        Self {
            registry,
            http,
            published_messages_total,
            published_bytes_total,
            rejected_subscriptions_total,
            emitter_failures_total,
        }
    }

    /// Use this to register engine and fanout metrics before wrapping
    /// `Metrics` in an `Arc`.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
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
    fn should_create_default_metrics() {
        // given/when
        let metrics = Metrics::new();

        // then
        let encoded = metrics.encode();
        assert!(encoded.contains("# HELP broker_published_messages_total"));
        assert!(encoded.contains("# HELP broker_published_bytes_total"));
        assert!(encoded.contains("# HELP http_requests_total"));
    }
}
