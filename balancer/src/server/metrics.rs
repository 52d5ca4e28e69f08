//! Prometheus metrics for the balancer server.

use std::sync::Arc;

use common::metrics::{HttpMetrics, encode_registry};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Labels identifying the tier a request was routed to.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RouteLabels {
    pub route: String,
}

impl RouteLabels {
    pub fn new(route: &str) -> Self {
        Self {
            route: route.to_string(),
        }
    }
}

/// Container for all balancer metrics.
pub struct Metrics {
    registry: Registry,

    /// Shared HTTP request metrics.
    pub http: Arc<HttpMetrics>,

    /// Requests and connections handed to an upstream instance.
    pub routed_total: Family<RouteLabels, Counter>,

    /// Requests refused because no instance was live.
    pub routing_failures_total: Family<RouteLabels, Counter>,

    /// Upstream instances that could not be reached.
    pub upstream_failures_total: Family<RouteLabels, Counter>,
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

        let routed_total = Family::<RouteLabels, Counter>::default();
        registry.register(
            "balancer_routed",
            "Total number of requests routed to an upstream instance",
            routed_total.clone(),
        );

        let routing_failures_total = Family::<RouteLabels, Counter>::default();
        registry.register(
            "balancer_routing_failures",
            "Total number of requests with no live instance to route to",
            routing_failures_total.clone(),
        );

        let upstream_failures_total = Family::<RouteLabels, Counter>::default();
        registry.register(
            "balancer_upstream_failures",
            "Total number of upstream instances that could not be reached",
            upstream_failures_total.clone(),
        );

        Self {
            registry,
            http,
            routed_total,
            routing_failures_total,
            upstream_failures_total,
        }
    }

    /// Registers the live instance gauge of one role.
    pub fn register_membership(&mut self, role: &str, live_instances: Gauge) {
        self.registry
            .sub_registry_with_label(("role".into(), role.to_string().into()))
            .register(
                "balancer_live_instances",
                "Number of routable instances",
                live_instances,
            );
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
    fn should_encode_routing_metrics() {
        // given
        let mut metrics = Metrics::new();
        let gauge = Gauge::default();
        gauge.set(3);
        metrics.register_membership("broker", gauge);

        // when
        metrics
            .routed_total
            .get_or_create(&RouteLabels::new("publish"))
            .inc();
        let encoded = metrics.encode();

        // then
        assert!(encoded.contains("balancer_routed_total{route=\"publish\"} 1"));
        assert!(encoded.contains("balancer_live_instances{role=\"broker\"} 3"));
        assert!(encoded.contains("# HELP http_requests_total"));
    }
}
