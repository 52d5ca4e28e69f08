//! HTTP request metrics shared by every service.
//!
//! Each server owns a `prometheus_client` [`Registry`]; [`HttpMetrics`]
//! registers the request counters into it and [`track_http_metrics`] is
//! applied as an axum middleware.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// Labels for HTTP request metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabelsWithStatus {
    pub method: HttpMethod,
    pub endpoint: String,
    pub status: u16,
}

/// Labels for the latency histogram.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: HttpMethod,
    pub endpoint: String,
}

/// HTTP method label value.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Other,
}

impl From<&Method> for HttpMethod {
    fn from(method: &Method) -> Self {
        match *method {
            Method::GET => HttpMethod::Get,
            Method::POST => HttpMethod::Post,
            Method::PUT => HttpMethod::Put,
            Method::DELETE => HttpMethod::Delete,
            _ => HttpMethod::Other,
        }
    }
}

/// Request counters common to all HTTP servers.
#[derive(Clone)]
pub struct HttpMetrics {
    pub http_requests_total: Family<HttpLabelsWithStatus, Counter>,
    pub http_request_duration_seconds: Family<HttpLabels, Histogram>,
    pub http_requests_in_flight: Gauge,
}

impl HttpMetrics {
    /// Creates the request metrics and registers them in `registry`.
    pub fn register(registry: &mut Registry) -> Self {
        let http_requests_total = Family::<HttpLabelsWithStatus, Counter>::default();
        registry.register(
            "http_requests_total",
            "Total number of HTTP requests",
            http_requests_total.clone(),
        );

        // 1ms to ~8s
        let http_request_duration_seconds =
            Family::<HttpLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 14))
            });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
            http_request_duration_seconds.clone(),
        );

        let http_requests_in_flight = Gauge::default();
        registry.register(
            "http_requests_in_flight",
            "Number of HTTP requests currently being processed",
            http_requests_in_flight.clone(),
        );

        Self {
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
        }
    }
}

/// Encodes `registry` in the Prometheus text format.
pub fn encode_registry(registry: &Registry) -> String {
    let mut buffer = String::new();
    if let Err(e) = prometheus_client::encoding::text::encode(&mut buffer, registry) {
        tracing::error!("failed to encode metrics: {}", e);
    }
    buffer
}

/// Axum middleware recording [`HttpMetrics`] for every request.
///
/// Install with `axum::middleware::from_fn_with_state(metrics, track_http_metrics)`.
/// Websocket upgrades are counted when the upgrade response is returned.
pub async fn track_http_metrics(
    State(metrics): State<Arc<HttpMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = HttpMethod::from(request.method());
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    metrics.http_requests_in_flight.inc();
    let start = Instant::now();
    let response = next.run(request).await;
    metrics.http_requests_in_flight.dec();

    metrics
        .http_request_duration_seconds
        .get_or_create(&HttpLabels {
            method: method.clone(),
            endpoint: endpoint.clone(),
        })
        .observe(start.elapsed().as_secs_f64());
    metrics
        .http_requests_total
        .get_or_create(&HttpLabelsWithStatus {
            method,
            endpoint,
            status: response.status().as_u16(),
        })
        .inc();

    response
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;

    #[test]
    fn should_register_http_metrics() {
        // given
        let mut registry = Registry::default();

        // when
        let _metrics = HttpMetrics::register(&mut registry);

        // then
        let encoded = encode_registry(&registry);
        assert!(encoded.contains("# HELP http_requests_total"));
        assert!(encoded.contains("# HELP http_request_duration_seconds"));
        assert!(encoded.contains("# HELP http_requests_in_flight"));
    }

    #[tokio::test]
    async fn should_count_requests_by_matched_route() {
        // given
        let mut registry = Registry::default();
        let metrics = Arc::new(HttpMetrics::register(&mut registry));
        let app = Router::new()
            .route("/-/healthy", get(|| async { "OK" }))
            .layer(axum::middleware::from_fn_with_state(
                metrics.clone(),
                track_http_metrics,
            ));

        // when
        let request = Request::builder()
            .uri("/-/healthy")
            .body(Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap();

        // then
        let count = metrics
            .http_requests_total
            .get_or_create(&HttpLabelsWithStatus {
                method: HttpMethod::Get,
                endpoint: "/-/healthy".to_string(),
                status: 200,
            })
            .get();
        assert_eq!(count, 1);
        assert_eq!(metrics.http_requests_in_flight.get(), 0);
    }
}
