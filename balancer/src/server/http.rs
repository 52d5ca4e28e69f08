//! HTTP server implementation for the balancer.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::metrics::track_http_metrics;
use common::shutdown::shutdown_signal;
use tokio_util::sync::CancellationToken;

use super::config::BalancerServerConfig;
use super::handlers::{
    AppState, handle_healthy, handle_metrics, handle_publish, handle_ready, handle_replay,
    handle_subscribe,
};
use super::metrics::Metrics;
use crate::error::{Error, Result};
use crate::membership::MembershipTracker;

/// Builds the balancer router over `state`.
pub fn build_router(state: AppState) -> Router {
    let http_metrics = state.metrics.http.clone();
    Router::new()
        .route("/publish", post(handle_publish))
        .route("/subscribe", get(handle_subscribe))
        .route("/replay", get(handle_replay))
        .route("/metrics", get(handle_metrics))
        .route("/-/healthy", get(handle_healthy))
        .route("/-/ready", get(handle_ready))
        .layer(axum::middleware::from_fn_with_state(
            http_metrics,
            track_http_metrics,
        ))
        .with_state(state)
}

/// HTTP server for the balancer.
pub struct BalancerServer {
    brokers: Arc<MembershipTracker>,
    replays: Arc<MembershipTracker>,
    config: BalancerServerConfig,
}

impl BalancerServer {
    pub fn new(
        brokers: Arc<MembershipTracker>,
        replays: Arc<MembershipTracker>,
        config: BalancerServerConfig,
    ) -> Self {
        Self {
            brokers,
            replays,
            config,
        }
    }

    /// Starts the membership refresh tasks and serves until SIGINT/SIGTERM.
    pub async fn run(self) -> Result<()> {
        let mut metrics = Metrics::new();
        metrics.register_membership(self.brokers.role(), self.brokers.live_instances());
        metrics.register_membership(self.replays.role(), self.replays.live_instances());

        let client = reqwest::Client::builder()
            .timeout(self.config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        let cancel = CancellationToken::new();
        let refreshers = [
            self.brokers.start(cancel.clone()),
            self.replays.start(cancel.clone()),
        ];

        let state = AppState {
            brokers: self.brokers.clone(),
            replays: self.replays.clone(),
            client,
            metrics: Arc::new(metrics),
        };
        let app = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        tracing::info!("Starting balancer HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind {}: {}", addr, e)))?;
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        cancel.cancel();
        for refresher in refreshers {
            let _ = refresher.await;
        }

        tracing::info!("Server shut down gracefully");
        served.map_err(|e| Error::Config(format!("server error: {}", e)))
    }
}
