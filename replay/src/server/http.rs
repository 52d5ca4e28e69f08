//! HTTP server implementation for the replay tier.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use common::metrics::track_http_metrics;
use common::shutdown::shutdown_signal;
use common::{BlobStore, Clock};

use super::config::ReplayServerConfig;
use super::handlers::{AppState, handle_healthy, handle_metrics, handle_ready, handle_subscribe};
use super::metrics::Metrics;
use crate::config::ReplayConfig;

/// Builds the replay router over `state`.
pub fn build_router(state: AppState) -> Router {
    let http_metrics = state.metrics.http.clone();
    Router::new()
        .route("/subscribe", get(handle_subscribe))
        .route("/metrics", get(handle_metrics))
        .route("/-/healthy", get(handle_healthy))
        .route("/-/ready", get(handle_ready))
        .layer(axum::middleware::from_fn_with_state(
            http_metrics,
            track_http_metrics,
        ))
        .with_state(state)
}

/// HTTP server for the replay tier.
pub struct ReplayServer {
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    session: ReplayConfig,
    config: ReplayServerConfig,
}

impl ReplayServer {
    pub fn new(
        store: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        session: ReplayConfig,
        config: ReplayServerConfig,
    ) -> Self {
        Self {
            store,
            clock,
            session,
            config,
        }
    }

    /// Serves until SIGINT/SIGTERM.
    pub async fn run(self) -> std::io::Result<()> {
        let state = AppState {
            store: self.store,
            clock: self.clock,
            session: self.session,
            metrics: Arc::new(Metrics::new()),
        };
        let app = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        tracing::info!("Starting replay HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}
