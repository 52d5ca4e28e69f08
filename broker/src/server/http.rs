//! HTTP server implementation for the broker.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::metrics::track_http_metrics;
use common::shutdown::shutdown_signal;
use tokio_util::sync::CancellationToken;

use super::config::BrokerServerConfig;
use super::handlers::{
    AppState, handle_buffer, handle_healthy, handle_metrics, handle_publish, handle_ready,
    handle_subscribe, handle_topics,
};
use super::metrics::Metrics;
use crate::emitter::JsonlEmitter;
use crate::engine::SegmentEngine;
use crate::error::{Error, Result};
use crate::fanout::Fanout;

/// Builds the broker router over `state`.
pub fn build_router(state: AppState) -> Router {
    let http_metrics = state.metrics.http.clone();
    Router::new()
        .route("/publish", post(handle_publish))
        .route("/subscribe", get(handle_subscribe))
        .route("/topics", get(handle_topics))
        .route("/topics/{topic}/buffer", get(handle_buffer))
        .route("/metrics", get(handle_metrics))
        .route("/-/healthy", get(handle_healthy))
        .route("/-/ready", get(handle_ready))
        .layer(axum::middleware::from_fn_with_state(
            http_metrics,
            track_http_metrics,
        ))
        .with_state(state)
}

/// HTTP server for the broker.
pub struct BrokerServer {
    engine: Arc<SegmentEngine>,
    fanout: Fanout,
    emitter: Option<Arc<JsonlEmitter>>,
    config: BrokerServerConfig,
}

impl BrokerServer {
    pub fn new(
        engine: Arc<SegmentEngine>,
        fanout: Fanout,
        emitter: Option<Arc<JsonlEmitter>>,
        config: BrokerServerConfig,
    ) -> Self {
        Self {
            engine,
            fanout,
            emitter,
            config,
        }
    }

    /// Serves until SIGINT/SIGTERM, then seals and uploads open segments
    /// and flushes the JSONL emitter.
    pub async fn run(self) -> Result<()> {
        let mut metrics = Metrics::new();
        self.engine.register_metrics(metrics.registry_mut());
        self.fanout.register_metrics(metrics.registry_mut());
        let metrics = Arc::new(metrics);

        let emitter_cancel = CancellationToken::new();
        let emitter_task = self
            .emitter
            .as_ref()
            .map(|emitter| emitter.start(emitter_cancel.clone()));

        let state = AppState {
            engine: self.engine.clone(),
            fanout: self.fanout.clone(),
            emitter: self.emitter.clone(),
            metrics,
            keepalive_interval: self.config.keepalive_interval,
        };
        let app = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        tracing::info!("Starting broker HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(Error::from);

        self.engine.shutdown().await;
        emitter_cancel.cancel();
        if let Some(task) = emitter_task {
            if let Err(e) = task.await {
                tracing::error!("emitter task failed: {}", e);
            }
        }

        tracing::info!("Server shut down gracefully");
        served
    }
}
