//! HTTP route handlers for the replay server.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::{BlobStore, Clock, ProtocolError, SubscribeRequest};
use futures::StreamExt;
use futures::stream::SplitStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::metrics::Metrics;
use super::ws::{WsBatchSink, spawn_ack_reader};
use crate::config::ReplayConfig;
use crate::session::{BatchSink, ReplaySession, SessionOutcome};

const INVALID_SUBSCRIPTION: &str = "Invalid subscription request";
const CHECKPOINT_UNAVAILABLE: &str = "Failed to load checkpoint";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BlobStore>,
    pub clock: Arc<dyn Clock>,
    pub session: ReplayConfig,
    pub metrics: Arc<Metrics>,
}

/// Handle GET /subscribe
///
/// Upgrades to a websocket. The first client frame must be a subscription
/// request; the connection then carries a replay session until the client
/// leaves or stops acknowledging.
pub async fn handle_subscribe(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_replay(socket, state))
}

async fn serve_replay(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let sink = Arc::new(WsBatchSink::new(sender));

    let request = match read_subscription(&mut receiver).await {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!("rejected subscription: {}", e);
            state.metrics.rejected_subscriptions_total.inc();
            sink.reject(INVALID_SUBSCRIPTION).await;
            return;
        }
    };

    let done = CancellationToken::new();
    let (ack_tx, ack_rx) = mpsc::channel(1);
    let reader = spawn_ack_reader(receiver, ack_tx, done.clone(), state.session.idle_timeout);

    let session = ReplaySession::new(
        request.topic.clone(),
        request.subscriber_id.clone(),
        state.session.clone(),
        state.store.clone(),
        state.clock.clone(),
        sink.clone(),
        ack_rx,
        done.clone(),
    )
    .with_metrics(state.metrics.sessions.clone());

    match session.run().await {
        Ok(report) => {
            tracing::debug!(
                topic = %request.topic,
                subscriber_id = %request.subscriber_id,
                delivered = report.delivered,
                "replay session ended: {:?}",
                report.outcome
            );
            if report.outcome == SessionOutcome::Disconnected {
                sink.close("").await;
            }
        }
        Err(e) => {
            tracing::error!(
                topic = %request.topic,
                subscriber_id = %request.subscriber_id,
                "failed to load checkpoint: {}",
                e
            );
            state.metrics.checkpoint_load_failures_total.inc();
            sink.reject(CHECKPOINT_UNAVAILABLE).await;
        }
    }

    done.cancel();
    let _ = reader.await;
}

async fn read_subscription(
    receiver: &mut SplitStream<WebSocket>,
) -> Result<SubscribeRequest, ProtocolError> {
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                return SubscribeRequest::from_frame(text.as_str().as_bytes());
            }
            Some(Ok(Message::Binary(data))) => return SubscribeRequest::from_frame(&data),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            _ => return Err(ProtocolError::InvalidJson("connection closed".to_string())),
        }
    }
}

/// Handle GET /metrics
pub async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.encode(),
    )
}

/// Handle GET /-/healthy
pub async fn handle_healthy() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Handle GET /-/ready
pub async fn handle_ready() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
