//! HTTP route handlers for the broker server.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::{ErrorFrame, ProtocolError, PublishRequest, PublishResponse, SubscribeRequest};
use futures::StreamExt;
use futures::stream::SplitStream;
use serde::Serialize;

use super::error::ApiError;
use super::metrics::Metrics;
use super::ws::WsPushSink;
use crate::emitter::JsonlEmitter;
use crate::engine::{SegmentEngine, TopicStats};
use crate::fanout::Fanout;

const INVALID_SUBSCRIPTION: &str = "Invalid subscription request";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SegmentEngine>,
    pub fanout: Fanout,
    pub emitter: Option<Arc<JsonlEmitter>>,
    pub metrics: Arc<Metrics>,
    pub keepalive_interval: Duration,
}

/// Handle POST /publish
///
/// The payload is written to the topic's segment and buffer first; only an
/// accepted payload is fanned out and handed to the JSONL emitter.
pub async fn handle_publish(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PublishResponse>, ApiError> {
    let request = PublishRequest::from_body(&body)?;
    let payload = request.payload();

    state.engine.ingest(&request.topic, payload.clone()).await?;
    state.metrics.published_messages_total.inc();
    state
        .metrics
        .published_bytes_total
        .inc_by(payload.len() as u64);

    state.fanout.dispatch(&request.topic, payload);

    if let Some(emitter) = &state.emitter {
        if let Err(e) = emitter.add(&request.topic, &request.message).await {
            state.metrics.emitter_failures_total.inc();
            tracing::error!(topic = %request.topic, "JSONL emitter failed: {}", e);
        }
    }

    Ok(Json(PublishResponse::ok()))
}

/// Handle GET /subscribe
///
/// Upgrades to a websocket. The first client frame must be a subscription
/// request; afterwards every payload published to the topic is pushed as a
/// binary frame until either side disconnects.
pub async fn handle_subscribe(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_subscriber(socket, state))
}

async fn serve_subscriber(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let request = match read_subscription(&mut receiver).await {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!("rejected subscription: {}", e);
            state.metrics.rejected_subscriptions_total.inc();
            let frame = ErrorFrame::new(INVALID_SUBSCRIPTION).to_json();
            let _ = futures::SinkExt::send(&mut sender, Message::Text(frame.into())).await;
            let _ = futures::SinkExt::close(&mut sender).await;
            return;
        }
    };

    let subscriber = state.fanout.register(
        request.subscriber_id,
        request.topic,
        Box::new(WsPushSink::new(sender)),
    );
    let keepalive = state
        .fanout
        .spawn_keepalive(subscriber.clone(), state.keepalive_interval);

    // any inbound error or close frame is a disconnect
    loop {
        tokio::select! {
            _ = subscriber.closed().cancelled() => break,
            frame = receiver.next() => match frame {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.fanout.remove(&subscriber).await;
    keepalive.abort();
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

/// Response of GET /topics/{topic}/buffer.
#[derive(Debug, Serialize)]
pub struct BufferResponse {
    pub topic: String,
    pub messages: Vec<String>,
    pub subscribers: usize,
    pub stats: TopicStats,
}

/// Handle GET /topics/{topic}/buffer
pub async fn handle_buffer(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Result<Json<BufferResponse>, ApiError> {
    let not_found = || ApiError::NotFound(format!("unknown topic '{}'", topic));
    let buffer = state.engine.current_buffer(&topic).await.ok_or_else(not_found)?;
    let stats = state.engine.stats(&topic).await.ok_or_else(not_found)?;

    Ok(Json(BufferResponse {
        messages: buffer
            .iter()
            .map(|payload| String::from_utf8_lossy(payload).into_owned())
            .collect(),
        subscribers: state.fanout.subscriber_count(&topic),
        topic,
        stats,
    }))
}

/// Handle GET /topics
pub async fn handle_topics(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.engine.topics())
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
