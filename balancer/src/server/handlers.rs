//! HTTP route handlers for the balancer server.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use common::{ErrorFrame, ProtocolError, PublishRequest, SubscribeRequest};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use super::error::ApiError;
use super::metrics::{Metrics, RouteLabels};
use super::relay::{connect, relay};
use crate::hash::{pick, publish_key, session_key};
use crate::membership::MembershipTracker;

const INVALID_SUBSCRIPTION: &str = "Invalid subscription request";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub brokers: Arc<MembershipTracker>,
    pub replays: Arc<MembershipTracker>,
    pub client: reqwest::Client,
    pub metrics: Arc<Metrics>,
}

/// Which tier a websocket connection is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Live,
    Replay,
}

impl Route {
    fn label(self) -> &'static str {
        match self {
            Route::Live => "subscribe",
            Route::Replay => "replay",
        }
    }

    fn tier(self) -> &'static str {
        match self {
            Route::Live => "broker",
            Route::Replay => "replay",
        }
    }

    fn key(self, request: &SubscribeRequest) -> String {
        match self {
            Route::Live => publish_key(&request.topic).to_string(),
            Route::Replay => session_key(&request.subscriber_id, &request.topic),
        }
    }

    fn targets(self, state: &AppState) -> Vec<String> {
        match self {
            Route::Live => state.brokers.snapshot(),
            Route::Replay => state.replays.snapshot(),
        }
    }
}

/// Handle POST /publish
///
/// Forwards the body to the broker owning the topic and relays its status
/// and body.
pub async fn handle_publish(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = PublishRequest::from_body(&body)?;
    let labels = RouteLabels::new("publish");

    let brokers = state.brokers.snapshot();
    let Some(target) = pick(publish_key(&request.topic), &brokers) else {
        state.metrics.routing_failures_total.get_or_create(&labels).inc();
        return Err(ApiError::Unavailable("no broker instances available".to_string()));
    };
    tracing::debug!(topic = %request.topic, "routing publish to {}", target);

    let upstream_failure = |e: reqwest::Error| {
        state.metrics.upstream_failures_total.get_or_create(&labels).inc();
        tracing::warn!(topic = %request.topic, "broker {} unreachable: {}", target, e);
        ApiError::BadGateway(format!("failed to reach broker {}", target))
    };
    let response = state
        .client
        .post(format!("http://{}/publish", target))
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(upstream_failure)?;
    state.metrics.routed_total.get_or_create(&labels).inc();

    let status = response.status();
    let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
    let bytes = response.bytes().await.map_err(upstream_failure)?;

    let mut relayed = Response::builder().status(status);
    if let Some(content_type) = content_type {
        relayed = relayed.header(header::CONTENT_TYPE, content_type);
    }
    relayed
        .body(Body::from(bytes))
        .map_err(|e| ApiError::BadGateway(e.to_string()))
}

/// Handle GET /subscribe
///
/// Proxies a live subscription to the broker owning the topic.
pub async fn handle_subscribe(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| proxy_subscription(socket, state, Route::Live))
}

/// Handle GET /replay
///
/// Proxies a replay subscription to the replay instance owning the
/// subscriber and topic pair.
pub async fn handle_replay(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| proxy_subscription(socket, state, Route::Replay))
}

async fn proxy_subscription(socket: WebSocket, state: AppState, route: Route) {
    let (mut sender, mut receiver) = socket.split();
    let labels = RouteLabels::new(route.label());

    let (handshake, request) = match read_subscription(&mut receiver).await {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!("rejected subscription: {}", e);
            reject(&mut sender, INVALID_SUBSCRIPTION).await;
            return;
        }
    };

    let targets = route.targets(&state);
    let Some(target) = pick(&route.key(&request), &targets) else {
        state.metrics.routing_failures_total.get_or_create(&labels).inc();
        reject(&mut sender, &format!("No {} instances available", route.tier())).await;
        return;
    };
    tracing::debug!(
        subscriber_id = %request.subscriber_id,
        topic = %request.topic,
        "routing {} to {}",
        route.label(),
        target
    );

    let mut upstream = match connect(target).await {
        Ok(upstream) => upstream,
        Err(e) => {
            state.metrics.upstream_failures_total.get_or_create(&labels).inc();
            tracing::warn!("{} instance {} unreachable: {}", route.tier(), target, e);
            reject(&mut sender, &format!("Failed to connect to {} instance", route.tier())).await;
            return;
        }
    };
    if let Err(e) = upstream
        .send(tokio_tungstenite::tungstenite::Message::Text(handshake.into()))
        .await
    {
        state.metrics.upstream_failures_total.get_or_create(&labels).inc();
        tracing::warn!("failed to forward subscription to {}: {}", target, e);
        reject(&mut sender, &format!("Failed to connect to {} instance", route.tier())).await;
        return;
    }
    state.metrics.routed_total.get_or_create(&labels).inc();

    relay(sender, receiver, upstream).await;
}

/// Reads the handshake frame, returning it verbatim with its parsed form.
async fn read_subscription(
    receiver: &mut SplitStream<WebSocket>,
) -> Result<(String, SubscribeRequest), ProtocolError> {
    loop {
        let text = match receiver.next().await {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(data))) => String::from_utf8_lossy(&data).into_owned(),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            _ => return Err(ProtocolError::InvalidJson("connection closed".to_string())),
        };
        let request = SubscribeRequest::from_frame(text.as_bytes())?;
        return Ok((text, request));
    }
}

async fn reject(sender: &mut SplitSink<WebSocket, Message>, error: &str) {
    let frame = ErrorFrame::new(error).to_json();
    let _ = sender.send(Message::Text(frame.into())).await;
    let _ = sender.close().await;
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
///
/// Ready once at least one broker is routable.
pub async fn handle_ready(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.brokers.snapshot().is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "no broker instances")
    } else {
        (StatusCode::OK, "OK")
    }
}
