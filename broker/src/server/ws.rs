//! Websocket push sink.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::SinkExt;
use futures::stream::SplitSink;

use crate::fanout::PushSink;

/// Sending half of a subscriber's websocket.
pub(super) struct WsPushSink {
    sender: SplitSink<WebSocket, Message>,
}

impl WsPushSink {
    pub(super) fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self { sender }
    }
}

fn to_io(err: axum::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, err.to_string())
}

#[async_trait]
impl PushSink for WsPushSink {
    async fn push(&mut self, payload: Bytes) -> std::io::Result<()> {
        self.sender
            .send(Message::Binary(payload))
            .await
            .map_err(to_io)
    }

    async fn ping(&mut self) -> std::io::Result<()> {
        self.sender
            .send(Message::Ping(Bytes::new()))
            .await
            .map_err(to_io)
    }

    async fn close(&mut self) {
        let _ = self.sender.close().await;
    }
}
