//! Websocket halves of a replay connection.

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use bytes::Bytes;
use common::{AckFrame, BatchFrame, ErrorFrame};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::session::BatchSink;

fn to_io(err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, err.to_string())
}

/// Sending half of a replay websocket.
///
/// Batches, pings and the final close share one writer behind a mutex.
pub(super) struct WsBatchSink {
    sender: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsBatchSink {
    pub(super) fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }

    /// Sends an error frame and closes the connection.
    pub(super) async fn reject(&self, error: &str) {
        let mut sender = self.sender.lock().await;
        let frame = ErrorFrame::new(error).to_json();
        let _ = sender.send(Message::Text(frame.into())).await;
        let _ = sender.close().await;
    }
}

#[async_trait]
impl BatchSink for WsBatchSink {
    async fn send_batch(&self, batch: &BatchFrame) -> std::io::Result<()> {
        let text = batch.to_json().map_err(to_io)?;
        self.sender
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(to_io)
    }

    async fn ping(&self) -> std::io::Result<()> {
        self.sender
            .lock()
            .await
            .send(Message::Ping(Bytes::new()))
            .await
            .map_err(to_io)
    }

    async fn close(&self, reason: &str) {
        let frame = CloseFrame {
            code: close_code::NORMAL,
            reason: reason.to_string().into(),
        };
        let mut sender = self.sender.lock().await;
        let _ = sender.send(Message::Close(Some(frame))).await;
        let _ = sender.close().await;
    }
}

/// Spawns the inbound half of a replay connection.
///
/// Acknowledgements are forwarded to the session; frames that are not valid
/// acknowledgements are ignored. A close frame, a read error or no inbound
/// traffic at all for `idle_timeout` cancels `done`.
pub(super) fn spawn_ack_reader(
    mut receiver: SplitStream<WebSocket>,
    acks: mpsc::Sender<AckFrame>,
    done: CancellationToken,
    idle_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                _ = done.cancelled() => break,
                frame = tokio::time::timeout(idle_timeout, receiver.next()) => frame,
            };
            let data = match frame {
                Ok(Some(Ok(Message::Text(text)))) => Bytes::copy_from_slice(text.as_str().as_bytes()),
                Ok(Some(Ok(Message::Binary(data)))) => data,
                Ok(Some(Ok(Message::Ping(_)))) | Ok(Some(Ok(Message::Pong(_)))) => continue,
                Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
                Ok(Some(Err(e))) => {
                    tracing::debug!("replay connection read failed: {}", e);
                    break;
                }
                Err(_) => {
                    tracing::debug!("replay connection idle for {:?}", idle_timeout);
                    break;
                }
            };
            match AckFrame::from_frame(&data) {
                Ok(ack) => {
                    if let Err(e) = acks.try_send(ack) {
                        tracing::debug!("dropping acknowledgement: {}", e);
                    }
                }
                Err(e) => tracing::debug!("ignoring malformed acknowledgement: {}", e),
            }
        }
        done.cancel();
    })
}

