//! Websocket relay between a client and an upstream instance.

use axum::extract::ws::{self, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub(super) type Upstream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn to_upstream(message: ws::Message) -> Message {
    match message {
        ws::Message::Text(text) => Message::Text(text.as_str().to_owned().into()),
        ws::Message::Binary(data) => Message::Binary(data),
        ws::Message::Ping(data) => Message::Ping(data),
        ws::Message::Pong(data) => Message::Pong(data),
        ws::Message::Close(frame) => Message::Close(frame.map(|frame| CloseFrame {
            code: frame.code.into(),
            reason: frame.reason.as_str().to_owned().into(),
        })),
    }
}

fn to_client(message: Message) -> Option<ws::Message> {
    Some(match message {
        Message::Text(text) => ws::Message::Text(text.as_str().to_owned().into()),
        Message::Binary(data) => ws::Message::Binary(data),
        Message::Ping(data) => ws::Message::Ping(data),
        Message::Pong(data) => ws::Message::Pong(data),
        Message::Close(frame) => ws::Message::Close(frame.map(|frame| ws::CloseFrame {
            code: frame.code.into(),
            reason: frame.reason.as_str().to_owned().into(),
        })),
        Message::Frame(_) => return None,
    })
}

/// Copies frames in both directions until either side closes or fails,
/// then closes both.
pub(super) async fn relay(
    mut client_tx: SplitSink<WebSocket, ws::Message>,
    mut client_rx: SplitStream<WebSocket>,
    upstream: Upstream,
) {
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    {
        let inbound = async {
            while let Some(Ok(message)) = client_rx.next().await {
                let closing = matches!(message, ws::Message::Close(_));
                if upstream_tx.send(to_upstream(message)).await.is_err() || closing {
                    break;
                }
            }
        };
        let outbound = async {
            while let Some(Ok(message)) = upstream_rx.next().await {
                let closing = matches!(message, Message::Close(_));
                let Some(message) = to_client(message) else {
                    continue;
                };
                if client_tx.send(message).await.is_err() || closing {
                    break;
                }
            }
        };
        tokio::select! {
            _ = inbound => {}
            _ = outbound => {}
        }
    }

    let _ = upstream_tx.close().await;
    let _ = client_tx.close().await;
}

/// Connects to `ws://{address}/subscribe`.
pub(super) async fn connect(address: &str) -> Result<Upstream, tungstenite::Error> {
    let url = format!("ws://{}/subscribe", address);
    let (upstream, _) = tokio_tungstenite::connect_async(url).await?;
    Ok(upstream)
}
