use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;
use tungstenite::{Error as WsError, Message};

use super::broadcaster::Broadcaster;
use super::session::{SessionError, ViewerSink};

/// Write half of a viewer's WebSocket.
pub struct WebSocketSink<S> {
    writer: Mutex<SplitSink<WebSocketStream<S>, Message>>,
}

impl<S> WebSocketSink<S> {
    pub fn new(writer: SplitSink<WebSocketStream<S>, Message>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl<S> ViewerSink for WebSocketSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send_text(&self, text: &str) -> Result<(), SessionError> {
        let mut writer = self.writer.lock().await;
        writer
            .send(Message::Text(text.to_owned()))
            .await
            .map_err(|e| match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed => SessionError::Closed,
                other => SessionError::Transport(other.to_string()),
            })
    }

    async fn close(&self) {
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.close().await {
            debug!("WebSocket close failed: {}", e);
        }
    }
}

/// Run one viewer connection to completion.
///
/// Registers the write half, then drains and discards inbound frames until
/// the peer closes, the transport errors, or the broadcaster drops the
/// session (eviction or shutdown). Returning releases the connection.
pub async fn serve_viewer<S>(stream: WebSocketStream<S>, broadcaster: Arc<Broadcaster>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (writer, mut reader) = stream.split();
    let (id, mut removal) = broadcaster
        .register_with_removal(Arc::new(WebSocketSink::new(writer)))
        .await;

    loop {
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(Message::Close(_))) => {
                    debug!("Viewer {} sent close", id);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Viewer {} read error: {}", id, e);
                    break;
                }
                None => break,
            },
            _ = &mut removal => {
                debug!("Viewer {} dropped by the broadcaster", id);
                break;
            }
        }
    }

    broadcaster.unregister(id).await;
}
