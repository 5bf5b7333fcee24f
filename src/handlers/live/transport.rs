//! Downstream transport over an axum WebSocket.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::core::live::{
    DownstreamFrame, DownstreamSink, DownstreamSource, LiveError, LiveResult, Side,
};

/// Reading half of a client socket.
pub struct WsDownstreamSource {
    stream: SplitStream<WebSocket>,
}

impl WsDownstreamSource {
    pub fn new(stream: SplitStream<WebSocket>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl DownstreamSource for WsDownstreamSource {
    async fn recv(&mut self) -> LiveResult<Option<Bytes>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
                Some(Ok(Message::Text(text))) => {
                    warn!(len = text.len(), "Ignoring text frame from client");
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Client sent close frame");
                    return Ok(None);
                }
                // Ping/pong are answered by axum
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(LiveError::disconnected(Side::Downstream, e)),
                None => return Ok(None),
            }
        }
    }
}

/// Writing half of a client socket.
pub struct WsDownstreamSink {
    sink: SplitSink<WebSocket, Message>,
    closed: bool,
}

impl WsDownstreamSink {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink, closed: false }
    }
}

#[async_trait]
impl DownstreamSink for WsDownstreamSink {
    async fn send(&mut self, frame: DownstreamFrame) -> LiveResult<()> {
        if self.closed {
            return Err(LiveError::TransportClosed {
                side: Side::Downstream,
            });
        }

        let message = match frame {
            DownstreamFrame::Audio(data) => Message::Binary(data),
            DownstreamFrame::Status(status) => {
                Message::Text(DownstreamFrame::status_json(status).into())
            }
        };

        self.sink
            .send(message)
            .await
            .map_err(|e| LiveError::disconnected(Side::Downstream, e))
    }

    async fn close(&mut self) -> LiveResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.sink
            .close()
            .await
            .map_err(|e| LiveError::disconnected(Side::Downstream, e))
    }
}
