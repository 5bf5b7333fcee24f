//! Gemini Live WebSocket client.
//!
//! Implements the upstream transport traits over tokio-tungstenite. The
//! connector opens one socket per bridge; the socket is split so the inbound
//! and outbound loops each own one half.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use super::config::GeminiLiveConfig;
use super::messages::UpstreamEnvelope;
use crate::core::live::base::{
    LiveError, LiveResult, Side, UpstreamConnector, UpstreamSink, UpstreamSource,
};
use crate::core::live::codec::CodecError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens upstream sockets to the Gemini Live API.
#[derive(Debug, Clone)]
pub struct GeminiLiveConnector {
    config: GeminiLiveConfig,
}

impl GeminiLiveConnector {
    pub fn new(config: GeminiLiveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeminiLiveConfig {
        &self.config
    }
}

#[async_trait]
impl UpstreamConnector for GeminiLiveConnector {
    type Sink = GeminiLiveSink;
    type Source = GeminiLiveSource;

    async fn connect(&self) -> LiveResult<(GeminiLiveSink, GeminiLiveSource)> {
        let url = self.config.endpoint_url()?;
        let redacted = self.config.redacted_url();
        debug!(url = %redacted, "Connecting to Gemini Live API");

        let (ws_stream, _response) = timeout(self.config.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                LiveError::disconnected(
                    Side::Upstream,
                    format!(
                        "connect timed out after {}ms",
                        self.config.connect_timeout.as_millis()
                    ),
                )
            })?
            .map_err(|e| LiveError::disconnected(Side::Upstream, e))?;

        info!(url = %redacted, "Connected to Gemini Live API");

        let (sink, stream) = ws_stream.split();
        Ok((
            GeminiLiveSink { sink, closed: false },
            GeminiLiveSource { stream },
        ))
    }
}

/// Writing half of an upstream socket.
pub struct GeminiLiveSink {
    sink: SplitSink<WsStream, Message>,
    closed: bool,
}

#[async_trait]
impl UpstreamSink for GeminiLiveSink {
    async fn send(&mut self, envelope: &UpstreamEnvelope) -> LiveResult<()> {
        if self.closed {
            return Err(LiveError::TransportClosed {
                side: Side::Upstream,
            });
        }

        let json = serde_json::to_string(envelope).map_err(CodecError::from)?;
        self.sink
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| {
                debug!(kind = envelope.kind(), error = %e, "Failed to send upstream message");
                LiveError::disconnected(Side::Upstream, e)
            })
    }

    async fn close(&mut self) -> LiveResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match self.sink.close().await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(LiveError::disconnected(Side::Upstream, e)),
        }
    }
}

/// Reading half of an upstream socket.
pub struct GeminiLiveSource {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl UpstreamSource for GeminiLiveSource {
    async fn recv(&mut self) -> LiveResult<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Binary(data))) => match binary_frame_as_json(&data) {
                    Some(text) => return Ok(Some(text.to_owned())),
                    None => debug!(len = data.len(), "Ignoring non-JSON binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "Gemini Live closed the connection");
                    return Ok(None);
                }
                Some(Ok(_)) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) => {
                    return Ok(None);
                }
                Some(Err(e)) => return Err(LiveError::disconnected(Side::Upstream, e)),
                None => return Ok(None),
            }
        }
    }
}

/// The service sometimes delivers JSON in binary frames.
pub fn binary_frame_as_json(data: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(data).ok()?;
    text.trim_start().starts_with('{').then_some(text)
}
