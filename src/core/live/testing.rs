//! In-memory transports for exercising bridges without sockets.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use super::base::{
    DownstreamFrame, DownstreamSink, DownstreamSource, LiveError, LiveResult, Side,
    UpstreamConnector, UpstreamSink, UpstreamSource,
};
use super::gemini::UpstreamEnvelope;

// =============================================================================
// Downstream
// =============================================================================

pub struct ChannelDownstreamSource {
    rx: mpsc::UnboundedReceiver<LiveResult<Bytes>>,
}

#[async_trait]
impl DownstreamSource for ChannelDownstreamSource {
    async fn recv(&mut self) -> LiveResult<Option<Bytes>> {
        match self.rx.recv().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

pub struct ChannelDownstreamSink {
    tx: mpsc::UnboundedSender<DownstreamFrame>,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl DownstreamSink for ChannelDownstreamSink {
    async fn send(&mut self, frame: DownstreamFrame) -> LiveResult<()> {
        if self.closed {
            return Err(LiveError::TransportClosed {
                side: Side::Downstream,
            });
        }
        self.tx
            .send(frame)
            .map_err(|_| LiveError::disconnected(Side::Downstream, "client receiver dropped"))
    }

    async fn close(&mut self) -> LiveResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Client side of an in-memory downstream connection.
pub struct ClientHandle {
    pub audio: mpsc::UnboundedSender<LiveResult<Bytes>>,
    pub frames: mpsc::UnboundedReceiver<DownstreamFrame>,
    pub closes: Arc<AtomicUsize>,
}

impl ClientHandle {
    pub fn send_audio(&self, chunk: impl Into<Bytes>) {
        let _ = self.audio.send(Ok(chunk.into()));
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub fn mock_downstream() -> (ChannelDownstreamSource, ChannelDownstreamSink, ClientHandle) {
    let (audio_tx, audio_rx) = mpsc::unbounded_channel();
    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    let closes = Arc::new(AtomicUsize::new(0));

    (
        ChannelDownstreamSource { rx: audio_rx },
        ChannelDownstreamSink {
            tx: frame_tx,
            closes: closes.clone(),
            closed: false,
        },
        ClientHandle {
            audio: audio_tx,
            frames: frame_rx,
            closes,
        },
    )
}

// =============================================================================
// Upstream
// =============================================================================

pub struct ChannelUpstreamSink {
    tx: mpsc::UnboundedSender<Value>,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl UpstreamSink for ChannelUpstreamSink {
    async fn send(&mut self, envelope: &UpstreamEnvelope) -> LiveResult<()> {
        if self.closed {
            return Err(LiveError::TransportClosed {
                side: Side::Upstream,
            });
        }
        let value = serde_json::to_value(envelope).map_err(super::codec::CodecError::from)?;
        self.tx
            .send(value)
            .map_err(|_| LiveError::disconnected(Side::Upstream, "service receiver dropped"))
    }

    async fn close(&mut self) -> LiveResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct ChannelUpstreamSource {
    rx: mpsc::UnboundedReceiver<LiveResult<String>>,
}

#[async_trait]
impl UpstreamSource for ChannelUpstreamSource {
    async fn recv(&mut self) -> LiveResult<Option<String>> {
        match self.rx.recv().await {
            Some(Ok(text)) => Ok(Some(text)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Service side of an in-memory upstream connection.
pub struct ServiceHandle {
    /// Every envelope the relay sent, as JSON.
    pub received: mpsc::UnboundedReceiver<Value>,
    pub outbox: mpsc::UnboundedSender<LiveResult<String>>,
    pub closes: Arc<AtomicUsize>,
}

impl ServiceHandle {
    pub fn send_json(&self, value: Value) {
        let _ = self.outbox.send(Ok(value.to_string()));
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Drain everything received so far.
    pub fn drain(&mut self) -> Vec<Value> {
        let mut values = Vec::new();
        while let Ok(value) = self.received.try_recv() {
            values.push(value);
        }
        values
    }
}

pub fn mock_upstream() -> (ChannelUpstreamSink, ChannelUpstreamSource, ServiceHandle) {
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let closes = Arc::new(AtomicUsize::new(0));

    (
        ChannelUpstreamSink {
            tx: sent_tx,
            closes: closes.clone(),
            closed: false,
        },
        ChannelUpstreamSource { rx: outbox_rx },
        ServiceHandle {
            received: sent_rx,
            outbox: outbox_tx,
            closes,
        },
    )
}

/// Source that panics on first read.
pub struct PanickingUpstreamSource;

#[async_trait]
impl UpstreamSource for PanickingUpstreamSource {
    async fn recv(&mut self) -> LiveResult<Option<String>> {
        panic!("upstream source exploded");
    }
}

/// Sink whose close never completes, like a peer that stops reading.
pub struct StuckUpstreamSink {
    inner: ChannelUpstreamSink,
}

impl StuckUpstreamSink {
    pub fn new(inner: ChannelUpstreamSink) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl UpstreamSink for StuckUpstreamSink {
    async fn send(&mut self, envelope: &UpstreamEnvelope) -> LiveResult<()> {
        self.inner.send(envelope).await
    }

    async fn close(&mut self) -> LiveResult<()> {
        std::future::pending::<LiveResult<()>>().await
    }
}

// =============================================================================
// Connector
// =============================================================================

/// Hands out one prepared upstream pair, or fails.
pub struct MockConnector<Si, So> {
    pair: Mutex<Option<(Si, So)>>,
    pub connects: AtomicUsize,
}

impl<Si, So> MockConnector<Si, So> {
    pub fn new(sink: Si, source: So) -> Self {
        Self {
            pair: Mutex::new(Some((sink, source))),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            pair: Mutex::new(None),
            connects: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<Si, So> UpstreamConnector for MockConnector<Si, So>
where
    Si: UpstreamSink + 'static,
    So: UpstreamSource + 'static,
{
    type Sink = Si;
    type Source = So;

    async fn connect(&self) -> LiveResult<(Si, So)> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let pair = self.pair.lock().map(|mut guard| guard.take()).ok().flatten();
        pair.ok_or_else(|| LiveError::disconnected(Side::Upstream, "connection refused"))
    }
}

// =============================================================================
// Logs
// =============================================================================

/// Records every event on the current thread as `field=value` text.
#[derive(Clone, Default)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogCapture {
    /// Install as the thread default until the guard drops.
    pub fn set_default(&self) -> DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    /// Number of captured events whose text contains `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.lines
            .lock()
            .map(|lines| lines.iter().filter(|line| line.contains(needle)).count())
            .unwrap_or(0)
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut line = LineVisitor(String::new());
        event.record(&mut line);
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.0);
        }
    }
}

struct LineVisitor(String);

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.push_str(&format!("{}={} ", field.name(), value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{value:?} "));
        } else {
            self.0.push_str(&format!("{}={:?} ", field.name(), value));
        }
    }
}
