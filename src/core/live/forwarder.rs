//! The two relay loops and the supervisor that couples them.
//!
//! The outbound loop moves caller audio upstream and owns the idle detector.
//! The inbound loop moves model audio and turn signals downstream. Both are
//! polled by one `select!`, so whichever finishes first cancels the other.

use bytes::Bytes;
use std::fmt;
use tokio::select;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::base::{
    BridgeSettings, DownstreamFrame, DownstreamSink, DownstreamSource, LiveError, LiveResult,
    TurnStatus, UpstreamSink, UpstreamSource,
};
use super::codec::{
    decode_audio_part, encode_audio_input, encode_stream_end, parse_server_message,
};
use super::gemini::DownstreamEvent;
use super::idle::IdleDetector;

// =============================================================================
// Statistics
// =============================================================================

/// Counters kept by the outbound loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboundStats {
    pub chunks: u64,
    pub bytes: u64,
    /// Empty chunks dropped before encoding.
    pub skipped: u64,
    /// Chunks whose length differed from the configured frame.
    pub odd_sized: u64,
    pub stream_ends: u64,
}

/// Counters kept by the inbound loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboundStats {
    pub messages: u64,
    pub audio_frames: u64,
    pub audio_bytes: u64,
    pub turn_completes: u64,
    pub interruptions: u64,
    pub ignored: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub outbound: OutboundStats,
    pub inbound: InboundStats,
}

// =============================================================================
// Termination
// =============================================================================

/// Why a bridge stopped relaying.
#[derive(Debug)]
pub enum TerminationCause {
    /// The service closed the session.
    UpstreamClosed,
    /// The client went away.
    DownstreamDisconnected,
    /// Server shutdown.
    Cancelled,
    Failed(LiveError),
}

impl TerminationCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpstreamClosed => "upstream_closed",
            Self::DownstreamDisconnected => "downstream_disconnected",
            Self::Cancelled => "cancelled",
            Self::Failed(_) => "failed",
        }
    }

    pub fn error(&self) -> Option<&LiveError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(e) => write!(f, "failed: {e}"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

// =============================================================================
// Loops
// =============================================================================

/// Forward caller audio upstream until the client closes.
///
/// Waits on the client no longer than the idle detector allows; each expiry
/// ticks the detector, which decides whether a stream-end is owed.
pub async fn run_outbound<Src, Snk>(
    downstream: &mut Src,
    upstream: &mut Snk,
    settings: &BridgeSettings,
    stats: &mut OutboundStats,
) -> LiveResult<()>
where
    Src: DownstreamSource + ?Sized,
    Snk: UpstreamSink + ?Sized,
{
    let mut detector = IdleDetector::new(settings.idle_window);
    let expected_len = settings.audio.expected_chunk_len();
    let mut last_odd_len: Option<usize> = None;

    loop {
        let wait = detector.time_until_due(Instant::now());
        match timeout(wait, downstream.recv()).await {
            Ok(Ok(Some(chunk))) => {
                if chunk.is_empty() {
                    stats.skipped += 1;
                    debug!("Skipping empty audio chunk");
                    continue;
                }

                detector.on_audio(Instant::now());

                if chunk.len() != expected_len {
                    stats.odd_sized += 1;
                    if last_odd_len != Some(chunk.len()) {
                        warn!(
                            len = chunk.len(),
                            expected = expected_len,
                            "Audio chunk size differs from configured frame, forwarding as-is"
                        );
                        last_odd_len = Some(chunk.len());
                    }
                }

                let envelope = encode_audio_input(&chunk, &settings.audio)?;
                upstream.send(&envelope).await?;
                stats.chunks += 1;
                stats.bytes += chunk.len() as u64;
            }
            Ok(Ok(None)) => {
                debug!(
                    chunks = stats.chunks,
                    mid_utterance = detector.is_active(),
                    "Client audio stream ended"
                );
                return Ok(());
            }
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) => {
                if detector.on_tick(Instant::now()) {
                    upstream.send(&encode_stream_end(settings.stream_end)).await?;
                    stats.stream_ends += 1;
                    debug!(encoding = %settings.stream_end, "Caller idle, sent stream end");
                }
            }
        }
    }
}

/// Forward model audio and turn signals downstream until the service closes.
///
/// All audio parts of one message are decoded into a single frame, which is
/// sent before any status frame from the same message.
pub async fn run_inbound<Src, Snk>(
    upstream: &mut Src,
    downstream: &mut Snk,
    stats: &mut InboundStats,
) -> LiveResult<()>
where
    Src: UpstreamSource + ?Sized,
    Snk: DownstreamSink + ?Sized,
{
    let mut pending = Vec::new();

    while let Some(text) = upstream.recv().await? {
        stats.messages += 1;
        let message = parse_server_message(&text)?;

        for event in message.events(&text) {
            match event {
                DownstreamEvent::ModelAudioPart { data } => {
                    decode_audio_part(data, &mut pending)?;
                }
                DownstreamEvent::TurnComplete => {
                    flush_audio(&mut pending, downstream, stats).await?;
                    stats.turn_completes += 1;
                    downstream
                        .send(DownstreamFrame::Status(TurnStatus::TurnComplete))
                        .await?;
                }
                DownstreamEvent::Interrupted => {
                    flush_audio(&mut pending, downstream, stats).await?;
                    stats.interruptions += 1;
                    downstream
                        .send(DownstreamFrame::Status(TurnStatus::Interrupted))
                        .await?;
                }
                DownstreamEvent::UsageMetadata(usage) => {
                    info!(usage = %usage, "Upstream usage metadata");
                }
                DownstreamEvent::SetupComplete => {
                    debug!("Ignoring repeated setup acknowledgement");
                }
                DownstreamEvent::Unrecognized { raw } => {
                    stats.ignored += 1;
                    debug!(len = raw.len(), "Ignoring unrecognized upstream message");
                }
            }
        }

        flush_audio(&mut pending, downstream, stats).await?;
    }

    debug!(messages = stats.messages, "Upstream message stream ended");
    Ok(())
}

/// Send decoded audio as one frame, if any is pending.
async fn flush_audio<Snk>(
    pending: &mut Vec<u8>,
    downstream: &mut Snk,
    stats: &mut InboundStats,
) -> LiveResult<()>
where
    Snk: DownstreamSink + ?Sized,
{
    if pending.is_empty() {
        return Ok(());
    }

    let audio = Bytes::from(std::mem::take(pending));
    stats.audio_frames += 1;
    stats.audio_bytes += audio.len() as u64;
    downstream.send(DownstreamFrame::Audio(audio)).await
}

/// Run both loops until one finishes or `cancel` fires.
pub async fn run_duplex<DSrc, DSnk, USnk, USrc>(
    downstream_source: &mut DSrc,
    downstream_sink: &mut DSnk,
    upstream_sink: &mut USnk,
    upstream_source: &mut USrc,
    settings: &BridgeSettings,
    cancel: &CancellationToken,
) -> (TerminationCause, RelayStats)
where
    DSrc: DownstreamSource + ?Sized,
    DSnk: DownstreamSink + ?Sized,
    USnk: UpstreamSink + ?Sized,
    USrc: UpstreamSource + ?Sized,
{
    let mut outbound = OutboundStats::default();
    let mut inbound = InboundStats::default();

    let cause = select! {
        result = run_outbound(downstream_source, upstream_sink, settings, &mut outbound) => match result {
            Ok(()) => TerminationCause::DownstreamDisconnected,
            Err(e) => TerminationCause::Failed(e),
        },
        result = run_inbound(upstream_source, downstream_sink, &mut inbound) => match result {
            Ok(()) => TerminationCause::UpstreamClosed,
            Err(e) => TerminationCause::Failed(e),
        },
        _ = cancel.cancelled() => TerminationCause::Cancelled,
    };

    (cause, RelayStats { outbound, inbound })
}
