//! Base traits and types for the live audio relay.
//!
//! This module defines the foundational abstractions shared by every bridge:
//! errors, audio stream configuration, downstream frames, session settings and
//! the transport traits that let the relay run over real sockets or in-memory
//! channels.
//!
//! # Audio Format
//!
//! Audio is passed through untouched. The default stream is PCM 16-bit signed
//! little-endian, mono, 24kHz, sent in 2400-sample (4800-byte) chunks.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::codec::CodecError;
use super::gemini::{GEMINI_DEFAULT_MODEL, StreamEndEncoding, UpstreamEnvelope};

// =============================================================================
// Error Types
// =============================================================================

/// Which leg of a bridge an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The client connection accepted by this server.
    Downstream,
    /// The connection to the generative audio service.
    Upstream,
}

impl Side {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Downstream => "downstream",
            Self::Upstream => "upstream",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur while relaying a live session.
#[derive(Debug, Error)]
pub enum LiveError {
    /// The transport was closed cleanly and cannot be used any more.
    #[error("{side} transport closed")]
    TransportClosed { side: Side },

    /// The transport was lost abnormally.
    #[error("{side} transport disconnected: {reason}")]
    TransportDisconnected { side: Side, reason: String },

    /// The upstream session never reached the ready state.
    #[error("Session negotiation failed: {0}")]
    NegotiationFailed(String),

    /// A frame could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Invalid configuration, rejected before any socket is opened.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Anything else, including panics caught at the bridge boundary.
    #[error("Unexpected failure: {0}")]
    UnexpectedFailure(String),
}

impl LiveError {
    pub(crate) fn disconnected(side: Side, reason: impl fmt::Display) -> Self {
        Self::TransportDisconnected {
            side,
            reason: reason.to_string(),
        }
    }
}

/// Result type for live relay operations.
pub type LiveResult<T> = Result<T, LiveError>;

// =============================================================================
// Audio Types
// =============================================================================

/// Sample encoding of relayed audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    /// 16-bit signed little-endian PCM
    #[default]
    Int16Le,
}

impl SampleFormat {
    #[inline]
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::Int16Le => 2,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int16Le => "int16",
        }
    }
}

/// Default sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// Default samples per chunk (100ms at 24kHz).
pub const DEFAULT_FRAME_SIZE: u32 = 2400;

/// Default channel count.
pub const DEFAULT_CHANNELS: u16 = 1;

/// Shape of the audio stream relayed in both directions.
///
/// Built once at startup and shared by every bridge. The relay never
/// transcodes; this is used for validation and MIME tagging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStreamConfig {
    pub sample_rate: u32,
    pub frame_size: u32,
    pub channels: u16,
    #[serde(default)]
    pub sample_format: SampleFormat,
}

impl Default for AudioStreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            channels: DEFAULT_CHANNELS,
            sample_format: SampleFormat::Int16Le,
        }
    }
}

impl AudioStreamConfig {
    /// Reject zero-valued parameters.
    pub fn validate(&self) -> LiveResult<()> {
        if self.sample_rate == 0 {
            return Err(LiveError::InvalidConfiguration(
                "sample_rate must be greater than zero".to_string(),
            ));
        }
        if self.frame_size == 0 {
            return Err(LiveError::InvalidConfiguration(
                "frame_size must be greater than zero".to_string(),
            ));
        }
        if self.channels == 0 {
            return Err(LiveError::InvalidConfiguration(
                "channels must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Byte length of one well-formed chunk.
    pub fn expected_chunk_len(&self) -> usize {
        self.frame_size as usize * self.channels as usize * self.sample_format.bytes_per_sample()
    }

    /// MIME type attached to outbound audio.
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }
}

// =============================================================================
// Downstream Frames
// =============================================================================

/// Turn-state signal forwarded to the client as a text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// The model finished its turn.
    TurnComplete,
    /// The model was interrupted by caller speech.
    Interrupted,
}

/// JSON body of a status frame: `{"status": "turn_complete"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: TurnStatus,
}

/// A frame written to the downstream client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownstreamFrame {
    /// Raw synthesized PCM.
    Audio(Bytes),
    /// Turn-state signal.
    Status(TurnStatus),
}

impl DownstreamFrame {
    /// Text payload for status frames.
    pub fn status_json(status: TurnStatus) -> String {
        match status {
            TurnStatus::TurnComplete => r#"{"status":"turn_complete"}"#.to_string(),
            TurnStatus::Interrupted => r#"{"status":"interrupted"}"#.to_string(),
        }
    }
}

// =============================================================================
// Session Settings
// =============================================================================

/// Default idle window before a stream-end is emitted.
pub const DEFAULT_IDLE_WINDOW: Duration = Duration::from_millis(1000);

/// Default bound on waiting for the setup acknowledgement.
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Upstream session parameters sent during negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub model: String,
    pub response_modalities: Vec<String>,
    /// Prebuilt voice name
    pub voice: Option<String>,
    pub system_instruction: Option<String>,
    /// Text turn sent once the session is ready.
    pub warm_up_text: Option<String>,
    pub setup_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: GEMINI_DEFAULT_MODEL.to_string(),
            response_modalities: vec!["AUDIO".to_string()],
            voice: None,
            system_instruction: None,
            warm_up_text: None,
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
        }
    }
}

/// Everything a bridge needs besides its transports.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeSettings {
    pub audio: AudioStreamConfig,
    pub session: SessionSettings,
    pub idle_window: Duration,
    pub stream_end: StreamEndEncoding,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            audio: AudioStreamConfig::default(),
            session: SessionSettings::default(),
            idle_window: DEFAULT_IDLE_WINDOW,
            stream_end: StreamEndEncoding::default(),
        }
    }
}

impl BridgeSettings {
    pub fn validate(&self) -> LiveResult<()> {
        self.audio.validate()?;
        if self.idle_window.is_zero() {
            return Err(LiveError::InvalidConfiguration(
                "idle window must be greater than zero".to_string(),
            ));
        }
        if self.session.setup_timeout.is_zero() {
            return Err(LiveError::InvalidConfiguration(
                "setup timeout must be greater than zero".to_string(),
            ));
        }
        if self.session.model.trim().is_empty() {
            return Err(LiveError::InvalidConfiguration(
                "model must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Transport Traits
// =============================================================================

/// Receiving half of the client connection.
#[async_trait]
pub trait DownstreamSource: Send {
    /// Next binary audio chunk. `Ok(None)` once the client has closed.
    /// Non-audio frames are consumed internally.
    async fn recv(&mut self) -> LiveResult<Option<Bytes>>;
}

/// Sending half of the client connection.
#[async_trait]
pub trait DownstreamSink: Send {
    async fn send(&mut self, frame: DownstreamFrame) -> LiveResult<()>;

    /// Close the connection. Calling this more than once is a no-op.
    async fn close(&mut self) -> LiveResult<()>;
}

/// Receiving half of the service connection.
#[async_trait]
pub trait UpstreamSource: Send {
    /// Next JSON message as text. `Ok(None)` once the service has closed.
    async fn recv(&mut self) -> LiveResult<Option<String>>;
}

/// Sending half of the service connection.
#[async_trait]
pub trait UpstreamSink: Send {
    async fn send(&mut self, envelope: &UpstreamEnvelope) -> LiveResult<()>;

    /// Close the connection. Calling this more than once is a no-op.
    async fn close(&mut self) -> LiveResult<()>;
}

/// Opens upstream connections for new bridges.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    type Sink: UpstreamSink + 'static;
    type Source: UpstreamSource + 'static;

    async fn connect(&self) -> LiveResult<(Self::Sink, Self::Source)>;
}
