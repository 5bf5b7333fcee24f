//! Duplex live audio relay.
//!
//! Bridges a client WebSocket carrying raw PCM to a Gemini Live session
//! carrying base64 audio in JSON envelopes.
//!
//! # Architecture
//!
//! - `codec`: pure conversion between PCM chunks and upstream envelopes
//! - `negotiator`: setup handshake and optional warm-up turn
//! - `idle`: caller silence detection driving stream-end markers
//! - `forwarder`: the outbound and inbound loops and their supervisor
//! - `bridge`: per-connection lifecycle with close-exactly-once teardown
//! - `gemini`: the upstream wire format and WebSocket client
//!
//! # Example
//!
//! ```rust,ignore
//! use live_relay::core::live::{BridgeSettings, GeminiLiveConfig, GeminiLiveConnector, LiveBridge};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let connector = GeminiLiveConnector::new(GeminiLiveConfig::new(api_key));
//! let bridge = LiveBridge::new(Arc::new(BridgeSettings::default()), CancellationToken::new());
//! let report = bridge.run(client_source, client_sink, &connector).await;
//! println!("bridge {} ended: {}", report.bridge_id, report.cause);
//! ```

mod base;
pub mod bridge;
pub mod codec;
pub mod forwarder;
pub mod gemini;
pub mod idle;
pub mod negotiator;

#[cfg(test)]
pub(crate) mod testing;

pub use base::{
    AudioStreamConfig, BridgeSettings, DEFAULT_CHANNELS, DEFAULT_FRAME_SIZE, DEFAULT_IDLE_WINDOW,
    DEFAULT_SAMPLE_RATE, DEFAULT_SETUP_TIMEOUT, DownstreamFrame, DownstreamSink, DownstreamSource,
    LiveError, LiveResult, SampleFormat, SessionSettings, Side, StatusMessage, TurnStatus,
    UpstreamConnector, UpstreamSink, UpstreamSource,
};
pub use bridge::{BridgePhase, BridgeReport, LiveBridge};
pub use codec::CodecError;
pub use forwarder::{InboundStats, OutboundStats, RelayStats, TerminationCause};
pub use gemini::{GeminiLiveConfig, GeminiLiveConnector, StreamEndEncoding, UpstreamEnvelope};
pub use idle::IdleDetector;
pub use negotiator::NegotiationOutcome;
