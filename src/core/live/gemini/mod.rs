//! Gemini Live API upstream.
//!
//! - `config`: endpoint, model defaults and connector settings
//! - `messages`: client envelopes and server message types
//! - `client`: tokio-tungstenite transport

mod client;
mod config;
mod messages;

pub use client::{GeminiLiveConnector, GeminiLiveSink, GeminiLiveSource, binary_frame_as_json};
pub use config::{
    GEMINI_CONNECT_TIMEOUT, GEMINI_DEFAULT_MODEL, GEMINI_LIVE_URL, GeminiLiveConfig,
    StreamEndEncoding,
};
pub use messages::{
    ClientContent, Content, DownstreamEvent, GenerationConfig, InlineData, MediaChunk, ModelPart,
    ModelTurn, PrebuiltVoiceConfig, ServerContent, ServerMessage, SetupPayload, SpeechConfig,
    TextPart, UpstreamEnvelope, VoiceConfig,
};
