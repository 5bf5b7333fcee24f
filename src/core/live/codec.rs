//! Conversion between raw PCM frames and the upstream JSON envelope.
//!
//! Everything here is pure: no I/O and no state.

use base64::prelude::*;
use thiserror::Error;

use super::base::{AudioStreamConfig, SessionSettings};
use super::gemini::{
    ClientContent, Content, GenerationConfig, MediaChunk, PrebuiltVoiceConfig, ServerMessage,
    SetupPayload, SpeechConfig, StreamEndEncoding, TextPart, UpstreamEnvelope, VoiceConfig,
};

/// Errors raised while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Zero-length audio cannot be sent upstream.
    #[error("Audio chunk is empty")]
    EmptyChunk,

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Role used for client text turns.
pub const USER_ROLE: &str = "user";

/// Wrap one raw PCM chunk as a realtime audio input message.
pub fn encode_audio_input(
    chunk: &[u8],
    config: &AudioStreamConfig,
) -> Result<UpstreamEnvelope, CodecError> {
    if chunk.is_empty() {
        return Err(CodecError::EmptyChunk);
    }

    Ok(UpstreamEnvelope::RealtimeAudioInput(MediaChunk {
        mime_type: config.mime_type(),
        data: BASE64_STANDARD.encode(chunk),
    }))
}

/// A single complete user text turn.
pub fn encode_text_turn(text: &str) -> UpstreamEnvelope {
    UpstreamEnvelope::TextTurn(ClientContent {
        turns: vec![Content {
            role: Some(USER_ROLE.to_string()),
            parts: vec![TextPart {
                text: text.to_string(),
            }],
        }],
        turn_complete: true,
    })
}

pub fn encode_stream_end(encoding: StreamEndEncoding) -> UpstreamEnvelope {
    UpstreamEnvelope::AudioStreamEnd(encoding)
}

/// Build the setup handshake for a session.
pub fn encode_setup(settings: &SessionSettings) -> UpstreamEnvelope {
    let speech_config = settings.voice.as_ref().map(|voice| SpeechConfig {
        voice_config: VoiceConfig {
            prebuilt_voice_config: PrebuiltVoiceConfig {
                voice_name: voice.clone(),
            },
        },
    });

    let system_instruction = settings
        .system_instruction
        .as_ref()
        .map(|instruction| Content {
            role: None,
            parts: vec![TextPart {
                text: instruction.clone(),
            }],
        });

    UpstreamEnvelope::Setup(SetupPayload {
        model: settings.model.clone(),
        generation_config: GenerationConfig {
            response_modalities: settings.response_modalities.clone(),
            speech_config,
        },
        system_instruction,
    })
}

pub fn parse_server_message(text: &str) -> Result<ServerMessage, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Decode one base64 audio part, appending it to `audio`.
///
/// Parts of one message are decoded into the same buffer so they reach the
/// client as a single frame, in array order.
pub fn decode_audio_part(data: &str, audio: &mut Vec<u8>) -> Result<(), CodecError> {
    BASE64_STANDARD.decode_vec(data, audio)?;
    Ok(())
}
