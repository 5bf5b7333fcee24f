//! Gemini Live API message types.
//!
//! Client messages are modelled by [`UpstreamEnvelope`], a closed set that
//! always serializes to a JSON object with exactly one top-level key.
//! Server messages deserialize into [`ServerMessage`] and are flattened into
//! an ordered list of [`DownstreamEvent`]s.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use super::config::StreamEndEncoding;

// =============================================================================
// Client Messages
// =============================================================================

/// Every message the relay sends upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEnvelope {
    /// Session setup handshake.
    Setup(SetupPayload),
    /// One chunk of caller audio.
    RealtimeAudioInput(MediaChunk),
    /// A complete text turn.
    TextTurn(ClientContent),
    /// Caller audio has paused.
    AudioStreamEnd(StreamEndEncoding),
}

impl UpstreamEnvelope {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::RealtimeAudioInput(_) => "realtime_audio_input",
            Self::TextTurn(_) => "text_turn",
            Self::AudioStreamEnd(_) => "audio_stream_end",
        }
    }
}

impl Serialize for UpstreamEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Setup(setup) => map.serialize_entry("setup", setup)?,
            Self::RealtimeAudioInput(chunk) => map.serialize_entry(
                "realtimeInput",
                &RealtimeInput {
                    media_chunks: std::slice::from_ref(chunk),
                },
            )?,
            Self::TextTurn(content) => map.serialize_entry("clientContent", content)?,
            Self::AudioStreamEnd(StreamEndEncoding::AudioStreamEnd) => map.serialize_entry(
                "realtimeInput",
                &AudioStreamEndInput {
                    audio_stream_end: true,
                },
            )?,
            Self::AudioStreamEnd(StreamEndEncoding::TurnComplete) => map.serialize_entry(
                "clientContent",
                &TurnCompleteOnly {
                    turn_complete: true,
                },
            )?,
        }
        map.end()
    }
}

/// Body of the `setup` message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupPayload {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

/// A role-tagged list of text parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextPart {
    pub text: String,
}

/// Base64 audio tagged with its MIME type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInput<'a> {
    media_chunks: &'a [MediaChunk],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioStreamEndInput {
    audio_stream_end: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TurnCompleteOnly {
    turn_complete: bool,
}

// =============================================================================
// Server Messages
// =============================================================================

/// One message received from the service.
///
/// Every field is optional; a single message may carry several of them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub usage_metadata: Option<Value>,
    /// Everything the relay does not interpret (tool calls, go-away notices...).
    #[serde(flatten)]
    pub other: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub turn_complete: Option<bool>,
    #[serde(default)]
    pub interrupted: Option<bool>,
}

impl ServerContent {
    pub fn turn_complete(&self) -> bool {
        self.turn_complete.unwrap_or(false)
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<ModelPart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPart {
    #[serde(default)]
    pub inline_data: Option<InlineData>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: String,
}

/// Interpreted upstream events, in the order they must be handled.
///
/// Events borrow from the parsed message and its raw text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DownstreamEvent<'a> {
    SetupComplete,
    /// Base64 audio from one model turn part.
    ModelAudioPart { data: &'a str },
    TurnComplete,
    Interrupted,
    UsageMetadata(&'a Value),
    /// Nothing the relay acts on.
    Unrecognized { raw: &'a str },
}

impl ServerMessage {
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Iterate the non-empty base64 audio payloads in array order.
    pub fn audio_parts(&self) -> impl Iterator<Item = &str> {
        self.server_content
            .iter()
            .filter_map(|content| content.model_turn.as_ref())
            .flat_map(|turn| turn.parts.iter())
            .filter_map(|part| part.inline_data.as_ref())
            .map(|inline| inline.data.as_str())
            .filter(|data| !data.is_empty())
    }

    /// Flatten this message into events. Audio parts come first, then
    /// `TurnComplete`, then `Interrupted`, then usage metadata.
    pub fn events<'a>(&'a self, raw: &'a str) -> Vec<DownstreamEvent<'a>> {
        let mut events = Vec::new();

        if self.is_setup_complete() {
            events.push(DownstreamEvent::SetupComplete);
        }

        for data in self.audio_parts() {
            events.push(DownstreamEvent::ModelAudioPart { data });
        }

        if let Some(content) = &self.server_content {
            if content.turn_complete() {
                events.push(DownstreamEvent::TurnComplete);
            }
            if content.interrupted() {
                events.push(DownstreamEvent::Interrupted);
            }
        }

        if let Some(usage) = &self.usage_metadata {
            events.push(DownstreamEvent::UsageMetadata(usage));
        }

        if events.is_empty() {
            events.push(DownstreamEvent::Unrecognized { raw });
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_audio_stream_end_encodings() {
        let json = serde_json::to_value(UpstreamEnvelope::AudioStreamEnd(
            StreamEndEncoding::AudioStreamEnd,
        ))
        .unwrap();
        assert_eq!(json, json!({"realtimeInput": {"audioStreamEnd": true}}));

        let json = serde_json::to_value(UpstreamEnvelope::AudioStreamEnd(
            StreamEndEncoding::TurnComplete,
        ))
        .unwrap();
        assert_eq!(json, json!({"clientContent": {"turnComplete": true}}));
    }

    #[test]
    fn test_realtime_audio_input_shape() {
        let envelope = UpstreamEnvelope::RealtimeAudioInput(MediaChunk {
            mime_type: "audio/pcm;rate=24000".to_string(),
            data: "AAEC".to_string(),
        });
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            json!({"realtimeInput": {"mediaChunks": [{"mimeType": "audio/pcm;rate=24000", "data": "AAEC"}]}})
        );
        assert_eq!(envelope.kind(), "realtime_audio_input");
    }

    #[test]
    fn test_setup_omits_optional_fields() {
        let envelope = UpstreamEnvelope::Setup(SetupPayload {
            model: "models/test".to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: None,
            },
            system_instruction: None,
        });
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            json!({"setup": {"model": "models/test", "generationConfig": {"responseModalities": ["AUDIO"]}}})
        );
    }

    #[test]
    fn test_server_message_ignores_unknown_fields() {
        let raw = r#"{"goAway": {"timeLeft": "10s"}}"#;
        let message: ServerMessage = serde_json::from_str(raw).unwrap();
        assert!(message.other.contains_key("goAway"));
        assert_eq!(
            message.events(raw),
            vec![DownstreamEvent::Unrecognized { raw }]
        );
    }

    #[test]
    fn test_events_order_audio_then_status() {
        let raw = json!({
            "serverContent": {
                "modelTurn": {"parts": [
                    {"inlineData": {"mimeType": "audio/pcm", "data": "QQ=="}},
                    {"text": "thinking"},
                    {"inlineData": {"mimeType": "audio/pcm", "data": ""}},
                    {"inlineData": {"mimeType": "audio/pcm", "data": "Qg=="}}
                ]},
                "turnComplete": true,
                "interrupted": true
            },
            "usageMetadata": {"totalTokenCount": 12}
        })
        .to_string();
        let message: ServerMessage = serde_json::from_str(&raw).unwrap();
        let events = message.events(&raw);

        let usage = json!({"totalTokenCount": 12});
        assert_eq!(
            events,
            vec![
                DownstreamEvent::ModelAudioPart { data: "QQ==" },
                DownstreamEvent::ModelAudioPart { data: "Qg==" },
                DownstreamEvent::TurnComplete,
                DownstreamEvent::Interrupted,
                DownstreamEvent::UsageMetadata(&usage),
            ]
        );
    }

    #[test]
    fn test_setup_complete_event() {
        let raw = r#"{"setupComplete": {}}"#;
        let message: ServerMessage = serde_json::from_str(raw).unwrap();
        assert!(message.is_setup_complete());
        assert_eq!(message.events(raw), vec![DownstreamEvent::SetupComplete]);
    }
}
