use serde::Deserialize;
use std::path::Path;
use zeroize::Zeroizing;

use super::env::parse_stream_end;
use super::{ConfigError, ServerConfig};

/// Complete YAML configuration structure
///
/// This structure represents the full configuration that can be loaded from a YAML file.
/// All fields are optional to allow partial configuration. Values present here override
/// environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///
/// gemini:
///   api_key: "your-google-api-key"
///   url: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent"
///   model: "models/gemini-2.5-flash-native-audio-preview-09-2025"
///   voice: "Puck"
///   system_instruction: "You are a helpful voice assistant."
///   warm_up_text: "Hello"
///
/// relay:
///   idle_window_ms: 1000
///   setup_timeout_ms: 10000
///   connect_timeout_ms: 10000
///   stream_end: "audio_stream_end"
///
/// audio:
///   sample_rate: 24000
///   frame_size: 2400
///   channels: 1
///
/// security:
///   cors_allowed_origins: "*"
///   max_ws_message_size: 10485760
///   max_bridges: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub gemini: Option<GeminiYaml>,
    pub relay: Option<RelayYaml>,
    pub audio: Option<AudioYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Gemini Live configuration from YAML
#[derive(Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeminiYaml {
    pub api_key: Option<String>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub system_instruction: Option<String>,
    pub warm_up_text: Option<String>,
}

impl std::fmt::Debug for GeminiYaml {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiYaml")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("url", &self.url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("system_instruction", &self.system_instruction)
            .field("warm_up_text", &self.warm_up_text)
            .finish()
    }
}

/// Relay timing configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RelayYaml {
    pub idle_window_ms: Option<u64>,
    pub setup_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    /// "audio_stream_end" or "turn_complete"
    pub stream_end: Option<String>,
}

/// Audio stream configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    pub sample_rate: Option<u32>,
    pub frame_size: Option<u32>,
    pub channels: Option<u16>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub max_ws_message_size: Option<usize>,
    pub max_bridges: Option<usize>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or contains invalid YAML
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Override `config` with every value present in this file.
    pub fn apply(self, config: &mut ServerConfig) {
        if let Some(server) = self.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
        }

        if let Some(gemini) = self.gemini {
            if let Some(key) = gemini.api_key {
                config.google_api_key = Zeroizing::new(key);
            }
            if let Some(url) = gemini.url {
                config.gemini_url = url;
            }
            if let Some(model) = gemini.model {
                config.gemini_model = model;
            }
            if gemini.voice.is_some() {
                config.gemini_voice = gemini.voice;
            }
            if gemini.system_instruction.is_some() {
                config.system_instruction = gemini.system_instruction;
            }
            if gemini.warm_up_text.is_some() {
                config.warm_up_text = gemini.warm_up_text;
            }
        }

        if let Some(relay) = self.relay {
            if let Some(ms) = relay.idle_window_ms {
                config.idle_window_ms = ms;
            }
            if let Some(ms) = relay.setup_timeout_ms {
                config.setup_timeout_ms = ms;
            }
            if let Some(ms) = relay.connect_timeout_ms {
                config.connect_timeout_ms = ms;
            }
            if let Some(value) = relay.stream_end {
                config.stream_end = parse_stream_end(&value);
            }
        }

        if let Some(audio) = self.audio {
            if let Some(rate) = audio.sample_rate {
                config.sample_rate = rate;
            }
            if let Some(size) = audio.frame_size {
                config.frame_size = size;
            }
            if let Some(channels) = audio.channels {
                config.channels = channels;
            }
        }

        if let Some(security) = self.security {
            if security.cors_allowed_origins.is_some() {
                config.cors_allowed_origins = security.cors_allowed_origins;
            }
            if let Some(size) = security.max_ws_message_size {
                config.max_ws_message_size = size;
            }
            if security.max_bridges.is_some() {
                config.max_bridges = security.max_bridges;
            }
        }
    }
}
