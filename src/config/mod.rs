//! Configuration module for the live relay server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//!
//! # Example
//! ```rust,no_run
//! use live_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::core::live::{
    AudioStreamConfig, BridgeSettings, DEFAULT_CHANNELS, DEFAULT_FRAME_SIZE, DEFAULT_SAMPLE_RATE,
    GeminiLiveConfig, GeminiLiveConnector, SampleFormat, SessionSettings, StreamEndEncoding,
};
use crate::core::live::gemini::{GEMINI_DEFAULT_MODEL, GEMINI_LIVE_URL};

mod env;
mod yaml;

pub use yaml::YamlConfig;

/// Default maximum WebSocket message size (10 MB)
pub const DEFAULT_MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration
///
/// Contains everything needed to run the relay:
/// - Server settings (host, port, CORS, connection limits)
/// - Gemini Live credential, endpoint and session parameters
/// - Relay timing (idle window, setup and connect timeouts)
/// - Audio stream shape
#[derive(Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Gemini Live settings
    /// Google API key, zeroized when dropped
    pub google_api_key: Zeroizing<String>,
    pub gemini_url: String,
    pub gemini_model: String,
    /// Prebuilt voice name (e.g. "Puck")
    pub gemini_voice: Option<String>,
    pub system_instruction: Option<String>,
    /// Text turn sent once each session is ready
    pub warm_up_text: Option<String>,

    // Relay timing
    pub idle_window_ms: u64,
    pub setup_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub stream_end: StreamEndEncoding,

    // Audio stream
    pub sample_rate: u32,
    pub frame_size: u32,
    pub channels: u16,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Connection limits
    /// Maximum size of one client WebSocket message
    pub max_ws_message_size: usize,
    /// Maximum concurrent bridges
    /// Default: None (unlimited)
    pub max_bridges: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            google_api_key: Zeroizing::new(String::new()),
            gemini_url: GEMINI_LIVE_URL.to_string(),
            gemini_model: GEMINI_DEFAULT_MODEL.to_string(),
            gemini_voice: None,
            system_instruction: None,
            warm_up_text: None,
            idle_window_ms: 1000,
            setup_timeout_ms: 10_000,
            connect_timeout_ms: 10_000,
            stream_end: StreamEndEncoding::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            channels: DEFAULT_CHANNELS,
            cors_allowed_origins: None,
            max_ws_message_size: DEFAULT_MAX_WS_MESSAGE_SIZE,
            max_bridges: None,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("google_api_key", &mask_secret(&self.google_api_key))
            .field("gemini_url", &self.gemini_url)
            .field("gemini_model", &self.gemini_model)
            .field("gemini_voice", &self.gemini_voice)
            .field("system_instruction", &self.system_instruction)
            .field("warm_up_text", &self.warm_up_text)
            .field("idle_window_ms", &self.idle_window_ms)
            .field("setup_timeout_ms", &self.setup_timeout_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("stream_end", &self.stream_end)
            .field("sample_rate", &self.sample_rate)
            .field("frame_size", &self.frame_size)
            .field("channels", &self.channels)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("max_ws_message_size", &self.max_ws_message_size)
            .field("max_bridges", &self.max_bridges)
            .finish()
    }
}

/// Show only the last four characters of a secret.
fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if secret.chars().count() <= 4 {
        "***".to_string()
    } else {
        format!("***{tail}")
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// The .env file is loaded in main.rs at application startup, so its values
    /// are already visible as environment variables here.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        env::apply_env(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;

        let mut config = Self::default();
        env::apply_env(&mut config)?;
        yaml_config.apply(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.google_api_key.trim().is_empty() {
            return Err(ConfigError::Missing("GOOGLE_API_KEY"));
        }
        if self.gemini_model.trim().is_empty() {
            return Err(ConfigError::Missing("GEMINI_MODEL"));
        }
        if self.idle_window_ms == 0 {
            return Err(ConfigError::Invalid(
                "idle window must be greater than zero".to_string(),
            ));
        }
        if self.setup_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.max_ws_message_size == 0 {
            return Err(ConfigError::Invalid(
                "max_ws_message_size must be greater than zero".to_string(),
            ));
        }
        if self.max_bridges == Some(0) {
            return Err(ConfigError::Invalid(
                "max_bridges must be greater than zero when set".to_string(),
            ));
        }

        self.audio_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        self.gemini_config()
            .endpoint_url()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn audio_config(&self) -> AudioStreamConfig {
        AudioStreamConfig {
            sample_rate: self.sample_rate,
            frame_size: self.frame_size,
            channels: self.channels,
            sample_format: SampleFormat::Int16Le,
        }
    }

    /// Settings shared by every bridge.
    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            audio: self.audio_config(),
            session: SessionSettings {
                model: self.gemini_model.clone(),
                voice: self.gemini_voice.clone(),
                system_instruction: self.system_instruction.clone(),
                warm_up_text: self.warm_up_text.clone(),
                setup_timeout: Duration::from_millis(self.setup_timeout_ms),
                ..Default::default()
            },
            idle_window: Duration::from_millis(self.idle_window_ms),
            stream_end: self.stream_end,
        }
    }

    pub fn gemini_config(&self) -> GeminiLiveConfig {
        GeminiLiveConfig::new(self.google_api_key.as_str())
            .with_url(self.gemini_url.clone())
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
    }

    pub fn connector(&self) -> GeminiLiveConnector {
        GeminiLiveConnector::new(self.gemini_config())
    }
}
