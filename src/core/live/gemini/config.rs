//! Gemini Live API configuration types.
//!
//! This module contains the connection-level settings for the Gemini Live
//! `BidiGenerateContent` WebSocket endpoint:
//! - Endpoint and model defaults
//! - Stream-end encoding selection
//! - Connector configuration (credential, URL, connect timeout)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use zeroize::Zeroizing;

use crate::core::live::base::{LiveError, LiveResult};

/// Gemini Live API WebSocket endpoint.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default model for native audio sessions.
pub const GEMINI_DEFAULT_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-09-2025";

/// Default timeout for opening the upstream socket.
pub const GEMINI_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Stream End Encoding
// =============================================================================

/// Wire encoding used to tell the service that caller audio has paused.
///
/// Service versions disagree on which message ends an audio stream, so the
/// choice is made per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEndEncoding {
    /// `{"realtimeInput": {"audioStreamEnd": true}}`
    #[default]
    AudioStreamEnd,
    /// `{"clientContent": {"turnComplete": true}}`
    TurnComplete,
}

impl StreamEndEncoding {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AudioStreamEnd => "audio_stream_end",
            Self::TurnComplete => "turn_complete",
        }
    }

    /// Parse a known name or alias. Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "audio_stream_end" | "audiostreamend" | "realtime_input" => Some(Self::AudioStreamEnd),
            "turn_complete" | "turncomplete" | "client_content" => Some(Self::TurnComplete),
            _ => None,
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

impl std::fmt::Display for StreamEndEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Connector Configuration
// =============================================================================

/// Settings needed to open an upstream Gemini Live socket.
#[derive(Clone)]
pub struct GeminiLiveConfig {
    /// API key passed as the `key` query parameter.
    pub api_key: Zeroizing<String>,
    /// Endpoint URL without the credential.
    pub url: String,
    /// Bound on TCP + TLS + WebSocket handshake.
    pub connect_timeout: Duration,
}

impl GeminiLiveConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Zeroizing::new(api_key.into()),
            url: GEMINI_LIVE_URL.to_string(),
            connect_timeout: GEMINI_CONNECT_TIMEOUT,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build the endpoint URL carrying the credential.
    pub fn endpoint_url(&self) -> LiveResult<Url> {
        if self.api_key.is_empty() {
            return Err(LiveError::InvalidConfiguration(
                "Gemini API key is required".to_string(),
            ));
        }

        let mut url = Url::parse(&self.url).map_err(|e| {
            LiveError::InvalidConfiguration(format!("Invalid Gemini Live URL '{}': {e}", self.url))
        })?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(LiveError::InvalidConfiguration(format!(
                    "Unsupported Gemini Live URL scheme '{other}'"
                )));
            }
        }

        url.query_pairs_mut().append_pair("key", self.api_key.as_str());
        Ok(url)
    }

    /// Endpoint URL with the credential removed, for logging.
    pub fn redacted_url(&self) -> String {
        let mut url = match Url::parse(&self.url) {
            Ok(url) => url,
            Err(_) => return self.url.clone(),
        };
        url.set_query(None);
        url.to_string()
    }
}

impl std::fmt::Debug for GeminiLiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiLiveConfig")
            .field("api_key", &"***")
            .field("url", &self.redacted_url())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
