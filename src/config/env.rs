//! Environment variable loading.

use std::str::FromStr;
use tracing::warn;
use zeroize::Zeroizing;

use super::{ConfigError, ServerConfig};
use crate::core::live::StreamEndEncoding;

/// Apply process environment variables on top of `config`.
pub(super) fn apply_env(config: &mut ServerConfig) -> Result<(), ConfigError> {
    apply_env_with(config, |key| std::env::var(key).ok())
}

/// Apply variables from `lookup`. Empty values are treated as unset.
pub(super) fn apply_env_with<F>(config: &mut ServerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    // Server
    if let Some(host) = get("HOST") {
        config.host = host;
    }
    if let Some(port) = parse(&get, "PORT")? {
        config.port = port;
    }

    // Gemini Live
    if let Some(key) = get("GOOGLE_API_KEY") {
        config.google_api_key = Zeroizing::new(key);
    }
    if let Some(url) = get("GEMINI_LIVE_URL") {
        config.gemini_url = url;
    }
    if let Some(model) = get("GEMINI_MODEL") {
        config.gemini_model = model;
    }
    if let Some(voice) = get("GEMINI_VOICE") {
        config.gemini_voice = Some(voice);
    }
    if let Some(instruction) = get("GEMINI_SYSTEM_INSTRUCTION") {
        config.system_instruction = Some(instruction);
    }
    if let Some(text) = get("LIVE_WARM_UP_TEXT") {
        config.warm_up_text = Some(text);
    }

    // Relay timing
    if let Some(ms) = parse(&get, "LIVE_IDLE_WINDOW_MS")? {
        config.idle_window_ms = ms;
    }
    if let Some(ms) = parse(&get, "LIVE_SETUP_TIMEOUT_MS")? {
        config.setup_timeout_ms = ms;
    }
    if let Some(ms) = parse(&get, "LIVE_CONNECT_TIMEOUT_MS")? {
        config.connect_timeout_ms = ms;
    }
    if let Some(value) = get("LIVE_STREAM_END") {
        config.stream_end = parse_stream_end(&value);
    }

    // Audio
    if let Some(rate) = parse(&get, "AUDIO_SAMPLE_RATE")? {
        config.sample_rate = rate;
    }
    if let Some(size) = parse(&get, "AUDIO_FRAME_SIZE")? {
        config.frame_size = size;
    }
    if let Some(channels) = parse(&get, "AUDIO_CHANNELS")? {
        config.channels = channels;
    }

    // Security and limits
    if let Some(origins) = get("CORS_ALLOWED_ORIGINS") {
        config.cors_allowed_origins = Some(origins);
    }
    if let Some(size) = parse(&get, "MAX_WS_MESSAGE_SIZE")? {
        config.max_ws_message_size = size;
    }
    if let Some(max) = parse(&get, "MAX_BRIDGES")? {
        config.max_bridges = Some(max);
    }

    Ok(())
}

fn parse<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(None),
    }
}

/// Lenient parse; unknown values fall back to the default with a warning.
pub(super) fn parse_stream_end(value: &str) -> StreamEndEncoding {
    StreamEndEncoding::parse(value).unwrap_or_else(|| {
        let encoding = StreamEndEncoding::default();
        warn!(
            value,
            using = %encoding,
            "Unrecognized stream end encoding"
        );
        encoding
    })
}
