pub mod live;

// Re-export commonly used types for convenience
pub use live::{
    AudioStreamConfig, BridgeReport, BridgeSettings, GeminiLiveConfig, GeminiLiveConnector,
    LiveBridge, LiveError, LiveResult, SessionSettings, StreamEndEncoding, TerminationCause,
};
