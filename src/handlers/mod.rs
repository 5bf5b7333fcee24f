//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `live` - Client audio WebSocket bridged to Gemini Live

pub mod api;
pub mod live;

pub use live::live_handler;
