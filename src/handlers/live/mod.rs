//! Live audio WebSocket handler
//!
//! Clients stream raw PCM as binary frames and receive model audio as binary
//! frames plus `{"status": ...}` text frames at turn boundaries.

mod handler;
mod transport;

pub use handler::live_handler;
pub use transport::{WsDownstreamSink, WsDownstreamSource};
