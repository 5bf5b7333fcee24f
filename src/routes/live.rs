//! Live audio WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::live_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the live audio WebSocket router
///
/// # Endpoint
///
/// `GET /ws/gemini_live` - WebSocket upgrade for a relayed Gemini Live session
///
/// # Protocol
///
/// Clients send binary frames of raw PCM (16-bit little-endian, 24kHz, mono by
/// default). The session starts as soon as the socket opens; no configuration
/// message is expected.
///
/// Server responds with:
/// - Binary frames carrying model audio in the same PCM format
/// - `{"status": "turn_complete"}` when the model finishes a turn
/// - `{"status": "interrupted"}` when the model's turn is cut short
///
/// A pause of one idle window in client audio (1s by default) marks the end of
/// the user's utterance.
pub fn create_live_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/gemini_live", get(live_handler))
        .layer(TraceLayer::new_for_http())
}
