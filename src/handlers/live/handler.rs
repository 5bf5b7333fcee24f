use axum::{
    extract::{
        ConnectInfo, State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::live::{BridgeReport, LiveBridge};
use crate::state::{AppState, BridgeSlot};

use super::transport::{WsDownstreamSink, WsDownstreamSource};

/// Live audio WebSocket handler
///
/// Reserves a bridge slot before upgrading so that a server at capacity
/// answers with 503 instead of accepting a socket it cannot serve.
///
/// # Arguments
/// * `ws` - The WebSocket upgrade request from Axum
/// * `state` - Application state holding bridge settings and the upstream connector
/// * `addr` - Peer address, used for logging only
pub async fn live_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let slot = match state.try_acquire_bridge() {
        Ok(slot) => slot,
        Err(e) => {
            warn!(peer = %addr, error = %e, "Rejecting live connection");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response();
        }
    };

    info!(peer = %addr, "Live WebSocket connection upgrade requested");

    let max_size = state.config.max_ws_message_size;
    ws.max_frame_size(max_size)
        .max_message_size(max_size)
        .on_upgrade(move |socket| handle_live_socket(socket, state, slot, addr))
}

/// Bridge one client socket to a fresh upstream session.
async fn handle_live_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    _slot: BridgeSlot,
    addr: SocketAddr,
) {
    let (sender, receiver) = socket.split();

    let bridge = LiveBridge::new(state.bridge_settings.clone(), state.shutdown.child_token());
    info!(bridge_id = %bridge.id(), peer = %addr, "Live WebSocket connection established");

    let report = bridge
        .run(
            WsDownstreamSource::new(receiver),
            WsDownstreamSink::new(sender),
            state.connector.as_ref(),
        )
        .await;

    log_report(&report);
}

fn log_report(report: &BridgeReport) {
    let outbound = &report.stats.outbound;
    let inbound = &report.stats.inbound;
    info!(
        bridge_id = %report.bridge_id,
        cause = %report.cause,
        upstream_opened = report.upstream_opened,
        duration_ms = report.duration.as_millis() as u64,
        chunks_sent = outbound.chunks,
        bytes_sent = outbound.bytes,
        stream_ends = outbound.stream_ends,
        audio_frames = inbound.audio_frames,
        audio_bytes = inbound.audio_bytes,
        turns = inbound.turn_completes,
        interruptions = inbound.interruptions,
        "Live session closed"
    );
}
