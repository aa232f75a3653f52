//! Peer WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::peer_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the peer WebSocket router
///
/// # Endpoint
///
/// `GET /ws` - WebSocket upgrade for one peer conversation
///
/// # Example
///
/// ```json
/// // Server announces the session
/// {"type": "ready", "peer_id": "...", "model": "gemini-2.0-flash-exp", "input_sample_rate": 16000, "output_sample_rate": 24000}
///
/// // Client streams microphone audio
/// {"type": "audio", "sample_rate": 16000, "data": "<base64 PCM16LE>"}
///
/// // Server streams model audio
/// {"type": "audio", "sample_rate": 24000, "data": "<base64 PCM16LE>"}
/// ```
pub fn create_peer_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(peer_handler))
        .layer(TraceLayer::new_for_http())
}
