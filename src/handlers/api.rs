use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::state::AppState;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "OK" }))
}

/// Session parameters a client needs before connecting
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub model: String,
    pub api_version: String,
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub video_send_interval_ms: u64,
    pub session_time_limit_seconds: Option<u64>,
    pub max_concurrent_peers: Option<usize>,
    pub active_peers: usize,
}

/// Bridge and server information endpoint
pub async fn info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    let bridge = state.bridge.config();
    Json(InfoResponse {
        model: bridge.model.clone(),
        api_version: state.config.gemini_api_version.clone(),
        input_sample_rate: bridge.input_sample_rate,
        output_sample_rate: bridge.output_sample_rate,
        video_send_interval_ms: bridge.video_send_interval.as_millis() as u64,
        session_time_limit_seconds: state.config.session_time_limit().map(|d| d.as_secs()),
        max_concurrent_peers: state.config.peer_limit(),
        active_peers: state.active_peers(),
    })
}
