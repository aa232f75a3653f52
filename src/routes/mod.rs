pub mod api;
pub mod peer;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Combine all routes into one application router
pub fn create_router(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(peer::create_peer_router())
        .with_state(state)
}
