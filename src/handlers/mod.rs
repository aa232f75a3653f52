//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check and info endpoints
//! - `peer` - Per-peer media WebSocket

pub mod api;
pub mod peer;

pub use peer::peer_handler;
