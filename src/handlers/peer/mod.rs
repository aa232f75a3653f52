//! Peer WebSocket handlers
//!
//! One connection drives one bridge instance.
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **audio**: PCM16LE samples (`sample_rate`, `channels`, base64 `data`)
//! - **video**: RGB24 frame (`width`, `height`, base64 `data`)
//! - **image**: Still image sent alongside sampled video frames
//! - **clear_image**: Remove the still image
//! - **Binary frames**: Mono PCM16LE at the bridge input rate
//!
//! ## Server → Client
//!
//! - **ready**: Live session established
//! - **audio**: Model audio (`sample_rate`, base64 PCM16LE `data`)
//! - **video**: Passthrough frame as a JPEG blob
//! - **error**: Error with a machine-readable `code`
//! - **closing**: Connection closing (`time_limit`, `idle_timeout`, `session_ended`)

mod handler;
pub mod messages;

pub use handler::peer_handler;
