//! Streaming media bridge.
//!
//! The bridge sits between a peer transport that delivers and pulls frames
//! on its own cadence and one duplex live session. Inbound audio is encoded
//! and forwarded immediately, inbound video is echoed back for local display
//! and sampled at a fixed interval for the model, and model audio is drained
//! by a background task into a queue the transport polls with `emit()`.
//!
//! # Lifecycle
//!
//! ```text
//! Idle -> Connecting -> Listening -> Closed      (shutdown)
//!                           \-----> Idle        (remote close)
//! ```
//!
//! Every frame-facing entry point is non-blocking or waits for at most
//! `emit_timeout`.

mod handler;
mod queue;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::core::live::{
    DEFAULT_MODEL, GEMINI_INPUT_SAMPLE_RATE, GEMINI_OUTPUT_SAMPLE_RATE, LiveError,
    LiveSessionConfig,
};
use crate::core::media::CodecError;

pub use handler::LiveBridge;
pub use queue::WaitQueue;

/// Default minimum spacing between video frames sent to the model.
pub const DEFAULT_VIDEO_SEND_INTERVAL: Duration = Duration::from_secs(1);

/// Default bounded wait for `emit()` and `video_emit()`.
pub const DEFAULT_EMIT_TIMEOUT: Duration = Duration::from_millis(10);

/// Default filler frame edge length.
pub const DEFAULT_FILLER_SIZE: u32 = 100;

// =============================================================================
// Error Types
// =============================================================================

/// Errors surfaced by the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// `start_up` was called while a session is held or being opened
    #[error("A live session is already open for this bridge")]
    SessionAlreadyOpen,

    /// The live session failed
    #[error(transparent)]
    Live(#[from] LiveError),

    /// A frame could not be encoded
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

// =============================================================================
// Configuration
// =============================================================================

/// Fixed parameters of one bridge instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Model id passed to the connector
    pub model: String,
    /// Session configuration sent on connect
    pub session: LiveSessionConfig,
    /// Sample rate of inbound audio
    pub input_sample_rate: u32,
    /// Sample rate reported for outbound audio
    pub output_sample_rate: u32,
    /// Minimum spacing between transmitted video frames
    pub video_send_interval: Duration,
    /// Bounded wait used by `emit()` and `video_emit()`
    pub emit_timeout: Duration,
    /// Filler frame width
    pub filler_width: u32,
    /// Filler frame height
    pub filler_height: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            session: LiveSessionConfig::default(),
            input_sample_rate: GEMINI_INPUT_SAMPLE_RATE,
            output_sample_rate: GEMINI_OUTPUT_SAMPLE_RATE,
            video_send_interval: DEFAULT_VIDEO_SEND_INTERVAL,
            emit_timeout: DEFAULT_EMIT_TIMEOUT,
            filler_width: DEFAULT_FILLER_SIZE,
            filler_height: DEFAULT_FILLER_SIZE,
        }
    }
}

// =============================================================================
// State
// =============================================================================

/// Session lifecycle of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeState {
    /// No session, ready for `start_up`
    #[default]
    Idle,
    /// Opening the remote session
    Connecting,
    /// Session open, receive loop running
    Listening,
    /// Session closed by `shutdown`
    Closed,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeState::Idle => write!(f, "Idle"),
            BridgeState::Connecting => write!(f, "Connecting"),
            BridgeState::Listening => write!(f, "Listening"),
            BridgeState::Closed => write!(f, "Closed"),
        }
    }
}

/// One chunk of model audio ready for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Sample rate of `samples`
    pub sample_rate: u32,
    /// Mono PCM samples
    pub samples: Vec<i16>,
}
