//! Base traits and types for duplex live sessions.
//!
//! A live session is a duplex conversation with a remote model: encoded
//! audio/image chunks go in, audio chunks come out asynchronously and out of
//! sync with the input.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::media::MediaBlob;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during live session operations.
#[derive(Debug, Error)]
pub enum LiveError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// The session was closed cleanly, by either side
    #[error("Connection closed")]
    ConnectionClosed,

    /// The remote end closed the connection abnormally
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
}

/// Result type for live session operations.
pub type LiveResult<T> = Result<T, LiveError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Output modality requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    /// Spoken audio responses
    Audio,
    /// Text responses
    Text,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Audio => write!(f, "AUDIO"),
            Modality::Text => write!(f, "TEXT"),
        }
    }
}

/// Per-session configuration sent when the session is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSessionConfig {
    /// Response modalities (audio-only by default)
    pub response_modalities: Vec<Modality>,
}

impl Default for LiveSessionConfig {
    fn default() -> Self {
        Self {
            response_modalities: vec![Modality::Audio],
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

/// One response chunk from the remote session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveResponse {
    /// Concatenated raw audio payload (PCM16LE), if the chunk carried any
    pub data: Option<Bytes>,
    /// The model finished its turn with this chunk
    pub turn_complete: bool,
    /// The model's turn was interrupted by user input; audio still queued
    /// for playback is stale
    pub interrupted: bool,
}

impl LiveResponse {
    /// Chunk carrying an audio payload.
    pub fn audio(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(data.into()),
            ..Default::default()
        }
    }

    /// Empty chunk that ends the current turn.
    pub fn turn_complete() -> Self {
        Self {
            turn_complete: true,
            ..Default::default()
        }
    }
}

// =============================================================================
// Session Traits
// =============================================================================

/// An open duplex session with a remote conversational model.
///
/// All methods take `&self` so a session can be shared between the task
/// draining responses and the callers pushing media.
#[async_trait]
pub trait LiveSession: Send + Sync {
    /// Send one encoded media chunk.
    async fn send(&self, input: MediaBlob) -> LiveResult<()>;

    /// Wait for the next response chunk.
    ///
    /// Returns [`LiveError::ConnectionClosed`] once the session has been
    /// closed cleanly and all buffered chunks were consumed.
    async fn next_response(&self) -> LiveResult<LiveResponse>;

    /// Close the session.
    async fn close(&self) -> LiveResult<()>;

    /// Check whether the session can still accept input.
    fn is_open(&self) -> bool;
}

/// Shared handle to a live session.
pub type SharedLiveSession = Arc<dyn LiveSession>;

/// Opens live sessions against a remote endpoint.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Open a session for `model` with the given configuration.
    async fn connect(&self, model: &str, config: &LiveSessionConfig)
    -> LiveResult<SharedLiveSession>;
}

/// Lazily yield the response chunks of a single model turn.
///
/// The stream ends after the chunk flagged `turn_complete`, or after the
/// first error (including a clean close).
pub fn receive_turn(session: SharedLiveSession) -> impl Stream<Item = LiveResult<LiveResponse>> {
    async_stream::stream! {
        loop {
            match session.next_response().await {
                Ok(response) => {
                    let done = response.turn_complete;
                    yield Ok(response);
                    if done {
                        break;
                    }
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
}
