//! Gemini Live API WebSocket message types.
//!
//! All messages are JSON objects with a single top-level key naming the
//! message kind.
//!
//! # Protocol Overview
//!
//! Client messages (sent to server):
//! - setup - Model and generation config, must be the first message
//! - realtimeInput - Media chunks (audio/pcm, image/jpeg)
//!
//! Server messages (received from server):
//! - setupComplete - Session is ready for input
//! - serverContent - Model turn parts, turn completion, interruption
//! - goAway - Server will disconnect soon
//! - toolCall / usageMetadata - Not used by the bridge

use base64::prelude::*;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use super::base::{LiveError, LiveResponse, LiveResult, Modality};
use crate::core::media::MediaBlob;

// =============================================================================
// Client Messages
// =============================================================================

/// Messages sent from the bridge to Gemini.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// Initial session setup
    Setup(SetupConfig),
    /// Streaming media input
    RealtimeInput(RealtimeInput),
}

impl ClientMessage {
    /// Build the setup message for a model.
    pub fn setup(model: impl Into<String>, response_modalities: Vec<Modality>) -> Self {
        Self::Setup(SetupConfig {
            model: model.into(),
            generation_config: GenerationConfig {
                response_modalities,
            },
        })
    }

    /// Wrap a single media chunk.
    pub fn media(blob: MediaBlob) -> Self {
        Self::RealtimeInput(RealtimeInput {
            media_chunks: vec![blob],
        })
    }
}

/// Session setup payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupConfig {
    /// Fully qualified model name (`models/...`)
    pub model: String,
    /// Generation configuration
    pub generation_config: GenerationConfig,
}

/// Generation configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Requested response modalities
    pub response_modalities: Vec<Modality>,
}

/// Realtime media input payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    /// Media chunks, in order
    pub media_chunks: Vec<MediaBlob>,
}

// =============================================================================
// Server Messages
// =============================================================================

/// Messages received from Gemini.
///
/// Exactly one field is expected to be populated per message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    /// Acknowledges the setup message
    pub setup_complete: Option<serde_json::Value>,
    /// Model output for the current turn
    pub server_content: Option<ServerContent>,
    /// Server is about to disconnect
    pub go_away: Option<GoAway>,
    /// Function call request (unused)
    pub tool_call: Option<serde_json::Value>,
    /// Token accounting (unused)
    pub usage_metadata: Option<serde_json::Value>,
}

impl ServerMessage {
    #[inline]
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }
}

/// Incremental model output.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    /// Content generated for the current turn
    pub model_turn: Option<Content>,
    /// The model finished its turn
    pub turn_complete: bool,
    /// Generation was interrupted by client input
    pub interrupted: bool,
}

/// Turn content made of parts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Content {
    pub parts: Vec<Part>,
}

/// A single content part.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Part {
    pub text: Option<String>,
    pub inline_data: Option<MediaBlob>,
}

/// Disconnect notice.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoAway {
    pub time_left: Option<String>,
}

impl ServerContent {
    /// Convert to a [`LiveResponse`], concatenating all inline audio parts.
    pub fn into_response(self) -> LiveResult<LiveResponse> {
        let mut audio = BytesMut::new();
        if let Some(turn) = self.model_turn {
            for part in turn.parts {
                let Some(blob) = part.inline_data else {
                    continue;
                };
                if !blob.mime_type.starts_with("audio/") {
                    tracing::debug!("Ignoring non-audio inline data: {}", blob.mime_type);
                    continue;
                }
                let decoded = BASE64_STANDARD
                    .decode(&blob.data)
                    .map_err(|e| LiveError::SerializationError(e.to_string()))?;
                audio.extend_from_slice(&decoded);
            }
        }

        let data: Option<Bytes> = if audio.is_empty() {
            None
        } else {
            Some(audio.freeze())
        };

        Ok(LiveResponse {
            data,
            turn_complete: self.turn_complete,
            interrupted: self.interrupted,
        })
    }
}
