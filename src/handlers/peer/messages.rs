//! Peer WebSocket message types
//!
//! Media travels as base64 inside JSON text frames so a browser client can
//! drive the bridge without a binary framing layer. Raw binary frames are
//! also accepted as mono PCM16LE at the bridge input rate.

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::media::{AudioFrame, CodecError, MediaBlob, VideoFrame};

/// Maximum base64 size of one audio payload (1 MB)
pub const MAX_AUDIO_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Maximum base64 size of one image payload (8 MB)
pub const MAX_IMAGE_PAYLOAD_SIZE: usize = 8 * 1024 * 1024;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming WebSocket messages from the peer
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum PeerIncomingMessage {
    /// Microphone audio
    #[serde(rename = "audio")]
    Audio(AudioPayload),

    /// Camera or screen frame
    #[serde(rename = "video")]
    Video(ImagePayload),

    /// Set the still image sent alongside sampled video frames
    #[serde(rename = "image")]
    Image(ImagePayload),

    /// Remove the still image
    #[serde(rename = "clear_image")]
    ClearImage,
}

/// PCM16LE audio, base64 encoded
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioPayload {
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    pub data: String,
}

fn default_channels() -> u16 {
    1
}

/// Packed RGB24 pixels, base64 encoded
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImagePayload {
    pub width: u32,
    pub height: u32,
    pub data: String,
}

impl AudioPayload {
    /// Decode into an audio frame.
    pub fn into_frame(self) -> Result<AudioFrame, CodecError> {
        let bytes = BASE64_STANDARD
            .decode(&self.data)
            .map_err(|e| CodecError::Decoding(e.to_string()))?;
        if bytes.len() % 2 != 0 {
            return Err(CodecError::InvalidShape(format!(
                "PCM16 payload has odd length {}",
                bytes.len()
            )));
        }
        Ok(AudioFrame {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples: crate::core::media::decode_audio(&bytes),
        })
    }
}

impl ImagePayload {
    /// Decode into a validated video frame.
    pub fn into_frame(self) -> Result<VideoFrame, CodecError> {
        let bytes = BASE64_STANDARD
            .decode(&self.data)
            .map_err(|e| CodecError::Decoding(e.to_string()))?;
        VideoFrame::new(self.width, self.height, bytes)
    }
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Outgoing WebSocket messages to the peer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PeerOutgoingMessage {
    /// Live session is open
    #[serde(rename = "ready")]
    Ready {
        peer_id: String,
        model: String,
        input_sample_rate: u32,
        output_sample_rate: u32,
    },

    /// Model audio for playback
    #[serde(rename = "audio")]
    Audio { sample_rate: u32, data: String },

    /// Passthrough frame, JPEG encoded
    #[serde(rename = "video")]
    Video(MediaBlob),

    /// Error with a machine-readable code
    #[serde(rename = "error")]
    Error { code: String, message: String },

    /// The server is about to close the connection
    #[serde(rename = "closing")]
    Closing { reason: String },
}

impl PeerOutgoingMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Message routing for the sender task
pub enum PeerMessageRoute {
    /// JSON text message
    Outgoing(PeerOutgoingMessage),
    /// Close connection
    Close,
}

// =============================================================================
// Validation
// =============================================================================

/// Validation errors for incoming messages
#[derive(Debug, Error)]
pub enum PeerValidationError {
    #[error("Audio payload too large: {size} bytes (max {max})")]
    AudioTooLarge { size: usize, max: usize },

    #[error("Image payload too large: {size} bytes (max {max})")]
    ImageTooLarge { size: usize, max: usize },
}

impl PeerIncomingMessage {
    /// Reject payloads above the size limits before decoding them.
    pub fn validate_size(&self) -> Result<(), PeerValidationError> {
        match self {
            PeerIncomingMessage::Audio(audio) => {
                let size = audio.data.len();
                if size > MAX_AUDIO_PAYLOAD_SIZE {
                    return Err(PeerValidationError::AudioTooLarge {
                        size,
                        max: MAX_AUDIO_PAYLOAD_SIZE,
                    });
                }
            }
            PeerIncomingMessage::Video(image) | PeerIncomingMessage::Image(image) => {
                let size = image.data.len();
                if size > MAX_IMAGE_PAYLOAD_SIZE {
                    return Err(PeerValidationError::ImageTooLarge {
                        size,
                        max: MAX_IMAGE_PAYLOAD_SIZE,
                    });
                }
            }
            PeerIncomingMessage::ClearImage => {}
        }
        Ok(())
    }
}
