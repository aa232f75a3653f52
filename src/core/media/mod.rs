//! Media frame types and the codec adapter.
//!
//! Frames arrive from the peer transport as raw PCM samples or packed RGB24
//! pixels. The codec functions turn them into the small `{mimeType, data}`
//! blobs the Gemini Live API accepts, and decode model audio back into
//! samples.
//!
//! # Audio Format
//!
//! - Input: PCM 16-bit signed little-endian, 16kHz, mono
//! - Output: PCM 16-bit signed little-endian, 24kHz, mono
//!
//! # Image Format
//!
//! Frames are packed RGB24 (`height × width × 3`), sent to the model as JPEG.

mod codec;
mod frames;

pub use codec::{
    AUDIO_PCM_MIME_TYPE, IMAGE_JPEG_MIME_TYPE, JPEG_QUALITY, MediaBlob, decode_audio,
    encode_audio, encode_image, encode_image_with_quality,
};
pub use frames::{AudioFrame, RGB_CHANNELS, VideoFrame};

use thiserror::Error;

/// Errors raised while validating or encoding media.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame shape does not match what the adapter expects
    #[error("Invalid frame shape: {0}")]
    InvalidShape(String),

    /// The image encoder rejected the frame
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Base64 payload could not be decoded
    #[error("Decoding failed: {0}")]
    Decoding(String),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
