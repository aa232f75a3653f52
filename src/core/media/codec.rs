use std::io::Cursor;

use base64::prelude::*;
use image::ImageEncoder;
use serde::{Deserialize, Serialize};

use super::{CodecError, CodecResult, VideoFrame};

/// MIME type for raw PCM audio input.
pub const AUDIO_PCM_MIME_TYPE: &str = "audio/pcm";

/// MIME type for JPEG image input.
pub const IMAGE_JPEG_MIME_TYPE: &str = "image/jpeg";

/// JPEG quality used for frames sent to the model.
pub const JPEG_QUALITY: u8 = 75;

/// Wire-ready media payload: MIME type plus base64 data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaBlob {
    /// MIME type of the payload
    pub mime_type: String,
    /// Base64-encoded payload
    pub data: String,
}

impl MediaBlob {
    /// Decode the base64 payload back into raw bytes.
    pub fn decode_data(&self) -> CodecResult<Vec<u8>> {
        BASE64_STANDARD
            .decode(&self.data)
            .map_err(|e| CodecError::Decoding(e.to_string()))
    }
}

/// Encode mono PCM samples as an `audio/pcm` blob (little-endian 16-bit).
pub fn encode_audio(samples: &[i16]) -> MediaBlob {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }

    MediaBlob {
        mime_type: AUDIO_PCM_MIME_TYPE.to_string(),
        data: BASE64_STANDARD.encode(bytes),
    }
}

/// Encode an RGB frame as an `image/jpeg` blob.
pub fn encode_image(frame: &VideoFrame) -> CodecResult<MediaBlob> {
    encode_image_with_quality(frame, JPEG_QUALITY)
}

/// Encode an RGB frame as an `image/jpeg` blob at the given quality.
pub fn encode_image_with_quality(frame: &VideoFrame, quality: u8) -> CodecResult<MediaBlob> {
    let mut jpeg_data = Vec::new();
    let mut cursor = Cursor::new(&mut jpeg_data);

    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder
        .write_image(
            frame.data(),
            frame.width(),
            frame.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| CodecError::Encoding(format!("JPEG encoding failed: {e}")))?;

    Ok(MediaBlob {
        mime_type: IMAGE_JPEG_MIME_TYPE.to_string(),
        data: BASE64_STANDARD.encode(jpeg_data),
    })
}

/// Decode little-endian PCM16 bytes into samples.
///
/// A trailing odd byte cannot form a sample and is dropped.
pub fn decode_audio(bytes: &[u8]) -> Vec<i16> {
    let chunks = bytes.chunks_exact(2);
    if !chunks.remainder().is_empty() {
        tracing::warn!(
            "Dropping trailing byte from odd-length PCM payload ({} bytes)",
            bytes.len()
        );
    }
    chunks
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
