use bytes::Bytes;

use super::{CodecError, CodecResult};

/// Number of bytes per pixel in a packed RGB24 frame.
pub const RGB_CHANNELS: usize = 3;

/// A buffer of PCM samples captured by the peer.
///
/// Multi-channel audio is stored interleaved. The bridge only accepts mono
/// input, see [`AudioFrame::squeeze`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Raw 16-bit samples
    pub samples: Vec<i16>,
}

impl AudioFrame {
    /// Create a mono frame.
    pub fn mono(sample_rate: u32, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            channels: 1,
            samples,
        }
    }

    /// Collapse the frame to a one-dimensional mono sample slice.
    pub fn squeeze(&self) -> CodecResult<&[i16]> {
        if self.channels == 0 {
            return Err(CodecError::InvalidShape(
                "audio frame has zero channels".to_string(),
            ));
        }
        if self.samples.len() % self.channels as usize != 0 {
            return Err(CodecError::InvalidShape(format!(
                "{} samples do not divide into {} channels",
                self.samples.len(),
                self.channels
            )));
        }
        if self.channels != 1 {
            return Err(CodecError::InvalidShape(format!(
                "expected mono audio, got {} channels",
                self.channels
            )));
        }
        Ok(&self.samples)
    }
}

/// A packed RGB24 video frame (`height × width × 3` bytes).
///
/// Pixel data is reference counted, so cloning a frame for both the
/// passthrough queue and the encoder does not copy the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    width: u32,
    height: u32,
    data: Bytes,
}

impl VideoFrame {
    /// Create a frame, validating dimensions against the buffer length.
    pub fn new(width: u32, height: u32, data: impl Into<Bytes>) -> CodecResult<Self> {
        let data = data.into();
        if width == 0 || height == 0 {
            return Err(CodecError::InvalidShape(format!(
                "image dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize * RGB_CHANNELS;
        if data.len() != expected {
            return Err(CodecError::InvalidShape(format!(
                "expected {expected} bytes for {width}x{height} RGB frame, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// All-black frame of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * RGB_CHANNELS;
        Self {
            width,
            height,
            data: Bytes::from(vec![0u8; len]),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGB24 pixel bytes.
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Whether every pixel byte is zero.
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|b| *b == 0)
    }
}
