//! Frame containers.
//!
//! - `Frame`: a decoded color frame as it leaves the ingestion layer.
//! - `AnnotatedFrame`: the per-frame output delivered to sinks, packed RGB24.
//!
//! Frames are owned by the worker that decoded them and are never shared across streams.

use image::RgbImage;

use crate::error::{PipelineError, PipelineResult};

// ----------------------------------------------------------------------------
// Frame: decoded input
// ----------------------------------------------------------------------------

/// Decoded color frame (height x width x 3, 8-bit channels, RGB order).
#[derive(Clone, Debug)]
pub struct Frame {
    /// Zero-based position of this frame in its stream.
    pub index: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Build a frame from tightly packed RGB24 bytes.
    ///
    /// Returns `PipelineError::Decode` when the buffer does not match the dimensions.
    pub fn from_rgb(index: u64, width: u32, height: u32, pixels: Vec<u8>) -> PipelineResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| PipelineError::Decode("frame dimensions overflow".to_string()))?;
        if pixels.len() != expected {
            return Err(PipelineError::Decode(format!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            )));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| PipelineError::Decode("RGB buffer rejected".to_string()))?;
        Ok(Self { index, image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

// ----------------------------------------------------------------------------
// AnnotatedFrame: sink output
// ----------------------------------------------------------------------------

/// One processed frame with overlays drawn.
///
/// Pixel layout: 24-bit interleaved RGB, row-major, stride = 3 * width.
#[derive(Clone, Debug)]
pub struct AnnotatedFrame {
    pub stream: usize,
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl AnnotatedFrame {
    pub fn from_image(stream: usize, index: u64, image: RgbImage) -> Self {
        let width = image.width();
        let height = image.height();
        Self {
            stream,
            index,
            width,
            height,
            data: image.into_raw(),
        }
    }

    pub fn stride(&self) -> usize {
        self.width as usize * 3
    }

    /// RGB value at (x, y), if inside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * 3;
        Some([self.data[offset], self.data[offset + 1], self.data[offset + 2]])
    }
}
