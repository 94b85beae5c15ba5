//! Plate region extraction and OCR preprocessing.
//!
//! Order matters and is fixed:
//! 1. clamp the box to the frame and crop (empty crop -> `EmptyRegion`)
//! 2. upscale 3x with cubic interpolation
//! 3. grayscale
//! 4. linear contrast gain of 1.5, saturating
//! 5. bilateral filter (window 9, spatial and colour sigma 75)

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::filter::bilateral_filter;

use crate::detect::BoundingBox;
use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;

pub const UPSCALE_FACTOR: u32 = 3;
pub const CONTRAST_GAIN: f32 = 1.5;
pub const BILATERAL_WINDOW: u32 = 9;
pub const BILATERAL_SIGMA_COLOR: f32 = 75.0;
pub const BILATERAL_SIGMA_SPACE: f32 = 75.0;

/// Output of `PlateExtractor::extract`.
#[derive(Clone, Debug)]
pub struct PreparedPlate {
    /// The clamped crop from the original frame, before any processing.
    pub crop: RgbImage,
    /// Single-channel image ready for OCR.
    pub prepared: GrayImage,
}

pub struct PlateExtractor {
    stream: usize,
    debug_dir: Option<PathBuf>,
}

impl PlateExtractor {
    pub fn new(stream: usize) -> Self {
        Self {
            stream,
            debug_dir: None,
        }
    }

    /// Persist the latest original and prepared crops under `dir`.
    pub fn with_debug_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_dir = dir;
        self
    }

    pub fn extract(&self, frame: &Frame, bbox: &BoundingBox) -> PipelineResult<PreparedPlate> {
        let (width, height) = (frame.width(), frame.height());
        let x1 = bbox.x1.max(0);
        let y1 = bbox.y1.max(0);
        let x2 = bbox.x2.min(width as i32);
        let y2 = bbox.y2.min(height as i32);
        if x2 <= x1 || y2 <= y1 {
            return Err(PipelineError::EmptyRegion {
                x1: bbox.x1,
                y1: bbox.y1,
                x2: bbox.x2,
                y2: bbox.y2,
                width,
                height,
            });
        }

        let crop = imageops::crop_imm(
            frame.image(),
            x1 as u32,
            y1 as u32,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
        )
        .to_image();

        let upscaled = imageops::resize(
            &crop,
            crop.width() * UPSCALE_FACTOR,
            crop.height() * UPSCALE_FACTOR,
            FilterType::CatmullRom,
        );
        let mut gray = imageops::grayscale(&upscaled);
        apply_gain(&mut gray, CONTRAST_GAIN);
        let prepared = smooth(&gray);

        if let Some(dir) = &self.debug_dir {
            self.dump(dir, &crop, &prepared);
        }

        Ok(PreparedPlate { crop, prepared })
    }

    fn dump(&self, dir: &Path, crop: &RgbImage, prepared: &GrayImage) {
        if let Err(e) = std::fs::create_dir_all(dir) {
            log::warn!("stream[{}]: debug dir {}: {}", self.stream, dir.display(), e);
            return;
        }
        let original = dir.join(format!("stream{}_original.png", self.stream));
        if let Err(e) = crop.save(&original) {
            log::warn!("stream[{}]: {}: {}", self.stream, original.display(), e);
        }
        let processed = dir.join(format!("stream{}_preprocessed.png", self.stream));
        if let Err(e) = prepared.save(&processed) {
            log::warn!("stream[{}]: {}: {}", self.stream, processed.display(), e);
        }
    }
}

/// `dst = saturate(round(src * gain))`, no offset.
fn apply_gain(image: &mut GrayImage, gain: f32) {
    for pixel in image.pixels_mut() {
        let value = (pixel.0[0] as f32 * gain).round();
        pixel.0[0] = value.clamp(0.0, 255.0) as u8;
    }
}

/// Edge-preserving smoothing: flat regions are averaged, character strokes survive.
fn smooth(gray: &GrayImage) -> GrayImage {
    bilateral_filter(
        gray,
        BILATERAL_WINDOW,
        BILATERAL_SIGMA_COLOR,
        BILATERAL_SIGMA_SPACE,
    )
}
