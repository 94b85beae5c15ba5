//! OCR engines.
//!
//! The engine is a black box mapping a prepared single-channel plate image to
//! free-form text. Casing and spacing are not guaranteed; `PatternMatcher`
//! normalizes afterwards.

#[cfg(feature = "ocr-tesseract")]
mod tesseract;

#[cfg(feature = "ocr-tesseract")]
pub use tesseract::TesseractOcr;

use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use image::GrayImage;

use crate::config::OcrSettings;

pub trait OcrEngine: Send {
    /// Engine identifier.
    fn name(&self) -> &'static str;

    fn recognize(&mut self, image: &GrayImage) -> Result<String>;
}

/// Scripted OCR for tests and demos.
///
/// Returns queued strings in order, then the fallback text for every further call.
#[derive(Debug, Default)]
pub struct StubOcr {
    queue: VecDeque<String>,
    fallback: String,
    calls: u64,
}

impl StubOcr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: texts.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Always return the same text.
    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            fallback: text.into(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl OcrEngine for StubOcr {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn recognize(&mut self, _image: &GrayImage) -> Result<String> {
        self.calls += 1;
        Ok(self
            .queue
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Build the OCR engine named in the configuration.
pub fn engine_from_config(settings: &OcrSettings) -> Result<Box<dyn OcrEngine>> {
    match settings.backend.as_str() {
        "stub" => Ok(Box::new(StubOcr::new())),
        #[cfg(feature = "ocr-tesseract")]
        "tesseract" => Ok(Box::new(TesseractOcr::new(
            settings.data_path.as_deref(),
            &settings.language,
        )?)),
        other => Err(anyhow!("unknown or disabled OCR backend '{}'", other)),
    }
}
