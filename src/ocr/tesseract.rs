use std::ffi::CString;

use anyhow::{anyhow, Result};
use image::GrayImage;
use leptess::tesseract::TessApi;

use super::OcrEngine;

const WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
/// Treat the image as a single text line.
const PAGESEG_SINGLE_LINE: &str = "7";

/// Tesseract OCR over the prepared plate image.
pub struct TesseractOcr {
    api: TessApi,
}

// SAFETY: the handle is owned by exactly one stream worker and never shared;
// tesseract's base API is safe to move between threads when not used concurrently.
unsafe impl Send for TesseractOcr {}

impl TesseractOcr {
    pub fn new(data_path: Option<&str>, language: &str) -> Result<Self> {
        let mut api = TessApi::new(data_path, language)
            .map_err(|e| anyhow!("tesseract init failed for '{}': {:?}", language, e))?;
        set_variable(&mut api, "tessedit_char_whitelist", WHITELIST)?;
        set_variable(&mut api, "tessedit_pageseg_mode", PAGESEG_SINGLE_LINE)?;
        Ok(Self { api })
    }
}

fn set_variable(api: &mut TessApi, name: &str, value: &str) -> Result<()> {
    let name_c = CString::new(name)?;
    let value_c = CString::new(value)?;
    api.raw
        .set_variable(&name_c, &value_c)
        .map_err(|e| anyhow!("tesseract set_variable {}: {:?}", name, e))
}

impl OcrEngine for TesseractOcr {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&mut self, image: &GrayImage) -> Result<String> {
        let width = i32::try_from(image.width())?;
        let height = i32::try_from(image.height())?;
        self.api
            .raw
            .set_image(image.as_raw(), width, height, 1, width)
            .map_err(|e| anyhow!("tesseract set_image: {:?}", e))?;
        let text = self
            .api
            .get_utf8_text()
            .map_err(|e| anyhow!("tesseract recognition: {:?}", e))?;
        Ok(text.trim().to_string())
    }
}
