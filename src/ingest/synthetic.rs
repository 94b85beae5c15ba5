//! Synthetic `stub://` source.
//!
//! Locator form: `stub://<name>?frames=<n>&fps=<f>&width=<w>&height=<h>`.
//! All query keys are optional. Without `frames` the source never ends.
//!
//! Frames are a horizontal gradient with a saturated white plate-sized rectangle
//! drifting left to right, so pixel-based detectors have something to find.

use image::{Rgb, RgbImage};

use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: f64 = 10.0;
const PLATE_WIDTH: u32 = 120;
const PLATE_HEIGHT: u32 = 30;

#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticConfig {
    pub name: String,
    pub frames: Option<u64>,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl SyntheticConfig {
    pub fn parse(locator: &str) -> PipelineResult<Self> {
        let rest = locator
            .strip_prefix("stub://")
            .ok_or_else(|| PipelineError::source_unavailable(locator, "not a stub:// locator"))?;
        let (name, query) = match rest.split_once('?') {
            Some((name, query)) => (name, query),
            None => (rest, ""),
        };

        let mut cfg = Self {
            name: name.to_string(),
            frames: None,
            fps: DEFAULT_FPS,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        };

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| PipelineError::source_unavailable(locator, "malformed query"))?;
            let bad = || {
                PipelineError::source_unavailable(locator, format!("bad value for {}", key))
            };
            match key {
                "frames" => cfg.frames = Some(value.parse().map_err(|_| bad())?),
                "fps" => cfg.fps = value.parse().map_err(|_| bad())?,
                "width" => cfg.width = value.parse().map_err(|_| bad())?,
                "height" => cfg.height = value.parse().map_err(|_| bad())?,
                other => {
                    return Err(PipelineError::source_unavailable(
                        locator,
                        format!("unknown option '{}'", other),
                    ))
                }
            }
        }

        if cfg.width == 0 || cfg.height == 0 {
            return Err(PipelineError::source_unavailable(locator, "zero frame size"));
        }
        if !(cfg.fps.is_finite() && cfg.fps > 0.0) {
            return Err(PipelineError::source_unavailable(locator, "fps must be positive"));
        }
        Ok(cfg)
    }
}

pub(crate) struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
}

impl SyntheticSource {
    pub(crate) fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    pub(crate) fn fps(&self) -> f64 {
        self.config.fps
    }

    pub(crate) fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    pub(crate) fn next_frame(&mut self) -> Option<Frame> {
        if self
            .config
            .frames
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return None;
        }
        let index = self.frame_count;
        self.frame_count += 1;
        Some(Frame::new(index, self.render(index)))
    }

    fn render(&self, index: u64) -> RgbImage {
        let (width, height) = (self.config.width, self.config.height);
        let mut image = RgbImage::from_fn(width, height, |x, y| {
            let shade = ((x * 200) / width.max(1)) as u8;
            Rgb([shade, shade / 2, ((y * 120) / height.max(1)) as u8])
        });

        let plate_w = PLATE_WIDTH.min(width);
        let plate_h = PLATE_HEIGHT.min(height);
        let travel = (width - plate_w).max(1) as u64;
        let x0 = ((index * 8) % travel) as u32;
        let y0 = (height - plate_h) / 2;
        for y in y0..y0 + plate_h {
            for x in x0..x0 + plate_w {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_options() {
        let cfg = SyntheticConfig::parse("stub://gate?frames=5&fps=30&width=64&height=48").unwrap();
        assert_eq!(cfg.name, "gate");
        assert_eq!(cfg.frames, Some(5));
        assert_eq!(cfg.fps, 30.0);
        assert_eq!((cfg.width, cfg.height), (64, 48));
    }

    #[test]
    fn rejects_unknown_options() {
        let err = SyntheticConfig::parse("stub://gate?color=red").unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[test]
    fn finite_source_ends() {
        let cfg = SyntheticConfig::parse("stub://gate?frames=2&width=160&height=40").unwrap();
        let mut source = SyntheticSource::new(cfg);
        let first = source.next_frame().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.width(), 160);
        assert_eq!(source.next_frame().unwrap().index, 1);
        assert!(source.next_frame().is_none());
        assert_eq!(source.frames_captured(), 2);
    }

    #[test]
    fn frames_contain_white_plate() {
        let cfg = SyntheticConfig::parse("stub://gate?frames=1&width=200&height=100").unwrap();
        let frame = SyntheticSource::new(cfg).next_frame().unwrap();
        let white = frame
            .image()
            .pixels()
            .filter(|p| p.0 == [255, 255, 255])
            .count();
        assert_eq!(white, (PLATE_WIDTH * PLATE_HEIGHT) as usize);
    }
}
