//! Video source selected by locator.
//!
//! - `stub://...` locators produce synthetic frames (see `SyntheticConfig`)
//! - anything else is decoded with FFmpeg (feature: ingest-ffmpeg): local files,
//!   `rtsp://`, `http://` and other URLs FFmpeg understands
//!
//! Nothing is opened until `open()`; a failed open is reported as
//! `PipelineError::SourceUnavailable`.

use std::path::Path;

use super::synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-ffmpeg")]
use super::video_ffmpeg::FfmpegVideoSource;
use super::FrameSource;
use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;

pub struct VideoSource {
    locator: String,
    backend: Option<VideoBackend>,
}

enum VideoBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-ffmpeg")]
    Ffmpeg(FfmpegVideoSource),
}

/// Statistics for a video source.
#[derive(Clone, Debug)]
pub struct VideoStats {
    pub frames_captured: u64,
    pub locator: String,
    pub open: bool,
}

impl VideoSource {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            backend: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    pub fn stats(&self) -> VideoStats {
        let frames_captured = match &self.backend {
            Some(VideoBackend::Synthetic(source)) => source.frames_captured(),
            #[cfg(feature = "ingest-ffmpeg")]
            Some(VideoBackend::Ffmpeg(source)) => source.frames_captured(),
            None => 0,
        };
        VideoStats {
            frames_captured,
            locator: self.locator.clone(),
            open: self.is_open(),
        }
    }

    fn open_backend(&self) -> PipelineResult<VideoBackend> {
        if self.locator.trim().is_empty() {
            return Err(PipelineError::source_unavailable(&self.locator, "empty locator"));
        }
        if self.locator.starts_with("stub://") {
            let config = SyntheticConfig::parse(&self.locator)?;
            log::info!("VideoSource: opened {} (synthetic)", self.locator);
            return Ok(VideoBackend::Synthetic(SyntheticSource::new(config)));
        }
        if is_local_path(&self.locator) && !Path::new(&self.locator).exists() {
            return Err(PipelineError::source_unavailable(&self.locator, "no such file"));
        }

        #[cfg(feature = "ingest-ffmpeg")]
        {
            let source = FfmpegVideoSource::open(&self.locator)
                .map_err(|e| PipelineError::source_unavailable(&self.locator, format!("{:#}", e)))?;
            log::info!("VideoSource: opened {} (ffmpeg)", self.locator);
            Ok(VideoBackend::Ffmpeg(source))
        }
        #[cfg(not(feature = "ingest-ffmpeg"))]
        {
            Err(PipelineError::source_unavailable(
                &self.locator,
                "video decoding requires the ingest-ffmpeg feature",
            ))
        }
    }
}

impl FrameSource for VideoSource {
    fn locator(&self) -> &str {
        &self.locator
    }

    fn open(&mut self) -> PipelineResult<()> {
        if self.backend.is_none() {
            self.backend = Some(self.open_backend()?);
        }
        Ok(())
    }

    fn read_frame(&mut self) -> PipelineResult<Option<Frame>> {
        match &mut self.backend {
            Some(VideoBackend::Synthetic(source)) => Ok(source.next_frame()),
            #[cfg(feature = "ingest-ffmpeg")]
            Some(VideoBackend::Ffmpeg(source)) => source.next_frame(),
            None => Err(PipelineError::Decode(format!(
                "{} read before open",
                self.locator
            ))),
        }
    }

    fn nominal_fps(&self) -> Option<f64> {
        match &self.backend {
            Some(VideoBackend::Synthetic(source)) => Some(source.fps()),
            #[cfg(feature = "ingest-ffmpeg")]
            Some(VideoBackend::Ffmpeg(source)) => source.fps(),
            None => None,
        }
    }

    fn release(&mut self) {
        if self.backend.take().is_some() {
            log::info!("VideoSource: released {}", self.locator);
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.release();
    }
}

fn is_local_path(locator: &str) -> bool {
    !locator.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_unavailable() {
        let mut source = VideoSource::new("/definitely/not/here.mp4");
        let err = source.open().unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
        assert!(!source.is_open());
    }

    #[test]
    fn empty_locator_is_unavailable() {
        let mut source = VideoSource::new("  ");
        assert!(source.open().is_err());
    }

    #[test]
    fn synthetic_source_reads_and_releases() {
        let mut source = VideoSource::new("stub://lane?frames=3&fps=15&width=160&height=40");
        source.open().unwrap();
        assert_eq!(source.nominal_fps(), Some(15.0));

        let mut count = 0;
        while let Some(frame) = source.read_frame().unwrap() {
            assert_eq!(frame.index, count);
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(source.stats().frames_captured, 3);

        source.release();
        assert!(!source.is_open());
        source.release();
    }

    #[test]
    fn read_before_open_is_decode_error() {
        let mut source = VideoSource::new("stub://lane");
        assert!(matches!(
            source.read_frame().unwrap_err(),
            PipelineError::Decode(_)
        ));
    }
}
