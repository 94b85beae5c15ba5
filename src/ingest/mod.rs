//! Frame ingestion sources.
//!
//! This module provides the sources a stream worker pulls frames from:
//! - Local video files and network streams (feature: ingest-ffmpeg)
//! - Synthetic `stub://` sources (testing, demos)
//!
//! Every source is owned by exactly one worker. The worker opens it, reads until
//! end-of-stream or cancellation, and always releases it on exit.

mod synthetic;
pub mod video;
#[cfg(feature = "ingest-ffmpeg")]
pub(crate) mod video_ffmpeg;

pub use synthetic::SyntheticConfig;
pub use video::{VideoSource, VideoStats};

use crate::error::PipelineResult;
use crate::frame::Frame;

/// A pull-based frame source.
///
/// `open` failing is fatal to the worker (`PipelineError::SourceUnavailable`).
/// `read_frame` returns `Ok(None)` at end of stream; `PipelineError::Decode` means
/// "skip this frame and keep reading".
pub trait FrameSource: Send {
    /// Locator used for logs and reports.
    fn locator(&self) -> &str;

    fn open(&mut self) -> PipelineResult<()>;

    fn read_frame(&mut self) -> PipelineResult<Option<Frame>>;

    /// Nominal frame rate reported by the source, if known.
    fn nominal_fps(&self) -> Option<f64>;

    /// Release the underlying capture handle. Must be idempotent.
    fn release(&mut self);
}
