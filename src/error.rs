//! Error taxonomy for the streaming pipeline.
//!
//! Every per-frame failure is contained at frame or detection granularity:
//! - `SourceUnavailable` halts the worker that owns the source
//! - `Decode` skips the current frame
//! - `Detection` is treated as "no detections" for the current frame
//! - `EmptyRegion` skips OCR for a single detection
//! - `Config` substitutes defaults and continues
//!
//! Black-box collaborators (detector backends, OCR engines) report `anyhow::Error`;
//! the adapter layer folds those into this enum.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The video source could not be opened. Fatal to the owning worker only.
    #[error("video source unavailable: {locator}: {reason}")]
    SourceUnavailable { locator: String, reason: String },

    /// A frame could not be decoded or was empty.
    #[error("frame decode failed: {0}")]
    Decode(String),

    /// The detection/tracking capability failed for one frame.
    #[error("detection failed: {0}")]
    Detection(String),

    /// The plate box lies outside the frame (or collapses to zero area after clamping).
    #[error("plate region ({x1},{y1})-({x2},{y2}) is empty inside a {width}x{height} frame")]
    EmptyRegion {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        width: u32,
        height: u32,
    },

    /// Configuration was malformed or missing.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn source_unavailable(locator: &str, reason: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable {
            locator: locator.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that only invalidate the current frame.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Detection(_) | Self::EmptyRegion { .. })
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_local_classification() {
        assert!(PipelineError::Decode("truncated".into()).is_frame_local());
        assert!(PipelineError::Detection("model".into()).is_frame_local());
        assert!(!PipelineError::source_unavailable("missing.mp4", "no such file").is_frame_local());
        assert!(!PipelineError::Config("bad yaml".into()).is_frame_local());
    }

    #[test]
    fn source_unavailable_message_names_locator() {
        let err = PipelineError::source_unavailable("rtsp://cam-1", "connection refused");
        assert_eq!(
            err.to_string(),
            "video source unavailable: rtsp://cam-1: connection refused"
        );
    }
}
