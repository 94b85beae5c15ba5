use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Detector backend trait.
///
/// A backend maps one decoded frame to raw, unvalidated detections. Backends
/// that support tracking keep their track state across calls, so the same
/// physical object retains its id while it stays visible.
///
/// Errors are opaque to the pipeline: `FrameDetectionAdapter` turns them into
/// `PipelineError::Detection`, and the frame proceeds with no detections.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection (and tracking, when supported) on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
