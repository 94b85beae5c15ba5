use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Stub backend for testing. Replays a fixed script of per-frame detections.
///
/// Each `detect` call consumes the next script entry; once the script is
/// exhausted every frame yields no detections.
pub struct StubBackend {
    script: VecDeque<Vec<RawDetection>>,
    fail: bool,
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            fail: false,
            calls: 0,
        }
    }

    pub fn scripted(frames: Vec<Vec<RawDetection>>) -> Self {
        Self {
            script: frames.into(),
            fail: false,
            calls: 0,
        }
    }

    /// A backend whose every call fails.
    pub fn failing() -> Self {
        Self {
            script: VecDeque::new(),
            fail: true,
            calls: 0,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        self.calls += 1;
        if self.fail {
            return Err(anyhow!("stub detector failure on frame {}", frame.index));
        }
        Ok(self.script.pop_front().unwrap_or_default())
    }
}
