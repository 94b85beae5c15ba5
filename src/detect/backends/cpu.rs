use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::detect::tracker::IouTracker;
use crate::frame::Frame;

const BRIGHT_THRESHOLD: u8 = 240;
const MIN_AREA: u64 = 64;

/// CPU backend that reports the bounding box of near-white pixels as a plate.
///
/// Retroreflective plates saturate under IR illumination; this is also what the
/// synthetic `stub://` source draws. Track ids come from an `IouTracker`.
pub struct CpuBackend {
    plate_class: usize,
    tracker: IouTracker,
}

impl CpuBackend {
    pub fn new(plate_class: usize) -> Self {
        Self {
            plate_class,
            tracker: IouTracker::default(),
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new(1)
    }
}

impl DetectorBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        let mut count = 0u64;
        for (x, y, pixel) in frame.image().enumerate_pixels() {
            if pixel.0.iter().all(|c| *c >= BRIGHT_THRESHOLD) {
                count += 1;
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x1, y1, x2, y2)) => (x1.min(x), y1.min(y), x2.max(x), y2.max(y)),
                });
            }
        }

        let mut detections = Vec::new();
        if let Some((x1, y1, x2, y2)) = bounds {
            if count >= MIN_AREA {
                let fill = count as f32 / ((x2 - x1 + 1) as f32 * (y2 - y1 + 1) as f32);
                detections.push(RawDetection::new(
                    self.plate_class,
                    [x1 as f32, y1 as f32, (x2 + 1) as f32, (y2 + 1) as f32],
                    fill.min(1.0),
                ));
            }
        }
        self.tracker.update(&mut detections);
        Ok(detections)
    }
}
