//! Detection and tracking.
//!
//! The detector itself is a black box behind `DetectorBackend`. Everything the
//! pipeline sees goes through `FrameDetectionAdapter`, which turns raw backend
//! output into validated `Detection`s.

mod adapter;
mod backend;
mod backends;
mod result;
mod tracker;

pub use adapter::FrameDetectionAdapter;
pub use backend::DetectorBackend;
pub use backends::{CpuBackend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection, LabelSet, RawDetection, COORD_LIMIT};
pub use tracker::IouTracker;

use anyhow::{anyhow, Result};

use crate::config::{DetectorSettings, StreamConfig};

/// Build the backend named in the configuration.
pub fn backend_from_config(
    settings: &DetectorSettings,
    labels: &LabelSet,
) -> Result<Box<dyn DetectorBackend>> {
    match settings.backend.as_str() {
        "stub" => Ok(Box::new(StubBackend::new())),
        "cpu" => {
            let plate_class = labels.index_of("plate").unwrap_or(0);
            Ok(Box::new(CpuBackend::new(plate_class)))
        }
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let path = settings
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow!("detector.model_path is required for the tract backend"))?;
            Ok(Box::new(
                TractBackend::new(path, settings.input_size)?
                    .with_thresholds(settings.confidence, settings.iou),
            ))
        }
        other => Err(anyhow!("unknown or disabled detector backend '{}'", other)),
    }
}

/// Build an adapter (backend + label set) for one stream.
pub fn adapter_from_config(config: &StreamConfig) -> Result<FrameDetectionAdapter> {
    let labels = LabelSet::new(config.labels.iter().cloned());
    let backend = backend_from_config(&config.detector, &labels)?;
    log::info!("detect: using {} backend", backend.name());
    Ok(FrameDetectionAdapter::new(backend, labels))
}
