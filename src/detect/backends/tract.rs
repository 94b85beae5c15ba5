#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, RawDetection};
use crate::detect::tracker::IouTracker;
use crate::frame::Frame;

/// Tract-based backend for YOLOv8-style ONNX detectors.
///
/// The model takes a `[1, 3, size, size]` RGB tensor in `0..1` and produces
/// `[1, 4 + classes, anchors]` (centre-x, centre-y, width, height, then one
/// score per class). Frames are stretched to the model input and boxes scaled
/// back to frame coordinates.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
    tracker: IouTracker,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            tracker: IouTracker::default(),
        })
    }

    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.confidence_threshold = confidence;
        self.iou_threshold = iou;
        self
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let side = self.input_size;
        let resized = imageops::resize(frame.image(), side, side, FilterType::Triangle);
        let side = side as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            resized.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0
        });
        input.into_tensor()
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
            return Err(anyhow!("unexpected YOLO output shape {:?}", shape));
        }
        let classes = shape[1] - 4;
        let anchors = shape[2];
        let sx = frame.width() as f32 / self.input_size as f32;
        let sy = frame.height() as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let mut best = (0usize, f32::NEG_INFINITY);
            for c in 0..classes {
                let score = view[[0, 4 + c, a]];
                if score > best.1 {
                    best = (c, score);
                }
            }
            if best.1 < self.confidence_threshold {
                continue;
            }
            let (cx, cy, w, h) = (
                view[[0, 0, a]],
                view[[0, 1, a]],
                view[[0, 2, a]],
                view[[0, 3, a]],
            );
            let xyxy = [
                ((cx - w / 2.0) * sx).max(0.0),
                ((cy - h / 2.0) * sy).max(0.0),
                ((cx + w / 2.0) * sx).min(frame.width() as f32),
                ((cy + h / 2.0) * sy).min(frame.height() as f32),
            ];
            candidates.push(RawDetection::new(best.0, xyxy, best.1));
        }
        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

/// Per-class greedy NMS, highest confidence first.
pub(crate) fn non_max_suppression(
    mut candidates: Vec<RawDetection>,
    iou_threshold: f32,
) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<(RawDetection, BoundingBox)> = Vec::new();
    for candidate in candidates {
        let Some(bbox) = BoundingBox::from_xyxy(candidate.xyxy) else {
            continue;
        };
        let suppressed = kept.iter().any(|(k, kb)| {
            k.class_id == candidate.class_id && kb.iou(&bbox) > iou_threshold
        });
        if !suppressed {
            kept.push((candidate, bbox));
        }
    }
    kept.into_iter().map(|(d, _)| d).collect()
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let mut detections = self.decode(outputs, frame)?;
        self.tracker.update(&mut detections);
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_suppresses_same_class_overlaps_only() {
        let kept = non_max_suppression(
            vec![
                RawDetection::new(1, [0.0, 0.0, 10.0, 10.0], 0.6),
                RawDetection::new(1, [1.0, 0.0, 11.0, 10.0], 0.9),
                RawDetection::new(0, [1.0, 0.0, 11.0, 10.0], 0.7),
            ],
            0.45,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].class_id, 0);
    }
}
