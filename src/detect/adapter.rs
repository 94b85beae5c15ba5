use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection, LabelSet, RawDetection};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;

/// Thin layer between a detector backend and the pipeline.
///
/// Validates backend output into `Detection`s: degenerate boxes are dropped,
/// confidences are clamped to `[0, 1]`, negative track ids mean "untracked" and
/// class indices are resolved through the label set.
pub struct FrameDetectionAdapter {
    backend: Box<dyn DetectorBackend>,
    labels: LabelSet,
}

impl FrameDetectionAdapter {
    pub fn new(backend: Box<dyn DetectorBackend>, labels: LabelSet) -> Self {
        Self { backend, labels }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn warm_up(&mut self) -> PipelineResult<()> {
        self.backend
            .warm_up()
            .map_err(|e| PipelineError::Detection(format!("{:#}", e)))
    }

    pub fn detect_and_track(&mut self, frame: &Frame) -> PipelineResult<Vec<Detection>> {
        if frame.is_empty() {
            return Err(PipelineError::Decode(format!(
                "frame {} is empty",
                frame.index
            )));
        }
        let raw = self
            .backend
            .detect(frame)
            .map_err(|e| PipelineError::Detection(format!("{}: {:#}", self.backend.name(), e)))?;

        let mut detections = Vec::with_capacity(raw.len());
        for item in raw {
            match self.convert(item) {
                Some(detection) => detections.push(detection),
                None => log::debug!(
                    "detect: dropped degenerate box on frame {}",
                    frame.index
                ),
            }
        }
        Ok(detections)
    }

    fn convert(&self, raw: RawDetection) -> Option<Detection> {
        let bbox = BoundingBox::from_xyxy(raw.xyxy)?;
        let confidence = if raw.confidence.is_finite() {
            raw.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let track_id = raw
            .track_id
            .filter(|id| *id >= 0)
            .and_then(|id| u32::try_from(id).ok());
        Some(Detection {
            class_name: self.labels.name(raw.class_id),
            bbox,
            confidence,
            track_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::StubBackend;
    use crate::detect::result::COORD_LIMIT;
    use image::RgbImage;

    fn frame() -> Frame {
        Frame::new(0, RgbImage::new(64, 48))
    }

    #[test]
    fn converts_and_filters_raw_detections() {
        let backend = StubBackend::scripted(vec![vec![
            RawDetection::new(1, [4.0, 4.0, 20.0, 12.0], 1.4).with_track(3),
            RawDetection::new(0, [10.0, 10.0, 10.0, 30.0], 0.9),
            RawDetection::new(5, [0.0, 0.0, 8.0, 8.0], 0.5).with_track(-1),
        ]]);
        let mut adapter = FrameDetectionAdapter::new(Box::new(backend), LabelSet::default());

        let detections = adapter.detect_and_track(&frame()).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].class_name, "plate");
        assert_eq!(detections[0].confidence, 1.0);
        assert_eq!(detections[0].track_id, Some(3));
        assert_eq!(detections[1].class_name, "class_5");
        assert_eq!(detections[1].track_id, None);
    }

    #[test]
    fn far_out_of_frame_boxes_are_bounded() {
        let backend = StubBackend::scripted(vec![vec![
            RawDetection::new(1, [2.0e9, 0.0, 2.1e9, 10.0], 0.9).with_track(1),
            RawDetection::new(1, [-2.0e9, 0.0, 2.0e9, 10.0], 0.9).with_track(2),
        ]]);
        let mut adapter = FrameDetectionAdapter::new(Box::new(backend), LabelSet::default());

        let detections = adapter.detect_and_track(&frame()).unwrap();
        assert_eq!(detections.len(), 1);
        let bbox = detections[0].bbox;
        assert_eq!((bbox.x1, bbox.x2), (-COORD_LIMIT, COORD_LIMIT));
        assert_eq!(bbox.centroid(), (0, 5));
    }

    #[test]
    fn empty_frame_is_a_decode_error() {
        let mut adapter =
            FrameDetectionAdapter::new(Box::new(StubBackend::default()), LabelSet::default());
        let err = adapter
            .detect_and_track(&Frame::new(0, RgbImage::new(0, 0)))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn backend_failure_is_a_detection_error() {
        let mut adapter =
            FrameDetectionAdapter::new(Box::new(StubBackend::failing()), LabelSet::default());
        let err = adapter.detect_and_track(&frame()).unwrap_err();
        assert!(matches!(err, PipelineError::Detection(_)));
        assert!(err.is_frame_local());
    }
}
