//! Persistent track ids for detectors that do not track on their own.
//!
//! Association is greedy by IoU within each class: the best-overlapping pair is
//! matched first. Unmatched detections open new tracks; tracks unseen for
//! `max_missed` frames are dropped. Ids are never reused.

use crate::detect::result::{BoundingBox, RawDetection};

pub const DEFAULT_IOU_THRESHOLD: f32 = 0.3;
pub const DEFAULT_MAX_MISSED: u32 = 30;

#[derive(Clone, Debug)]
struct TrackedObject {
    id: i64,
    class_id: usize,
    bbox: BoundingBox,
    missed: u32,
}

#[derive(Debug)]
pub struct IouTracker {
    iou_threshold: f32,
    max_missed: u32,
    next_id: i64,
    tracks: Vec<TrackedObject>,
}

impl IouTracker {
    pub fn new(iou_threshold: f32, max_missed: u32) -> Self {
        Self {
            iou_threshold,
            max_missed,
            next_id: 1,
            tracks: Vec::new(),
        }
    }

    pub fn active_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Assign `track_id` on every detection with a valid box. Detections that
    /// already carry an id are left untouched.
    pub fn update(&mut self, detections: &mut [RawDetection]) {
        let boxes: Vec<Option<BoundingBox>> = detections
            .iter()
            .map(|d| BoundingBox::from_xyxy(d.xyxy))
            .collect();

        let mut candidates = Vec::new();
        for (det_idx, det) in detections.iter().enumerate() {
            let Some(det_box) = boxes[det_idx] else {
                continue;
            };
            if det.track_id.is_some() {
                continue;
            }
            for (track_idx, track) in self.tracks.iter().enumerate() {
                if track.class_id != det.class_id {
                    continue;
                }
                let iou = track.bbox.iou(&det_box);
                if iou >= self.iou_threshold {
                    candidates.push((iou, det_idx, track_idx));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut det_taken = vec![false; detections.len()];
        let mut track_taken = vec![false; self.tracks.len()];
        for (_, det_idx, track_idx) in candidates {
            if det_taken[det_idx] || track_taken[track_idx] {
                continue;
            }
            det_taken[det_idx] = true;
            track_taken[track_idx] = true;
            let track = &mut self.tracks[track_idx];
            if let Some(det_box) = boxes[det_idx] {
                track.bbox = det_box;
            }
            track.missed = 0;
            detections[det_idx].track_id = Some(track.id);
        }

        for (track_idx, track) in self.tracks.iter_mut().enumerate() {
            if !track_taken[track_idx] {
                track.missed += 1;
            }
        }
        let max_missed = self.max_missed;
        self.tracks.retain(|t| t.missed <= max_missed);

        for (det_idx, det) in detections.iter_mut().enumerate() {
            if det_taken[det_idx] || det.track_id.is_some() {
                continue;
            }
            let Some(det_box) = boxes[det_idx] else {
                continue;
            };
            let id = self.next_id;
            self.next_id += 1;
            det.track_id = Some(id);
            self.tracks.push(TrackedObject {
                id,
                class_id: det.class_id,
                bbox: det_box,
                missed: 0,
            });
        }
    }
}

impl Default for IouTracker {
    fn default() -> Self {
        Self::new(DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_MISSED)
    }
}
