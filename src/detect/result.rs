/// Coordinates from detectors are clamped to `[-COORD_LIMIT, COORD_LIMIT]`.
pub const COORD_LIMIT: i32 = 1 << 20;

/// Axis-aligned box in pixel coordinates. Always satisfies `x1 < x2` and `y1 < y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Returns `None` for degenerate boxes.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Self> {
        if x1 < x2 && y1 < y2 {
            Some(Self { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    /// Build from float corners, truncating toward zero like an integer cast.
    /// Corners beyond `COORD_LIMIT` are clamped, so a box lying entirely past
    /// the limit collapses and is rejected.
    pub fn from_xyxy(xyxy: [f32; 4]) -> Option<Self> {
        if xyxy.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let limit = COORD_LIMIT as f32;
        let [x1, y1, x2, y2] = xyxy.map(|v| v.clamp(-limit, limit) as i32);
        Self::new(x1, y1, x2, y2)
    }

    pub fn width(&self) -> u32 {
        (self.x2 as i64 - self.x1 as i64) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 as i64 - self.y1 as i64) as u32
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Integer centre point, used as the track centroid.
    pub fn centroid(&self) -> (i32, i32) {
        let mid = |a: i32, b: i32| ((a as i64 + b as i64) / 2) as i32;
        (mid(self.x1, self.x2), mid(self.y1, self.y2))
    }

    /// Intersection over union, in `[0, 1]`.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        if ix1 >= ix2 || iy1 >= iy2 {
            return 0.0;
        }
        let inter = (ix2 as f64 - ix1 as f64) * (iy2 as f64 - iy1 as f64);
        let union = self.area() as f64 + other.area() as f64 - inter;
        if union <= 0.0 {
            0.0
        } else {
            (inter / union) as f32
        }
    }
}

/// A typed detection for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_name: String,
    pub bbox: BoundingBox,
    /// Always within `[0, 1]`.
    pub confidence: f32,
    pub track_id: Option<u32>,
}

/// Backend output before validation: class index, float corners, optional
/// tracker id (negative means "untracked").
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub xyxy: [f32; 4],
    pub confidence: f32,
    pub track_id: Option<i64>,
}

impl RawDetection {
    pub fn new(class_id: usize, xyxy: [f32; 4], confidence: f32) -> Self {
        Self {
            class_id,
            xyxy,
            confidence,
            track_id: None,
        }
    }

    pub fn with_track(mut self, track_id: i64) -> Self {
        self.track_id = Some(track_id);
        self
    }
}

/// Detector label set: class index to class name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, class_id: usize) -> String {
        match self.names.get(class_id) {
            Some(name) => name.clone(),
            None => format!("class_{}", class_id),
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::new(["vehicle", "plate"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_boxes_are_rejected() {
        assert!(BoundingBox::new(10, 10, 10, 20).is_none());
        assert!(BoundingBox::new(10, 20, 30, 5).is_none());
        assert!(BoundingBox::from_xyxy([0.0, 0.0, f32::NAN, 4.0]).is_none());
        assert!(BoundingBox::from_xyxy([1.9, 2.2, 10.7, 8.1]).is_some());
    }

    #[test]
    fn iou_and_centroid() {
        let a = BoundingBox::new(0, 0, 10, 10).unwrap();
        let b = BoundingBox::new(5, 0, 15, 10).unwrap();
        let c = BoundingBox::new(20, 20, 30, 30).unwrap();
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&c), 0.0);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(b.centroid(), (10, 5));
    }

    #[test]
    fn extreme_corners_are_clamped_without_overflow() {
        assert!(BoundingBox::from_xyxy([2.0e9, 0.0, 2.1e9, 10.0]).is_none());

        let wide = BoundingBox::from_xyxy([-2.0e9, 0.0, 2.0e9, 10.0]).unwrap();
        assert_eq!((wide.x1, wide.x2), (-COORD_LIMIT, COORD_LIMIT));
        assert_eq!(wide.width(), 2 * COORD_LIMIT as u32);
        assert_eq!(wide.centroid(), (0, 5));

        let full = BoundingBox::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX).unwrap();
        assert_eq!(full.width(), u32::MAX);
        assert_eq!(full.centroid(), (0, 0));
        assert_eq!(full.iou(&full), 1.0);
    }

    #[test]
    fn unknown_class_ids_get_placeholder_names() {
        let labels = LabelSet::default();
        assert_eq!(labels.name(1), "plate");
        assert_eq!(labels.name(7), "class_7");
        assert_eq!(labels.index_of("vehicle"), Some(0));
    }
}
