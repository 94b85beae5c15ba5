//! Frame annotation: boxes, labels and track trails.
//!
//! Plate classes are drawn white, everything else green. Labels use the
//! configured font, falling back to the bundled DejaVu Sans Mono.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::config::StreamConfig;
use crate::detect::Detection;

pub const PLATE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const OBJECT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const BOX_THICKNESS: u32 = 2;
const LABEL_SCALE: f32 = 16.0;

static BUNDLED_FONT: &[u8] = include_bytes!("../assets/font/DejaVuSansMono.ttf");

pub struct Overlay {
    plate_classes: Vec<String>,
    font: Option<FontArc>,
}

impl Overlay {
    pub fn new(plate_classes: Vec<String>) -> Self {
        Self {
            plate_classes,
            font: None,
        }
    }

    /// Overlay for a stream config. Without a usable `font_path` the bundled
    /// font is used.
    pub fn from_config(config: &StreamConfig) -> Self {
        let overlay = Self::new(config.plate_classes.clone());
        match &config.font_path {
            Some(path) => match overlay.with_font_file(path) {
                Ok(overlay) => overlay,
                Err(e) => {
                    log::warn!("overlay: {:#}; using bundled font", e);
                    Self::new(config.plate_classes.clone()).with_bundled_font()
                }
            },
            None => overlay.with_bundled_font(),
        }
    }

    pub fn with_font_file(mut self, path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| anyhow::anyhow!("invalid font {}: {}", path.display(), e))?;
        self.font = Some(font);
        Ok(self)
    }

    pub fn with_bundled_font(mut self) -> Self {
        match FontArc::try_from_slice(BUNDLED_FONT) {
            Ok(font) => self.font = Some(font),
            Err(e) => log::warn!("overlay: bundled font: {}; labels disabled", e),
        }
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn is_plate(&self, class_name: &str) -> bool {
        self.plate_classes.iter().any(|c| c == class_name)
    }

    pub fn color_for(&self, class_name: &str) -> Rgb<u8> {
        if self.is_plate(class_name) {
            PLATE_COLOR
        } else {
            OBJECT_COLOR
        }
    }

    /// Draw the box and, when a font is loaded, `"{class} {conf:.2}"` plus any
    /// recognized text above it.
    pub fn draw_detection(&self, image: &mut RgbImage, detection: &Detection, text: Option<&str>) {
        let color = self.color_for(&detection.class_name);
        let bbox = &detection.bbox;
        // Edges past the image are invisible; pulling them in to just outside
        // the border leaves the visible drawing unchanged.
        let margin = BOX_THICKNESS as i64 + 1;
        let clip = |v: i32, max: u32| (v as i64).clamp(-margin, max as i64 + margin) as i32;
        let (x1, x2) = (clip(bbox.x1, image.width()), clip(bbox.x2, image.width()));
        let (y1, y2) = (clip(bbox.y1, image.height()), clip(bbox.y2, image.height()));
        if x2 <= x1 || y2 <= y1 {
            return;
        }
        let (mut w, mut h) = ((x2 - x1) as u32, (y2 - y1) as u32);
        let (mut x, mut y) = (x1, y1);
        for _ in 0..BOX_THICKNESS {
            if w == 0 || h == 0 {
                break;
            }
            draw_hollow_rect_mut(image, Rect::at(x, y).of_size(w, h), color);
            x += 1;
            y += 1;
            w = w.saturating_sub(2);
            h = h.saturating_sub(2);
        }

        if let Some(font) = &self.font {
            let mut label = format!("{} {:.2}", detection.class_name, detection.confidence);
            if let Some(text) = text.filter(|t| !t.is_empty()) {
                label.push(' ');
                label.push_str(text);
            }
            let label_y = (y1 - LABEL_SCALE as i32 - 4).max(0);
            draw_text_mut(
                image,
                color,
                x1.max(0),
                label_y,
                PxScale::from(LABEL_SCALE),
                font,
                &label,
            );
        }
    }

    pub fn draw_trail(&self, image: &mut RgbImage, trail: &[(i32, i32)], color: Rgb<u8>) {
        for pair in trail.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            draw_line_segment_mut(
                image,
                (a.0 as f32, a.1 as f32),
                (b.0 as f32, b.1 as f32),
                color,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn detection(class_name: &str) -> Detection {
        Detection {
            class_name: class_name.to_string(),
            bbox: BoundingBox::new(10, 10, 30, 20).unwrap(),
            confidence: 0.9,
            track_id: Some(1),
        }
    }

    #[test]
    fn draws_two_pixel_boxes_in_class_colours() {
        let overlay = Overlay::new(vec!["plate".to_string()]);
        let mut image = RgbImage::new(50, 40);
        overlay.draw_detection(&mut image, &detection("plate"), Some("AB1234 RU"));
        assert_eq!(*image.get_pixel(10, 10), PLATE_COLOR);
        assert_eq!(*image.get_pixel(11, 11), PLATE_COLOR);
        assert_eq!(*image.get_pixel(15, 15), Rgb([0, 0, 0]));

        overlay.draw_detection(&mut image, &detection("vehicle"), None);
        assert_eq!(*image.get_pixel(10, 10), OBJECT_COLOR);
    }

    #[test]
    fn trail_connects_points() {
        let overlay = Overlay::new(vec![]);
        let mut image = RgbImage::new(20, 20);
        overlay.draw_trail(&mut image, &[(2, 5), (12, 5)], OBJECT_COLOR);
        assert_eq!(*image.get_pixel(7, 5), OBJECT_COLOR);
    }

    #[test]
    fn extreme_boxes_draw_only_visible_edges() {
        let overlay = Overlay::new(vec!["plate".to_string()]);
        let mut image = RgbImage::new(40, 30);
        let mut far = detection("plate");
        far.bbox = BoundingBox::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX).unwrap();
        overlay.draw_detection(&mut image, &far, None);
        assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));

        let mut wide = detection("plate");
        wide.bbox = BoundingBox::from_xyxy([-2.0e9, 5.0, 2.0e9, 15.0]).unwrap();
        overlay.draw_detection(&mut image, &wide, None);
        assert_eq!(*image.get_pixel(20, 5), PLATE_COLOR);
        assert_eq!(*image.get_pixel(20, 14), PLATE_COLOR);
        assert_eq!(*image.get_pixel(0, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn labels_fall_back_to_bundled_font() {
        let config = StreamConfig {
            font_path: Some("/no/such/font.ttf".into()),
            ..StreamConfig::default()
        };
        assert!(Overlay::from_config(&config).has_font());
        assert!(Overlay::from_config(&StreamConfig::default()).has_font());
        assert!(!Overlay::new(vec![]).has_font());

        let overlay = Overlay::new(vec!["plate".to_string()]).with_bundled_font();
        let mut image = RgbImage::new(120, 60);
        let mut plate = detection("plate");
        plate.bbox = BoundingBox::new(10, 30, 100, 50).unwrap();
        overlay.draw_detection(&mut image, &plate, Some("AB1234 RU"));
        // Label sits above the box.
        assert!((0..28).any(|y| (0..120).any(|x| *image.get_pixel(x, y) != Rgb([0, 0, 0]))));
    }
}
