use std::borrow::Cow;

use crate::annotate::{draw_rect, draw_text, text_height, RED, YELLOW};
use crate::frame::Frame;

/// Boxes covering at least this share of the frame are drawn as large.
const LARGE_AREA_FRACTION: f32 = 0.1;

/// Result of running detection on a frame.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    /// Bounding boxes (normalized 0..1 coordinates).
    pub detections: Vec<Detection>,
    /// Confidence of primary detection.
    pub confidence: f32,
}

#[derive(Clone, Debug)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub confidence: f32,
    /// Model class index, when the backend classifies.
    pub class_id: Option<usize>,
    pub label: Cow<'static, str>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SizeClass {
    #[default]
    Unknown,
    Small,
    Large,
}

impl Detection {
    pub fn size_class(&self) -> SizeClass {
        if self.w <= 0.0 || self.h <= 0.0 {
            SizeClass::Unknown
        } else if self.w * self.h >= LARGE_AREA_FRACTION {
            SizeClass::Large
        } else {
            SizeClass::Small
        }
    }

    /// Pixel rectangle (x, y, w, h) for a frame of the given size.
    pub fn to_pixels(&self, width: u32, height: u32) -> (i64, i64, i64, i64) {
        let fw = width as f32;
        let fh = height as f32;
        (
            (self.x.clamp(0.0, 1.0) * fw).round() as i64,
            (self.y.clamp(0.0, 1.0) * fh).round() as i64,
            (self.w.clamp(0.0, 1.0) * fw).round() as i64,
            (self.h.clamp(0.0, 1.0) * fh).round() as i64,
        )
    }
}

impl DetectionResult {
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Draw every detection at or above `conf` onto the frame.
    pub fn draw_onto(&self, frame: &mut Frame, conf: f32) {
        let (width, height) = frame.dimensions();
        for det in self.detections.iter().filter(|d| d.confidence >= conf) {
            let color = match det.size_class() {
                SizeClass::Large => RED,
                _ => YELLOW,
            };
            let (x, y, w, h) = det.to_pixels(width, height);
            draw_rect(frame, x, y, w, h, 2, color);
            let label = format!("{} {:.0}%", det.label, det.confidence * 100.0);
            let label_y = (y - text_height(2) - 2).max(0);
            draw_text(frame, x, label_y, 2, color, &label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(w: f32, h: f32, confidence: f32) -> Detection {
        Detection {
            x: 0.25,
            y: 0.25,
            w,
            h,
            confidence,
            class_id: None,
            label: "motion".into(),
        }
    }

    #[test]
    fn size_class_follows_area() {
        assert_eq!(det(0.5, 0.5, 1.0).size_class(), SizeClass::Large);
        assert_eq!(det(0.1, 0.1, 1.0).size_class(), SizeClass::Small);
        assert_eq!(det(0.0, 0.5, 1.0).size_class(), SizeClass::Unknown);
    }

    #[test]
    fn draw_skips_low_confidence() {
        let mut frame = Frame::solid(40, 40, [0, 0, 0]);
        let result = DetectionResult {
            detections: vec![det(0.5, 0.5, 0.2)],
            confidence: 0.2,
        };
        result.draw_onto(&mut frame, 0.5);
        assert!(frame.pixels().iter().all(|&b| b == 0));

        result.draw_onto(&mut frame, 0.1);
        assert!(frame.pixels().iter().any(|&b| b != 0));
    }

    #[test]
    fn to_pixels_scales_and_clamps() {
        let d = Detection {
            x: -0.5,
            y: 0.5,
            w: 2.0,
            h: 0.25,
            confidence: 1.0,
            class_id: None,
            label: "x".into(),
        };
        assert_eq!(d.to_pixels(100, 40), (0, 20, 100, 10));
    }
}
