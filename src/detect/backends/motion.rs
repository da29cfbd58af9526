use anyhow::Result;

use crate::detect::backend::{DetectParams, Detector};
use crate::detect::result::{Detection, DetectionResult};
use crate::frame::{Frame, CHANNELS};

const GRID_COLS: usize = 32;
const GRID_ROWS: usize = 24;
/// Mean-luma change (0..255) for a grid cell to count as moving.
const CELL_DELTA: f32 = 12.0;

/// CPU motion detector.
///
/// Each frame is reduced to a coarse grid of mean luma values and compared
/// with the previous frame's grid. Changed cells are merged into one bounding
/// box whose confidence is the share of changed cells inside it, so a compact
/// moving object scores high and scattered sensor noise scores low.
#[derive(Default)]
pub struct MotionDetector {
    previous: Option<LumaGrid>,
}

struct LumaGrid {
    width: u32,
    height: u32,
    cells: Vec<f32>,
}

impl MotionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `frame` with the previous one and remember it for the next call.
    pub fn detect(&mut self, frame: &Frame) -> DetectionResult {
        let grid = LumaGrid::from_frame(frame);
        let result = match &self.previous {
            Some(prev) if prev.width == grid.width && prev.height == grid.height => {
                motion_between(prev, &grid)
            }
            _ => DetectionResult::default(),
        };
        self.previous = Some(grid);
        result
    }
}

impl Detector for MotionDetector {
    fn name(&self) -> &'static str {
        "motion"
    }

    fn predict(&mut self, mut frame: Frame, params: &DetectParams) -> Result<Frame> {
        let result = self.detect(&frame);
        if !result.is_empty() {
            log::debug!(
                "motion in frame {} (confidence {:.2})",
                frame.sequence(),
                result.confidence
            );
        }
        result.draw_onto(&mut frame, params.conf);
        Ok(frame)
    }
}

impl LumaGrid {
    fn from_frame(frame: &Frame) -> Self {
        let (width, height) = frame.dimensions();
        let mut sums = vec![0f32; GRID_COLS * GRID_ROWS];
        let mut counts = vec![0u32; GRID_COLS * GRID_ROWS];
        let w = width as usize;
        let h = height as usize;
        if w > 0 && h > 0 {
            for (i, px) in frame.pixels().chunks_exact(CHANNELS).enumerate() {
                let x = i % w;
                let y = i / w;
                if y >= h {
                    break;
                }
                let cell = (y * GRID_ROWS / h) * GRID_COLS + (x * GRID_COLS / w);
                let luma = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                sums[cell] += luma;
                counts[cell] += 1;
            }
        }
        let cells = sums
            .iter()
            .zip(&counts)
            .map(|(sum, &count)| if count == 0 { 0.0 } else { sum / count as f32 })
            .collect();
        Self {
            width,
            height,
            cells,
        }
    }
}

fn motion_between(prev: &LumaGrid, cur: &LumaGrid) -> DetectionResult {
    let mut changed = 0usize;
    let (mut min_c, mut min_r) = (GRID_COLS, GRID_ROWS);
    let (mut max_c, mut max_r) = (0usize, 0usize);
    for (idx, (a, b)) in prev.cells.iter().zip(&cur.cells).enumerate() {
        if (a - b).abs() < CELL_DELTA {
            continue;
        }
        let (col, row) = (idx % GRID_COLS, idx / GRID_COLS);
        changed += 1;
        min_c = min_c.min(col);
        min_r = min_r.min(row);
        max_c = max_c.max(col);
        max_r = max_r.max(row);
    }
    if changed == 0 {
        return DetectionResult::default();
    }

    let box_cols = max_c - min_c + 1;
    let box_rows = max_r - min_r + 1;
    let confidence = changed as f32 / (box_cols * box_rows) as f32;
    let detection = Detection {
        x: min_c as f32 / GRID_COLS as f32,
        y: min_r as f32 / GRID_ROWS as f32,
        w: box_cols as f32 / GRID_COLS as f32,
        h: box_rows as f32 / GRID_ROWS as f32,
        confidence,
        class_id: None,
        label: "motion".into(),
    };
    DetectionResult {
        detections: vec![detection],
        confidence,
    }
}
