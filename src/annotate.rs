//! Drawing primitives used for detector annotations and the diagnostics overlay.
//!
//! Text uses a built-in 5x7 bitmap font covering digits, upper-case Latin
//! letters and a little punctuation. Lower-case input is folded to upper case;
//! characters without a glyph are drawn as blanks.

use chrono::Local;

use crate::frame::Frame;

pub const GREEN: [u8; 3] = [0, 255, 0];
pub const WHITE: [u8; 3] = [255, 255, 255];
pub const RED: [u8; 3] = [255, 0, 0];
pub const YELLOW: [u8; 3] = [255, 220, 0];

const GLYPH_WIDTH: i64 = 5;
const GLYPH_HEIGHT: i64 = 7;
/// Horizontal advance in font units (glyph plus one column of spacing).
const GLYPH_ADVANCE: i64 = 6;

fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '%' => [0b11000, 0b11001, 0b00010, 0b00100, 0b01000, 0b10011, 0b00011],
        _ => [0; 7],
    }
}

/// Draw `text` with its top-left corner at (`x`, `y`). Pixels outside the frame are clipped.
pub fn draw_text(frame: &mut Frame, x: i64, y: i64, scale: u32, rgb: [u8; 3], text: &str) {
    let scale = scale.max(1) as i64;
    let mut pen_x = x;
    for c in text.chars() {
        let rows = glyph(c);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let px = pen_x + col * scale;
                let py = y + row as i64 * scale;
                fill_block(frame, px, py, scale, rgb);
            }
        }
        pen_x += GLYPH_ADVANCE * scale;
    }
}

/// Pixel height of a text line at `scale`.
pub fn text_height(scale: u32) -> i64 {
    GLYPH_HEIGHT * scale.max(1) as i64
}

/// Draw an unfilled rectangle of the given stroke thickness.
pub fn draw_rect(
    frame: &mut Frame,
    x: i64,
    y: i64,
    w: i64,
    h: i64,
    thickness: u32,
    rgb: [u8; 3],
) {
    if w <= 0 || h <= 0 {
        return;
    }
    let t = (thickness.max(1) as i64).min(w).min(h);
    for dy in 0..h {
        for dx in 0..w {
            let on_edge = dx < t || dy < t || dx >= w - t || dy >= h - t;
            if on_edge {
                frame.put_pixel(x + dx, y + dy, rgb);
            }
        }
    }
}

fn fill_block(frame: &mut Frame, x: i64, y: i64, size: i64, rgb: [u8; 3]) {
    for dy in 0..size {
        for dx in 0..size {
            frame.put_pixel(x + dx, y + dy, rgb);
        }
    }
}

/// The three diagnostic labels stamped on every processed frame when enabled:
/// processing rate, target output rate, and local wall-clock time.
#[derive(Clone, Debug)]
pub struct DiagnosticsOverlay {
    output_fps: f64,
}

impl DiagnosticsOverlay {
    pub fn new(output_fps: f64) -> Self {
        Self { output_fps }
    }

    pub fn processing_label(processing_fps: f64) -> String {
        format!("PROC FPS: {:.1}", processing_fps)
    }

    pub fn output_label(output_fps: f64) -> String {
        format!("OUT FPS: {:.1}", output_fps)
    }

    pub fn timestamp_label() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn draw(&self, frame: &mut Frame, processing_fps: f64) {
        draw_text(frame, 20, 19, 3, GREEN, &Self::processing_label(processing_fps));
        draw_text(
            frame,
            20,
            66,
            2,
            WHITE,
            &Self::output_label(self.output_fps),
        );
        draw_text(frame, 20, 106, 2, WHITE, &Self::timestamp_label());
    }
}
