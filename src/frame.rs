//! Frame container.
//!
//! - `Frame`: owned RGB24 pixel buffer. Bytes are private to the crate; callers
//!   read them through `pixels()` and sources build frames through `Frame::new`.
//! - Frames are zeroized on drop so that frames evicted from the hand-off queue
//!   do not linger in freed memory.
//!
//! A frame whose dimensions are zero, or whose buffer length does not match
//! `width * height * 3`, is considered empty. The pipeline skips empty frames
//! instead of treating them as errors.

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use image::RgbImage;
use std::time::{Duration, Instant};
use zeroize::Zeroize;

/// Bytes per pixel for the only supported layout (packed RGB24).
pub const CHANNELS: usize = 3;

/// Owned RGB24 frame. No `Clone`: pixel copies are explicit.
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    /// Arrival order assigned by the source.
    sequence: u64,
    captured_at: Instant,
}

impl Frame {
    /// Wrap a packed RGB24 buffer. The buffer is not validated here; see `is_empty`.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            sequence: 0,
            captured_at: Instant::now(),
        }
    }

    /// A zero-sized frame. Sources may hand these over when decode yields nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, 0)
    }

    /// A frame filled with a single color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixel_count = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixel_count * CHANNELS);
        for _ in 0..pixel_count {
            data.extend_from_slice(&rgb);
        }
        Self::new(data, width, height)
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height)
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Time since the frame was handed to `Frame::new`.
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    /// True for zero-sized frames and for buffers that do not match the dimensions.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.len() != self.expected_len()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Copy the pixels into an `RgbImage`.
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        if self.is_empty() {
            return Err(anyhow!(
                "frame {} is empty ({}x{}, {} bytes)",
                self.sequence,
                self.width,
                self.height,
                self.data.len()
            ));
        }
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame {} buffer does not match its size", self.sequence))
    }

    /// Resize to `width` x `height` with bilinear filtering, keeping the sequence.
    ///
    /// Returns the frame untouched when it already has the requested size.
    pub fn resized(self, width: u32, height: u32) -> Result<Frame> {
        if self.dimensions() == (width, height) {
            return Ok(self);
        }
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot resize to {}x{}", width, height));
        }
        let image = self.to_rgb_image()?;
        let scaled = image::imageops::resize(&image, width, height, FilterType::Triangle);
        let mut out = Frame::from_rgb_image(scaled).with_sequence(self.sequence);
        out.captured_at = self.captured_at;
        Ok(out)
    }

    /// Set one pixel. Out-of-bounds coordinates are ignored.
    pub(crate) fn put_pixel(&mut self, x: i64, y: i64, rgb: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * CHANNELS;
        if let Some(px) = self.data.get_mut(idx..idx + CHANNELS) {
            px.copy_from_slice(&rgb);
        }
    }

    fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * CHANNELS
    }
}

impl std::fmt::Debug for Frame {
    // Pixel content is deliberately left out of debug output.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}
