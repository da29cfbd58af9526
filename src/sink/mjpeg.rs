use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{check_frame_size, FrameSink};
use crate::frame::Frame;

const JPEG_QUALITY: u8 = 85;

/// Motion-JPEG stream: each frame is appended as a complete JPEG image.
///
/// Playable with `ffplay -f mjpeg <file>`.
pub struct MjpegSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    frame_size: (u32, u32),
    frames: u64,
}

impl MjpegSink {
    pub fn create(path: &Path, frame_size: (u32, u32)) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to open MJPEG output {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            frame_size,
            frames: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }
}

impl FrameSink for MjpegSink {
    fn name(&self) -> &'static str {
        "mjpeg"
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        check_frame_size(self.name(), frame, self.frame_size)?;
        let writer = self
            .writer
            .as_mut()
            .with_context(|| format!("MJPEG output {} already released", self.path.display()))?;
        JpegEncoder::new_with_quality(&mut *writer, JPEG_QUALITY)
            .encode(
                frame.pixels(),
                frame.width(),
                frame.height(),
                ExtendedColorType::Rgb8,
            )
            .with_context(|| format!("failed to encode frame {}", frame.sequence()))?;
        self.frames += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("failed to flush {}", self.path.display()))?;
            log::debug!("{}: {} frames", self.path.display(), self.frames);
        }
        Ok(())
    }
}
