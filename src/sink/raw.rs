use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{check_frame_size, FrameSink};
use crate::frame::Frame;

/// Headerless rgb24 frame stream.
///
/// Playable with
/// `ffplay -f rawvideo -pixel_format rgb24 -video_size WxH -framerate FPS <file>`.
pub struct RawVideoSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    frame_size: (u32, u32),
    frames: u64,
}

impl RawVideoSink {
    pub fn create(path: &Path, frame_size: (u32, u32), fps: f64) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to open raw video output {}", path.display()))?;
        log::info!(
            "raw output {}: play with ffplay -f rawvideo -pixel_format rgb24 -video_size {}x{} -framerate {:.1}",
            path.display(),
            frame_size.0,
            frame_size.1,
            fps
        );
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

impl FrameSink for RawVideoSink {
    fn name(&self) -> &'static str {
        "rawvideo"
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        check_frame_size(self.name(), frame, self.frame_size)?;
        let writer = self.writer.as_mut().with_context(|| {
            format!("raw video output {} already released", self.path.display())
        })?;
        writer
            .write_all(frame.pixels())
            .with_context(|| format!("failed to write frame {}", frame.sequence()))?;
        self.frames += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("failed to flush {}", self.path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appends_packed_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rgb");
        let mut sink = RawVideoSink::create(&path, (4, 2), 10.0).unwrap();
        for shade in [1u8, 2, 3] {
            sink.write(&Frame::solid(4, 2, [shade, shade, shade])).unwrap();
        }
        sink.release().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 3 * 4 * 2 * 3);
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[bytes.len() - 1], 3);
        assert_eq!(sink.frames_written(), 3);
    }

    #[test]
    fn write_after_release_fails() {
        let dir = tempdir().unwrap();
        let mut sink = RawVideoSink::create(&dir.path().join("out.raw"), (2, 2), 5.0).unwrap();
        sink.release().unwrap();
        assert!(sink.write(&Frame::solid(2, 2, [0, 0, 0])).is_err());
    }
}
