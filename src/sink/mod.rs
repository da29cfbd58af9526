//! Output sinks for annotated frames.
//!
//! A sink is opened at pipeline construction (failure is fatal), written to
//! only by the consumer thread, and released exactly once when the pipeline
//! stops. `SinkGuard` ties the release to scope: if the consumer exits
//! abnormally, dropping the guard still releases the sink.
//!
//! Container selection by output extension:
//! - `.mjpeg` / `.mjpg`: concatenated JPEG stream (`MjpegSink`)
//! - `.rgb` / `.raw`: headerless rgb24 frames (`RawVideoSink`)

mod memory;
mod mjpeg;
mod raw;

use anyhow::{anyhow, Result};
use std::path::Path;

use crate::frame::Frame;

pub use memory::{MemorySink, MemorySinkHandle, WrittenFrame};
pub use mjpeg::MjpegSink;
pub use raw::RawVideoSink;

/// Destination for annotated frames.
pub trait FrameSink: Send {
    /// Sink identifier for logs.
    fn name(&self) -> &'static str;

    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close. Must be idempotent.
    fn release(&mut self) -> Result<()>;
}

/// Open the sink matching the extension of `path`.
pub fn open_sink(path: &Path, frame_size: (u32, u32), fps: f64) -> Result<Box<dyn FrameSink>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let sink: Box<dyn FrameSink> = match ext.as_str() {
        "mjpeg" | "mjpg" => Box::new(MjpegSink::create(path, frame_size)?),
        "rgb" | "raw" => Box::new(RawVideoSink::create(path, frame_size, fps)?),
        _ => {
            return Err(anyhow!(
                "unsupported output container for {} (expected .mjpeg, .mjpg, .rgb or .raw)",
                path.display()
            ))
        }
    };
    log::info!(
        "output sink '{}' opened at {} ({}x{})",
        sink.name(),
        path.display(),
        frame_size.0,
        frame_size.1
    );
    Ok(sink)
}

/// Owns a sink and releases it exactly once, explicitly or on drop.
pub struct SinkGuard {
    sink: Box<dyn FrameSink>,
    released: bool,
}

impl SinkGuard {
    pub fn new(sink: Box<dyn FrameSink>) -> Self {
        Self {
            sink,
            released: false,
        }
    }

    pub fn write(&mut self, frame: &Frame) -> Result<()> {
        if self.released {
            return Err(anyhow!("sink '{}' already released", self.sink.name()));
        }
        self.sink.write(frame)
    }

    /// Release now and report the outcome.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        let result = self.sink.release();
        log::info!("output sink '{}' released", self.sink.name());
        result
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.sink.release() {
            Ok(()) => log::info!("output sink '{}' released on drop", self.sink.name()),
            Err(e) => log::error!("output sink '{}' release failed: {}", self.sink.name(), e),
        }
    }
}

/// Reject frames whose size differs from the size the sink was opened with.
pub(crate) fn check_frame_size(sink: &str, frame: &Frame, expected: (u32, u32)) -> Result<()> {
    if frame.is_empty() {
        return Err(anyhow!("{}: refusing to write empty frame", sink));
    }
    if frame.dimensions() != expected {
        return Err(anyhow!(
            "{}: frame {}x{} does not match output {}x{}",
            sink,
            frame.width(),
            frame.height(),
            expected.0,
            expected.1
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn picks_sink_from_extension() {
        let dir = tempdir().unwrap();
        let mut sink = open_sink(&dir.path().join("out.MJPG"), (8, 8), 10.0).unwrap();
        assert_eq!(sink.name(), "mjpeg");
        sink.release().unwrap();

        let mut sink = open_sink(&dir.path().join("out.rgb"), (8, 8), 10.0).unwrap();
        assert_eq!(sink.name(), "rawvideo");
        sink.release().unwrap();
    }

    #[test]
    fn unknown_extension_is_fatal() {
        let dir = tempdir().unwrap();
        assert!(open_sink(&dir.path().join("out.mp4"), (8, 8), 10.0).is_err());
    }

    #[test]
    fn unwritable_path_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.mjpeg");
        assert!(open_sink(&path, (8, 8), 10.0).is_err());
    }

    #[test]
    fn guard_releases_once_on_drop() {
        let (sink, handle) = MemorySink::new();
        {
            let _guard = SinkGuard::new(Box::new(sink));
        }
        assert_eq!(handle.release_count(), 1);
    }

    #[test]
    fn explicit_release_is_not_repeated_on_drop() {
        let (sink, handle) = MemorySink::new();
        let guard = SinkGuard::new(Box::new(sink));
        guard.release().unwrap();
        assert_eq!(handle.release_count(), 1);
    }
}
