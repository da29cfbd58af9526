//! Frame ingestion sources.
//!
//! - `stub://name?frames=N&fps=F&width=W&height=H&pace=0|1`: synthetic scene
//!   with a moving square (always available, used by tests and demos)
//! - local files, RTSP URLs and capture devices (feature: ingest-ffmpeg).
//!   A source consisting only of digits names a capture device index and
//!   maps to `/dev/video<N>`.
//!
//! Sources never retry or reconnect: a read error or end of stream ends the run.

#[cfg(feature = "ingest-ffmpeg")]
mod ffmpeg_source;
mod synthetic;

use anyhow::Result;

use crate::frame::Frame;

#[cfg(feature = "ingest-ffmpeg")]
pub use ffmpeg_source::FfmpegSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// Producer of frames at source cadence.
pub trait FrameSource {
    fn connect(&mut self) -> Result<()>;

    /// Next decoded frame; `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Rate advertised by the source, if any.
    fn nominal_fps(&self) -> Option<f64>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Open the source named by `spec` (not yet connected).
pub fn open_source(spec: &str) -> Result<Box<dyn FrameSource>> {
    let spec = spec.trim();
    if spec.is_empty() {
        anyhow::bail!("source must not be empty");
    }
    if spec.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(SyntheticConfig::parse(spec)?)));
    }
    open_decoded(&device_path(spec))
}

#[cfg(feature = "ingest-ffmpeg")]
fn open_decoded(path: &str) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(FfmpegSource::new(path)?))
}

#[cfg(not(feature = "ingest-ffmpeg"))]
fn open_decoded(path: &str) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!(
        "source '{}' requires the ingest-ffmpeg feature (only stub:// sources are built in)",
        path
    )
}

/// Map a bare device index ("0") to its capture device path.
pub(crate) fn device_path(spec: &str) -> String {
    if spec.chars().all(|c| c.is_ascii_digit()) {
        format!("/dev/video{}", spec)
    } else {
        spec.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_index_maps_to_video_device() {
        assert_eq!(device_path("0"), "/dev/video0");
        assert_eq!(device_path("12"), "/dev/video12");
        assert_eq!(device_path("rtsp://cam/1"), "rtsp://cam/1");
        assert_eq!(device_path("clip.mp4"), "clip.mp4");
    }

    #[test]
    fn stub_sources_are_always_available() {
        let mut source = open_source("stub://test?frames=2&pace=0").unwrap();
        source.connect().unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn empty_source_is_rejected() {
        assert!(open_source("  ").is_err());
    }

    #[cfg(not(feature = "ingest-ffmpeg"))]
    #[test]
    fn decoded_sources_need_ffmpeg_feature() {
        let err = match open_source("clip.mp4") {
            Ok(_) => panic!("expected feature error"),
            Err(e) => e.to_string(),
        };
        assert!(err.contains("ingest-ffmpeg"));
    }
}
