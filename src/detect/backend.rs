use anyhow::Result;
use std::path::PathBuf;

use crate::frame::Frame;

/// Per-call inference parameters, passed through opaquely from the pipeline config.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectParams {
    /// Minimum confidence for a detection to be drawn.
    pub conf: f32,
    /// Accelerator selector (e.g. "cpu", "0"). Backends interpret it themselves.
    pub device: Option<String>,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            conf: 0.5,
            device: None,
        }
    }
}

/// Construction-time parameters for a detector backend.
#[derive(Clone, Debug, Default)]
pub struct DetectorSpec {
    pub model_path: PathBuf,
    pub device: Option<String>,
    /// Model input size (width, height). Backends that need a fixed input
    /// resize internally; the pipeline never resizes before inference.
    pub input_size: (u32, u32),
}

/// Detection and annotation transform invoked once per consumed frame.
///
/// `predict` takes the frame by value and returns the annotated frame, which
/// is normally the same buffer drawn over in place. The call may be slow; it
/// runs on the pipeline's consumer thread and is the reason the hand-off queue
/// exists.
///
/// An `Err` is treated as a per-frame failure: the pipeline logs it and skips
/// the frame.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    fn predict(&mut self, frame: Frame, params: &DetectParams) -> Result<Frame>;

    /// Optional warm-up hook, called once before the consumer starts.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
