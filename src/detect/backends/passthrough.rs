use anyhow::Result;

use crate::detect::backend::{DetectParams, Detector};
use crate::frame::Frame;

/// Returns every frame unchanged. Useful for recording without analysis and in tests.
#[derive(Debug, Default)]
pub struct PassthroughDetector;

impl PassthroughDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for PassthroughDetector {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn predict(&mut self, frame: Frame, _params: &DetectParams) -> Result<Frame> {
        Ok(frame)
    }
}
