//! Detection and annotation backends.
//!
//! The pipeline treats detection as an opaque per-frame transform behind the
//! `Detector` trait. Built-in backends are selected by name through
//! `DetectorRegistry`:
//! - `passthrough`: returns frames unchanged
//! - `motion`: CPU frame-difference motion boxes
//! - `tract`: ONNX object detection (feature: backend-tract)

mod backend;
mod backends;
mod registry;
mod result;

pub use backend::{DetectParams, Detector, DetectorSpec};
pub use backends::{MotionDetector, PassthroughDetector};
#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;
pub use registry::{DetectorFactory, DetectorRegistry};
pub use result::{Detection, DetectionResult, SizeClass};
