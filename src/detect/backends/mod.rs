pub mod motion;
pub mod passthrough;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use motion::MotionDetector;
pub use passthrough::PassthroughDetector;

#[cfg(feature = "backend-tract")]
pub use tract::TractDetector;
