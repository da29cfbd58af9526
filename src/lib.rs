//! Vigil
//!
//! Rate-limited annotated surveillance pipeline: frames arrive at source
//! cadence, pass through a detector on a dedicated consumer thread, and are
//! written at a steady output cadence.
//!
//! # Architecture
//!
//! The pipeline keeps three properties regardless of how slow the detector is:
//!
//! 1. **Bounded memory**: the hand-off queue holds at most `queue_size` frames;
//!    a full queue evicts its oldest frame (drop-oldest).
//! 2. **Non-blocking producer**: `Pipeline::submit` never waits on the consumer.
//! 3. **Steady output**: the output gate writes at most one frame per
//!    `1 / writer_fps` seconds, independent of processing bursts.
//!
//! # Module Structure
//!
//! - `frame`: owned RGB24 frames (zeroized on drop)
//! - `ingest`: frame sources (synthetic `stub://`, FFmpeg decode)
//! - `detect`: detector trait, registry and backends
//! - `annotate`: drawing primitives and the diagnostics overlay
//! - `pipeline`: queue, throughput estimator, output gate, worker and controller
//! - `sink`: output writers (MJPEG, raw rgb24, in-memory)
//! - `config`: pipeline and daemon configuration

pub mod annotate;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod sink;

pub use config::{resolve_writer_fps, PipelineConfig, VigildConfig};
pub use detect::{DetectParams, Detector, DetectorRegistry, DetectorSpec};
pub use frame::Frame;
pub use ingest::{open_source, FrameSource, SourceStats};
pub use pipeline::{
    Admission, Clock, ManualClock, MonotonicClock, Pipeline, PipelineStats, WorkerLifecycle,
};
pub use sink::{open_sink, FrameSink, MemorySink, MemorySinkHandle};
