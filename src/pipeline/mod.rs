//! Concurrent frame pipeline.
//!
//! The producer calls `Pipeline::submit` at source cadence; a single consumer
//! thread drains the bounded `FrameQueue`, runs the detector, stamps the
//! diagnostics overlay and forwards frames to the sink at the cadence allowed
//! by the `OutputGate`. Queue admission is drop-oldest, so a slow detector
//! costs dropped frames rather than memory or latency.
//!
//! Stopping sets a stop flag and closes the queue with a sentinel. The stop
//! flag is checked after every `take`, so queued frames are abandoned once a
//! stop has been requested.

mod clock;
mod estimator;
mod gate;
mod queue;
mod stats;
mod worker;

use anyhow::{anyhow, bail, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::annotate::DiagnosticsOverlay;
use crate::config::PipelineConfig;
use crate::detect::{DetectParams, Detector, DetectorRegistry, DetectorSpec};
use crate::frame::Frame;
use crate::sink::{open_sink, FrameSink, SinkGuard};

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use estimator::{ThroughputEstimator, DEFAULT_ALPHA};
pub use gate::OutputGate;
pub use queue::{Admission, FrameQueue, QueueItem};
pub use stats::PipelineStats;
pub use worker::{PipelineWorker, WorkerLifecycle};

use stats::PipelineCounters;
use worker::LifecycleCell;

const WORKER_THREAD_NAME: &str = "vigil-worker";

/// Lifecycle controller owning the queue, the consumer thread and the sink.
pub struct Pipeline {
    queue: Arc<FrameQueue>,
    stop_requested: Arc<AtomicBool>,
    lifecycle: LifecycleCell,
    counters: Arc<PipelineCounters>,
    /// Worker and sink waiting for `start`.
    pending: Option<(PipelineWorker, SinkGuard)>,
    handle: Option<JoinHandle<SinkGuard>>,
}

impl Pipeline {
    /// Build a pipeline with the built-in detector backends and the sink
    /// selected by the output path.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Self::with_registry(config, &DetectorRegistry::with_builtin())
    }

    pub fn with_registry(config: &PipelineConfig, registry: &DetectorRegistry) -> Result<Self> {
        config.validate()?;
        let spec = DetectorSpec {
            model_path: config.model_path.clone(),
            device: config.device.clone(),
            input_size: config.model_input_size,
        };
        let detector = registry
            .build(&config.detector, &spec)
            .with_context(|| format!("failed to initialise detector '{}'", config.detector))?;
        let sink = open_sink(&config.output_path, config.frame_size, config.writer_fps)?;
        Self::from_parts(config, detector, sink, Box::new(MonotonicClock::new()))
    }

    /// Assemble a pipeline from already constructed collaborators.
    pub fn from_parts(
        config: &PipelineConfig,
        detector: Box<dyn Detector>,
        sink: Box<dyn FrameSink>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        // Guard first: a construction error must still release the sink.
        let sink = SinkGuard::new(sink);
        config.validate()?;

        let queue = Arc::new(FrameQueue::new(config.queue_size)?);
        let estimator = ThroughputEstimator::new(config.smoothing)?;
        let stop_requested = Arc::new(AtomicBool::new(false));
        let lifecycle = LifecycleCell::new();
        let counters = Arc::new(PipelineCounters::default());

        let worker = PipelineWorker {
            queue: Arc::clone(&queue),
            detector,
            params: DetectParams {
                conf: config.conf,
                device: config.device.clone(),
            },
            estimator,
            gate: OutputGate::from_rate(config.writer_fps),
            clock,
            overlay: config
                .overlay
                .then(|| DiagnosticsOverlay::new(config.writer_fps)),
            output_size: config.frame_size,
            stop_requested: Arc::clone(&stop_requested),
            lifecycle: lifecycle.clone(),
            counters: Arc::clone(&counters),
        };

        Ok(Self {
            queue,
            stop_requested,
            lifecycle,
            counters,
            pending: Some((worker, sink)),
            handle: None,
        })
    }

    /// Spawn the consumer thread. Only valid once, from `Created`.
    pub fn start(&mut self) -> Result<()> {
        let state = self.lifecycle.get();
        if state != WorkerLifecycle::Created {
            bail!("pipeline cannot start from state {:?}", state);
        }
        let (worker, sink) = self
            .pending
            .take()
            .ok_or_else(|| anyhow!("pipeline worker already taken"))?;

        self.lifecycle.set(WorkerLifecycle::Running);
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run(sink));
        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                // The closure, and with it the sink guard, was dropped by the failed spawn.
                self.queue.close();
                self.lifecycle.set(WorkerLifecycle::Stopped);
                Err(e).context("failed to spawn pipeline worker thread")
            }
        }
    }

    /// Hand a frame to the consumer. Never blocks on the consumer; when the
    /// queue is full the oldest pending frame is evicted.
    pub fn submit(&self, frame: Frame) -> Admission {
        let admission = self.queue.submit(frame);
        match admission {
            Admission::Admitted => self.counters.record_submitted(false),
            Admission::AdmittedEvicting => self.counters.record_submitted(true),
            Admission::Rejected => {}
        }
        admission
    }

    /// Stop the consumer, release the sink and return the final counters.
    ///
    /// Calling `stop` on a stopped pipeline is an error.
    pub fn stop(&mut self) -> Result<PipelineStats> {
        let state = self.lifecycle.get();
        if state == WorkerLifecycle::Stopped {
            bail!("pipeline already stopped");
        }

        self.stop_requested.store(true, Ordering::Release);
        self.lifecycle.begin_stopping();
        self.queue.close();

        let released = match (self.handle.take(), self.pending.take()) {
            (Some(handle), _) => match handle.join() {
                Ok(sink) => sink.release(),
                Err(_) => Err(anyhow!("pipeline worker panicked; sink released during unwind")),
            },
            // Never started: nothing to join.
            (None, Some((_worker, sink))) => sink.release(),
            (None, None) => Ok(()),
        };
        self.lifecycle.set(WorkerLifecycle::Stopped);
        released?;

        let stats = self.counters.snapshot();
        log::info!(
            "pipeline stopped: submitted={} evicted={} processed={} written={}",
            stats.submitted,
            stats.evicted,
            stats.processed,
            stats.written
        );
        Ok(stats)
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    pub fn lifecycle(&self) -> WorkerLifecycle {
        self.lifecycle.get()
    }

    /// Frames currently waiting for the consumer.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.lifecycle.get() == WorkerLifecycle::Stopped {
            return;
        }
        if let Err(e) = self.stop() {
            log::error!("pipeline stop on drop failed: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::PassthroughDetector;
    use crate::sink::MemorySink;
    use std::path::PathBuf;

    fn config() -> PipelineConfig {
        PipelineConfig {
            output_path: PathBuf::from("memory"),
            frame_size: (8, 8),
            writer_fps: 0.0,
            overlay: false,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn stop_before_start_releases_sink() {
        let (sink, handle) = MemorySink::new();
        let mut pipeline = Pipeline::from_parts(
            &config(),
            Box::new(PassthroughDetector::new()),
            Box::new(sink),
            Box::new(ManualClock::new(0.0)),
        )
        .unwrap();
        assert_eq!(pipeline.lifecycle(), WorkerLifecycle::Created);
        pipeline.stop().unwrap();
        assert_eq!(pipeline.lifecycle(), WorkerLifecycle::Stopped);
        assert_eq!(handle.release_count(), 1);
        assert!(pipeline.start().is_err());
    }

    #[test]
    fn invalid_config_releases_sink() {
        let (sink, handle) = MemorySink::new();
        let bad = PipelineConfig {
            queue_size: 0,
            ..config()
        };
        let built = Pipeline::from_parts(
            &bad,
            Box::new(PassthroughDetector::new()),
            Box::new(sink),
            Box::new(ManualClock::new(0.0)),
        );
        assert!(built.is_err());
        assert_eq!(handle.release_count(), 1);
    }

    #[test]
    fn start_twice_is_rejected() {
        let (sink, _handle) = MemorySink::new();
        let mut pipeline = Pipeline::from_parts(
            &config(),
            Box::new(PassthroughDetector::new()),
            Box::new(sink),
            Box::new(ManualClock::new(0.0)),
        )
        .unwrap();
        pipeline.start().unwrap();
        assert!(pipeline.start().is_err());
        pipeline.stop().unwrap();
    }

    #[test]
    fn submissions_are_counted() {
        let (sink, _handle) = MemorySink::new();
        let cfg = PipelineConfig {
            queue_size: 1,
            ..config()
        };
        let mut pipeline = Pipeline::from_parts(
            &cfg,
            Box::new(PassthroughDetector::new()),
            Box::new(sink),
            Box::new(ManualClock::new(0.0)),
        )
        .unwrap();
        // Not started: the second submit evicts the first.
        assert_eq!(pipeline.submit(Frame::solid(8, 8, [0; 3])), Admission::Admitted);
        assert_eq!(
            pipeline.submit(Frame::solid(8, 8, [0; 3])),
            Admission::AdmittedEvicting
        );
        let stats = pipeline.stop().unwrap();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.evicted, 1);
        assert_eq!(pipeline.submit(Frame::solid(8, 8, [0; 3])), Admission::Rejected);
    }
}
