use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::annotate::DiagnosticsOverlay;
use crate::detect::{DetectParams, Detector};
use crate::frame::Frame;
use crate::sink::SinkGuard;

use super::clock::Clock;
use super::estimator::ThroughputEstimator;
use super::gate::OutputGate;
use super::queue::{FrameQueue, QueueItem};
use super::stats::PipelineCounters;

/// Lifecycle of a pipeline's consumer.
///
/// `Created -> Running -> Stopping -> Stopped`; `Stopped` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerLifecycle {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// Lifecycle state shared between the controller and the consumer thread.
#[derive(Clone, Debug)]
pub(crate) struct LifecycleCell(Arc<Mutex<WorkerLifecycle>>);

impl LifecycleCell {
    pub(crate) fn new() -> Self {
        Self(Arc::new(Mutex::new(WorkerLifecycle::Created)))
    }

    pub(crate) fn get(&self) -> WorkerLifecycle {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, next: WorkerLifecycle) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Move from `Running` to `Stopping`. Any other state is left as is.
    pub(crate) fn begin_stopping(&self) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == WorkerLifecycle::Running {
            *state = WorkerLifecycle::Stopping;
        }
    }
}

/// Consumer side of the pipeline. Moved whole into the worker thread; the
/// estimator, the gate and the sink are never touched from anywhere else.
pub struct PipelineWorker {
    pub(crate) queue: Arc<FrameQueue>,
    pub(crate) detector: Box<dyn Detector>,
    pub(crate) params: DetectParams,
    pub(crate) estimator: ThroughputEstimator,
    pub(crate) gate: OutputGate,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) overlay: Option<DiagnosticsOverlay>,
    pub(crate) output_size: (u32, u32),
    pub(crate) stop_requested: Arc<AtomicBool>,
    pub(crate) lifecycle: LifecycleCell,
    pub(crate) counters: Arc<PipelineCounters>,
}

impl PipelineWorker {
    /// Drain the queue until the shutdown sentinel or a stop request.
    ///
    /// Returns the sink so the controller can release it and observe the
    /// outcome. If this panics, the guard is dropped during unwinding and the
    /// sink is released there instead.
    pub fn run(mut self, mut sink: SinkGuard) -> SinkGuard {
        log::info!(
            "pipeline worker started (detector={}, gate interval={:.3}s)",
            self.detector.name(),
            self.gate.interval_secs()
        );
        self.estimator.reset(self.clock.now());

        loop {
            let item = self.queue.take();
            if self.stop_requested.load(Ordering::Acquire) {
                break;
            }
            let frame = match item {
                QueueItem::Shutdown => break,
                QueueItem::Frame(frame) => frame,
            };
            self.process(frame, &mut sink);
        }

        self.lifecycle.begin_stopping();
        let stats = self.counters.snapshot();
        log::info!(
            "pipeline worker exiting: processed={} written={} skipped={} failures={}",
            stats.processed,
            stats.written,
            stats.skipped,
            stats.detector_failures
        );
        sink
    }

    fn process(&mut self, frame: Frame, sink: &mut SinkGuard) {
        if frame.is_empty() {
            log::debug!("skipping empty frame {}", frame.sequence());
            self.counters.record_skipped();
            return;
        }

        let rate = self.estimator.update(self.clock.now());
        let sequence = frame.sequence();

        let mut annotated = match self.detector.predict(frame, &self.params) {
            Ok(annotated) => annotated,
            Err(e) => {
                log::warn!(
                    "detector '{}' failed on frame {}: {:#}",
                    self.detector.name(),
                    sequence,
                    e
                );
                self.counters.record_detector_failure();
                self.counters.record_processed(rate);
                return;
            }
        };

        if let Some(overlay) = &self.overlay {
            overlay.draw(&mut annotated, rate);
        }

        if self.gate.should_emit(self.clock.now()) {
            self.emit(annotated, sink);
        }
        self.counters.record_processed(rate);
    }

    fn emit(&mut self, frame: Frame, sink: &mut SinkGuard) {
        let sequence = frame.sequence();
        let (width, height) = self.output_size;
        let result = frame
            .resized(width, height)
            .and_then(|frame| sink.write(&frame));
        match result {
            Ok(()) => self.counters.record_written(),
            Err(e) => {
                log::warn!("failed to write frame {}: {:#}", sequence, e);
                self.counters.record_write_failure();
            }
        }
    }
}
