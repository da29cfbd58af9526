//! Pipeline counters shared between the producer, the consumer and observers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the pipeline counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PipelineStats {
    /// Frames offered through `submit` while the queue was open.
    pub submitted: u64,
    /// Frames evicted by drop-oldest admission.
    pub evicted: u64,
    /// Non-empty frames the consumer ran through the detector.
    pub processed: u64,
    /// Empty frames the consumer skipped.
    pub skipped: u64,
    pub detector_failures: u64,
    pub written: u64,
    pub write_failures: u64,
    /// Smoothed processing rate at the last processed frame.
    pub processing_fps: f64,
}

impl PipelineStats {
    /// Frames the consumer has dequeued so far.
    pub fn consumed(&self) -> u64 {
        self.processed + self.skipped
    }
}

#[derive(Debug, Default)]
pub(crate) struct PipelineCounters {
    submitted: AtomicU64,
    evicted: AtomicU64,
    processed: AtomicU64,
    skipped: AtomicU64,
    detector_failures: AtomicU64,
    written: AtomicU64,
    write_failures: AtomicU64,
    processing_fps_bits: AtomicU64,
}

impl PipelineCounters {
    pub(crate) fn record_submitted(&self, evicted: bool) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        if evicted {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_processed(&self, processing_fps: f64) {
        self.processing_fps_bits
            .store(processing_fps.to_bits(), Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn record_detector_failure(&self) {
        self.detector_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Acquire),
            skipped: self.skipped.load(Ordering::Acquire),
            detector_failures: self.detector_failures.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            processing_fps: f64::from_bits(self.processing_fps_bits.load(Ordering::Relaxed)),
        }
    }
}
