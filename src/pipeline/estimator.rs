//! Exponentially smoothed throughput estimate over consumed-frame timestamps.

use anyhow::{anyhow, Result};

/// Smoothing factor used when none is configured.
pub const DEFAULT_ALPHA: f64 = 0.1;

/// Single-writer EMA of the instantaneous frame rate.
///
/// Only the consumer thread updates it. A non-positive (or non-finite) time
/// step contributes an instantaneous rate of zero, so the estimate is never
/// negative or NaN.
#[derive(Clone, Debug)]
pub struct ThroughputEstimator {
    previous: f64,
    smoothed: f64,
    alpha: f64,
}

impl ThroughputEstimator {
    pub fn new(alpha: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(anyhow!("smoothing factor must be in (0, 1), got {}", alpha));
        }
        Ok(Self {
            previous: 0.0,
            smoothed: 0.0,
            alpha,
        })
    }

    /// Set the reference timestamp for the next `update` without touching the estimate.
    pub fn reset(&mut self, now: f64) {
        if now.is_finite() {
            self.previous = now;
        }
    }

    /// Fold in a frame consumed at `now` and return the updated estimate.
    pub fn update(&mut self, now: f64) -> f64 {
        let dt = now - self.previous;
        let instant = if dt > 0.0 && dt.is_finite() {
            1.0 / dt
        } else {
            0.0
        };
        self.smoothed = if self.smoothed == 0.0 {
            instant
        } else {
            (1.0 - self.alpha) * self.smoothed + self.alpha * instant
        };
        if now.is_finite() {
            self.previous = now;
        }
        self.smoothed
    }

    pub fn rate(&self) -> f64 {
        self.smoothed
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Default for ThroughputEstimator {
    fn default() -> Self {
        Self {
            previous: 0.0,
            smoothed: 0.0,
            alpha: DEFAULT_ALPHA,
        }
    }
}
