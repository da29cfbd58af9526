//! Time-interval admission for output writes.

/// Decides whether a processed frame is written, so the persisted stream keeps
/// a steady cadence no matter how bursty processing is.
///
/// An interval of zero disables gating. The first call after construction
/// always emits, and the last-emit timestamp only moves forward.
#[derive(Clone, Debug)]
pub struct OutputGate {
    interval: f64,
    last_emit: Option<f64>,
}

impl OutputGate {
    /// Gate for a target output rate in frames per second. Rates that are not
    /// strictly positive and finite disable gating.
    pub fn from_rate(output_fps: f64) -> Self {
        let interval = if output_fps > 0.0 && output_fps.is_finite() {
            1.0 / output_fps
        } else {
            0.0
        };
        Self {
            interval,
            last_emit: None,
        }
    }

    pub fn interval_secs(&self) -> f64 {
        self.interval
    }

    pub fn last_emit(&self) -> Option<f64> {
        self.last_emit
    }

    pub fn should_emit(&mut self, now: f64) -> bool {
        if self.interval <= 0.0 {
            self.record(now);
            return true;
        }
        let due = match self.last_emit {
            None => true,
            Some(last) => now - last >= self.interval,
        };
        if due {
            self.record(now);
        }
        due
    }

    fn record(&mut self, now: f64) {
        if !now.is_finite() {
            return;
        }
        self.last_emit = Some(match self.last_emit {
            Some(last) => last.max(now),
            None => now,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_emits_then_waits_one_interval() {
        let mut gate = OutputGate::from_rate(4.0);
        let interval = gate.interval_secs();
        assert_eq!(interval, 0.25);

        let t0 = 100.0;
        assert!(gate.should_emit(t0));
        assert!(!gate.should_emit(t0 + interval / 2.0));
        assert!(gate.should_emit(t0 + interval));
        assert!(!gate.should_emit(t0 + interval * 1.5));
        assert!(gate.should_emit(t0 + interval * 5.0));
    }

    #[test]
    fn first_call_emits_even_at_time_zero() {
        let mut gate = OutputGate::from_rate(10.0);
        assert!(gate.should_emit(0.0));
        assert!(!gate.should_emit(0.05));
    }

    #[test]
    fn rejected_calls_do_not_move_last_emit() {
        let mut gate = OutputGate::from_rate(1.0);
        assert!(gate.should_emit(1.0));
        assert!(!gate.should_emit(1.5));
        assert_eq!(gate.last_emit(), Some(1.0));
        assert!(gate.should_emit(2.0));
    }

    #[test]
    fn disabled_gate_always_emits() {
        for rate in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let mut gate = OutputGate::from_rate(rate);
            assert_eq!(gate.interval_secs(), 0.0);
            for i in 0..10 {
                assert!(gate.should_emit(i as f64 * 0.001));
            }
        }
    }

    #[test]
    fn last_emit_never_decreases() {
        let mut gate = OutputGate::from_rate(0.0);
        gate.should_emit(5.0);
        gate.should_emit(3.0);
        assert_eq!(gate.last_emit(), Some(5.0));
    }
}
