use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::FrameSink;
use crate::frame::Frame;

/// Metadata of a frame accepted by a `MemorySink`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WrittenFrame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Default)]
struct MemorySinkState {
    frames: Vec<WrittenFrame>,
    release_count: u32,
    fail_writes: bool,
}

/// In-memory sink that records frame metadata. Pixels are not retained.
pub struct MemorySink {
    state: Arc<Mutex<MemorySinkState>>,
    released: bool,
}

/// Observer handle for a `MemorySink` that has been moved into a pipeline.
#[derive(Clone)]
pub struct MemorySinkHandle {
    state: Arc<Mutex<MemorySinkState>>,
}

impl MemorySink {
    pub fn new() -> (Self, MemorySinkHandle) {
        let state = Arc::new(Mutex::new(MemorySinkState::default()));
        (
            Self {
                state: Arc::clone(&state),
                released: false,
            },
            MemorySinkHandle { state },
        )
    }
}

impl FrameSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        let mut state = lock(&self.state);
        if self.released {
            return Err(anyhow!("memory sink already released"));
        }
        if state.fail_writes {
            return Err(anyhow!("memory sink configured to fail writes"));
        }
        state.frames.push(WrittenFrame {
            sequence: frame.sequence(),
            width: frame.width(),
            height: frame.height(),
        });
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        // Every call is counted so callers that release twice are visible.
        lock(&self.state).release_count += 1;
        self.released = true;
        Ok(())
    }
}

impl MemorySinkHandle {
    pub fn frames(&self) -> Vec<WrittenFrame> {
        lock(&self.state).frames.clone()
    }

    pub fn write_count(&self) -> usize {
        lock(&self.state).frames.len()
    }

    /// Number of `release` calls the sink has received.
    pub fn release_count(&self) -> u32 {
        lock(&self.state).release_count
    }

    /// Make subsequent writes fail, to exercise write-failure handling.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }
}

fn lock(state: &Mutex<MemorySinkState>) -> MutexGuard<'_, MemorySinkState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_writes_and_counts_every_release() {
        let (mut sink, handle) = MemorySink::new();
        sink.write(&Frame::solid(4, 2, [0, 0, 0]).with_sequence(3))
            .unwrap();
        sink.release().unwrap();
        assert_eq!(handle.release_count(), 1);
        sink.release().unwrap();
        sink.release().unwrap();
        assert_eq!(
            handle.frames(),
            vec![WrittenFrame {
                sequence: 3,
                width: 4,
                height: 2
            }]
        );
        assert_eq!(handle.release_count(), 3);
        assert!(sink.write(&Frame::solid(4, 2, [0, 0, 0])).is_err());
    }

    #[test]
    fn can_be_told_to_fail() {
        let (mut sink, handle) = MemorySink::new();
        handle.fail_writes(true);
        assert!(sink.write(&Frame::solid(1, 1, [0, 0, 0])).is_err());
        assert_eq!(handle.write_count(), 0);
    }
}
