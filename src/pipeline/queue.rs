//! Bounded hand-off queue between the frame producer and the consumer thread.
//!
//! Admission is drop-oldest: a full queue evicts its oldest item to admit the
//! new frame, so `submit` never blocks on a slow consumer and the consumer
//! always sees the freshest frames. `take` blocks only while the queue is empty
//! and open.
//!
//! Shutdown travels through the same channel as data, as a
//! `QueueItem::Shutdown` sentinel. Once the sentinel reaches the head of the
//! queue it stays there, so every later `take` returns it again.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::frame::Frame;

/// An item handed to the consumer.
#[derive(Debug)]
pub enum QueueItem {
    Frame(Frame),
    Shutdown,
}

/// Outcome of `FrameQueue::submit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Admitted without eviction.
    Admitted,
    /// Admitted after evicting the oldest queued frame.
    AdmittedEvicting,
    /// Queue already closed; the frame was dropped.
    Rejected,
}

struct QueueState {
    items: VecDeque<QueueItem>,
    closed: bool,
}

pub struct FrameQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(anyhow!("queue capacity must be at least 1"));
        }
        Ok(Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
        })
    }

    /// Admit a frame, evicting the oldest item when full. Never blocks on the consumer.
    pub fn submit(&self, frame: Frame) -> Admission {
        let mut state = self.lock();
        if state.closed {
            return Admission::Rejected;
        }
        let admission = if state.items.len() >= self.capacity {
            // Dropped here; Frame zeroizes on drop.
            state.items.pop_front();
            Admission::AdmittedEvicting
        } else {
            Admission::Admitted
        };
        state.items.push_back(QueueItem::Frame(frame));
        drop(state);
        self.available.notify_one();
        admission
    }

    /// Block until a frame or the shutdown sentinel is available.
    pub fn take(&self) -> QueueItem {
        let mut state = self.lock();
        loop {
            if matches!(state.items.front(), Some(QueueItem::Shutdown)) {
                return QueueItem::Shutdown;
            }
            if let Some(item) = state.items.pop_front() {
                return item;
            }
            if state.closed {
                return QueueItem::Shutdown;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Close the queue and enqueue the shutdown sentinel. Idempotent.
    ///
    /// A full queue evicts its oldest frame to make room for the sentinel, so
    /// closing never waits on the consumer.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        if state.items.len() >= self.capacity {
            state.items.pop_front();
        }
        state.items.push_back(QueueItem::Shutdown);
        drop(state);
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of queued items, including the sentinel once closed.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // The critical sections never panic, so a poisoned lock still holds a
    // consistent queue.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
