//! Bounded history of accepted frames for scrubbing while paused.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::frame::TelemetryFrame;

/// Default number of frames kept.
pub const DEFAULT_CAPACITY: usize = 40;

/// FIFO of the most recent frames, oldest evicted first.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    frames: VecDeque<Arc<TelemetryFrame>>,
    capacity: usize,
}

impl ReplayBuffer {
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replay capacity must be non-zero");
        Self { frames: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append a frame, evicting the oldest once over capacity.
    pub fn push(&mut self, frame: Arc<TelemetryFrame>) {
        self.frames.push_back(frame);
        if self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
    }

    /// The frame `steps_back` from the newest, clamped to the oldest held.
    /// `None` only when the buffer is empty.
    pub fn get(&self, steps_back: usize) -> Option<&Arc<TelemetryFrame>> {
        let last = self.frames.len().checked_sub(1)?;
        self.frames.get(last - steps_back.min(last))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TelemetryFrame>> {
        self.frames.iter()
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
