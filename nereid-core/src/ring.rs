//! Bounded ring of recently emitted lines.
//!
//! The scheduler appends every line it publishes; observers copy out the
//! tail for inspection. Appends drop the oldest line once the ring is
//! full.

use std::collections::VecDeque;
use std::sync::Mutex;

pub const DEFAULT_RING_CAPACITY: usize = 200;

#[derive(Debug)]
pub struct StreamRing {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl StreamRing {
    pub fn new(capacity: usize) -> Self {
        StreamRing {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().unwrap().is_empty()
    }

    /// Copy out the most recent `limit` lines, oldest first.
    pub fn tail(&self, limit: usize) -> Vec<String> {
        let lines = self.lines.lock().unwrap();
        let skip = lines.len().saturating_sub(limit);
        lines.iter().skip(skip).cloned().collect()
    }
}

impl Default for StreamRing {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}
