//! In-memory FIFO queue backing each resource-class lane.

use std::collections::VecDeque;

use crate::core::{OperationQueue, ThrottleError};

/// In-memory queue storing pending jobs in submission order.
/// This provides O(1) enqueue and O(1) dequeue operations.
pub struct InMemoryQueue<J> {
    max_depth: usize,
    jobs: VecDeque<J>,
}

impl<J> InMemoryQueue<J> {
    /// Create a new in-memory queue with a maximum depth.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            jobs: VecDeque::with_capacity(max_depth.min(1024)),
        }
    }
}

impl<J> OperationQueue<J> for InMemoryQueue<J> {
    fn enqueue(&mut self, job: J) -> Result<(), ThrottleError> {
        if self.len() >= self.max_depth() {
            return Err(ThrottleError::QueueFull(format!(
                "max queue depth {} reached",
                self.max_depth
            )));
        }
        self.jobs.push_back(job);
        Ok(())
    }

    fn dequeue(&mut self) -> Option<J> {
        self.jobs.pop_front()
    }

    fn drain(&mut self) -> Vec<J> {
        self.jobs.drain(..).collect()
    }

    fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn len(&self) -> usize {
        self.jobs.len()
    }
}
