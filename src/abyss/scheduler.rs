//! Work queue of samples ordered by the depth at which they go stale.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::layout::ProceduralSample;

/// Min-heap of samples keyed by changepoint
#[derive(Clone, Debug, Default)]
pub struct SampleScheduler {
    heap: BinaryHeap<Reverse<ProceduralSample>>,
}

impl SampleScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: ProceduralSample) {
        self.heap.push(Reverse(sample));
    }

    /// Remove and return every sample with `changepoint < depth`, earliest first
    pub fn pop_due(&mut self, depth: u64) -> Vec<ProceduralSample> {
        let mut due = Vec::new();
        while let Some(Reverse(next)) = self.heap.peek() {
            if !next.is_due(depth) {
                break;
            }
            if let Some(Reverse(sample)) = self.heap.pop() {
                due.push(sample);
            }
        }
        due
    }

    pub fn peek_changepoint(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(s)| s.changepoint)
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
