//! Sliding sample buffer shared between the ingest task and consumers.
//!
//! The buffer owns its lock — the exclusive section covers only the
//! shift-and-write of an append or the copy-out of a snapshot, never socket
//! I/O or consumer work. One producer (the receive loop) mutates it; any
//! number of tick consumers read prefix-consistent snapshots.

use std::sync::Mutex;

/// Fixed-capacity sliding window over the most recent samples.
///
/// Always exactly `capacity` samples long: pre-filled with a sentinel value
/// at construction, so consumers see a full window from the first tick.
/// Appending `k` samples evicts exactly the `k` oldest, preserving the
/// relative order of survivors.
pub struct SampleBuffer {
    samples: Mutex<Vec<f64>>,
    capacity: usize,
}

impl SampleBuffer {
    /// Create a buffer of `capacity` samples, pre-filled with `fill_value`.
    pub fn new(capacity: usize, fill_value: f64) -> Self {
        Self {
            samples: Mutex::new(vec![fill_value; capacity]),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a batch, evicting the same number of oldest samples.
    ///
    /// A batch larger than the capacity keeps only its most recent
    /// `capacity` samples.
    pub fn append(&self, batch: &[f64]) {
        if batch.is_empty() {
            return;
        }
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());

        if batch.len() >= self.capacity {
            let tail = &batch[batch.len() - self.capacity..];
            samples.copy_from_slice(tail);
            return;
        }

        let k = batch.len();
        samples.copy_within(k.., 0);
        samples[self.capacity - k..].copy_from_slice(batch);
    }

    /// Copy out the current window, oldest first, newest at the tail.
    ///
    /// Taken under the append lock, so a snapshot is always some exact
    /// between-appends state — never a torn write.
    pub fn snapshot(&self) -> Vec<f64> {
        self.samples
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Copy out only the newest `n` samples (the raw display tail).
    pub fn tail(&self, n: usize) -> Vec<f64> {
        let samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        let n = n.min(self.capacity);
        samples[self.capacity - n..].to_vec()
    }
}

// ============================================================================
// Tests
// ============================================================================
