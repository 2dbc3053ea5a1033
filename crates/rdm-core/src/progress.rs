//! Shared progress accounting.
//!
//! The byte counter is the only state written by every fetch worker; it is a
//! plain atomic add, never a lock, so no writer can stall another. The
//! coordinator's poll loop reads it to build [`ProgressStats`] snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic aggregate byte counter shared by all fetch workers.
#[derive(Debug, Clone, Default)]
pub struct ProgressCounter(Arc<AtomicU64>);

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds newly written bytes. Called from worker threads per block.
    pub fn add(&self, bytes: u64) {
        self.0.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Current total. Eventually consistent across workers; exact once all
    /// workers have finished.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Resets to zero at the start of a run.
    pub(crate) fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of one download's progress, emitted on each coordinator poll.
#[derive(Debug, Clone)]
pub struct ProgressStats {
    /// Bytes written to segment files so far.
    pub bytes_done: u64,
    /// Total resource size in bytes.
    pub total_bytes: u64,
    /// Seconds since the fetch phase started.
    pub elapsed_secs: f64,
    /// Segment tasks that have finished (successfully or not).
    pub segments_done: usize,
    /// Total number of planned segments.
    pub segment_count: usize,
}

impl ProgressStats {
    /// Mean download rate in bytes per second.
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining, `None` while the rate is still zero.
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total_bytes.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in `[0.0, 1.0]`.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.bytes_done as f64 / self.total_bytes as f64).min(1.0)
    }
}
