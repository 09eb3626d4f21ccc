//! Output metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single draining output
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Lines handed to the sink task
    accepted_lines: AtomicU64,
    /// Lines refused because the output was already closing
    rejected_lines: AtomicU64,
    /// Lines evicted from the ring buffer
    evicted_lines: AtomicU64,
    /// Batches flushed successfully
    flushed_batches: AtomicU64,
    /// Lines in successful batches
    flushed_lines: AtomicU64,
    /// Batches whose flush returned an error
    failed_flushes: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepted_lines(&self) -> u64 {
        self.accepted_lines.load(Ordering::Relaxed)
    }

    pub fn inc_accepted_lines(&self) {
        self.accepted_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rejected_lines(&self) -> u64 {
        self.rejected_lines.load(Ordering::Relaxed)
    }

    pub fn inc_rejected_lines(&self) {
        self.rejected_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn evicted_lines(&self) -> u64 {
        self.evicted_lines.load(Ordering::Relaxed)
    }

    pub fn inc_evicted_lines(&self) {
        self.evicted_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flushed_batches(&self) -> u64 {
        self.flushed_batches.load(Ordering::Relaxed)
    }

    pub fn flushed_lines(&self) -> u64 {
        self.flushed_lines.load(Ordering::Relaxed)
    }

    /// Record a successful flush of `lines` lines
    pub fn record_flush(&self, lines: usize) {
        self.flushed_batches.fetch_add(1, Ordering::Relaxed);
        self.flushed_lines.fetch_add(lines as u64, Ordering::Relaxed);
    }

    pub fn failed_flushes(&self) -> u64 {
        self.failed_flushes.load(Ordering::Relaxed)
    }

    pub fn inc_failed_flushes(&self) {
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accepted_lines: self.accepted_lines(),
            rejected_lines: self.rejected_lines(),
            evicted_lines: self.evicted_lines(),
            flushed_batches: self.flushed_batches(),
            flushed_lines: self.flushed_lines(),
            failed_flushes: self.failed_flushes(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub accepted_lines: u64,
    pub rejected_lines: u64,
    pub evicted_lines: u64,
    pub flushed_batches: u64,
    pub flushed_lines: u64,
    pub failed_flushes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_flush() {
        let metrics = SinkMetrics::new();
        metrics.record_flush(3);
        metrics.record_flush(2);
        metrics.inc_failed_flushes();

        let snap = metrics.snapshot();
        assert_eq!(snap.flushed_batches, 2);
        assert_eq!(snap.flushed_lines, 5);
        assert_eq!(snap.failed_flushes, 1);
        assert_eq!(snap.evicted_lines, 0);
    }
}
