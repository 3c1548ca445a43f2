//! 采集侧指标

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the sampling thread and reporters
#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
    /// Readings taken
    pub samples_taken: AtomicU64,

    /// Readings lost to a full buffer
    pub samples_dropped: AtomicU64,

    /// Batches pushed to the outbound queue
    pub batches_queued: AtomicU64,

    /// Queued batches discarded on reset
    pub messages_discarded: AtomicU64,

    /// Channel resets (connection epoch changes)
    pub resets: AtomicU64,
}

impl AcquisitionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sample(&self) {
        self.samples_taken.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.samples_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.batches_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: usize) {
        self.messages_discarded
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples_taken: self.samples_taken.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            batches_queued: self.batches_queued.load(Ordering::Relaxed),
            messages_discarded: self.messages_discarded.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub samples_taken: u64,
    pub samples_dropped: u64,
    pub batches_queued: u64,
    pub messages_discarded: u64,
    pub resets: u64,
}
