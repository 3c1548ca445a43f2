//! Session metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one session
#[derive(Debug, Default)]
pub struct SessionMetrics {
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    samples_sent: AtomicU64,
    keepalives_sent: AtomicU64,
    reconnects: AtomicU64,
    malformed_frames: AtomicU64,
    stale_discarded: AtomicU64,
    negotiations: AtomicU64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outbound frame
    pub fn record_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_samples(&self, count: u8) {
        self.samples_sent
            .fetch_add(u64::from(count), Ordering::Relaxed);
    }

    pub fn inc_keepalives(&self) {
        self.keepalives_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_malformed(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_stale(&self, count: usize) {
        self.stale_discarded
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn inc_negotiations(&self) {
        self.negotiations.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            samples_sent: self.samples_sent.load(Ordering::Relaxed),
            keepalives_sent: self.keepalives_sent.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
            negotiations: self.negotiations.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of session metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub samples_sent: u64,
    pub keepalives_sent: u64,
    pub reconnects: u64,
    pub malformed_frames: u64,
    pub stale_discarded: u64,
    pub negotiations: u64,
}
