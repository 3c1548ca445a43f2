//! 节点指标收集模块
//!
//! 通过 `metrics` facade 发布采集与 session 计数器，并在运行结束时汇总。

use std::time::Duration;

use acquisition::MetricsSnapshot as AcquisitionSnapshot;
use metrics::{counter, gauge, histogram};
use session::MetricsSnapshot as SessionSnapshot;

/// Publish the sampling-side counters
///
/// Snapshots are cumulative, so counters are set to their absolute value.
pub fn record_acquisition(snapshot: &AcquisitionSnapshot) {
    counter!("sensor_node_samples_taken_total").absolute(snapshot.samples_taken);
    counter!("sensor_node_samples_dropped_total").absolute(snapshot.samples_dropped);
    counter!("sensor_node_batches_queued_total").absolute(snapshot.batches_queued);
    counter!("sensor_node_messages_discarded_total").absolute(snapshot.messages_discarded);
    counter!("sensor_node_resets_total").absolute(snapshot.resets);
}

/// Publish the network-side counters
pub fn record_session(snapshot: &SessionSnapshot) {
    counter!("sensor_node_frames_sent_total").absolute(snapshot.frames_sent);
    counter!("sensor_node_bytes_sent_total").absolute(snapshot.bytes_sent);
    counter!("sensor_node_samples_sent_total").absolute(snapshot.samples_sent);
    counter!("sensor_node_keepalives_sent_total").absolute(snapshot.keepalives_sent);
    counter!("sensor_node_reconnects_total").absolute(snapshot.reconnects);
    counter!("sensor_node_malformed_frames_total").absolute(snapshot.malformed_frames);
    counter!("sensor_node_stale_discarded_total").absolute(snapshot.stale_discarded);
    counter!("sensor_node_negotiations_total").absolute(snapshot.negotiations);
}

/// Publish whether samples are flowing and the current connection epoch
pub fn record_link_state(initialized: bool, epoch: u64) {
    gauge!("sensor_node_link_initialized").set(if initialized { 1.0 } else { 0.0 });
    gauge!("sensor_node_link_epoch").set(epoch as f64);
}

/// Publish the outbound queue depth
pub fn record_queue_depth(depth: usize) {
    gauge!("sensor_node_queue_depth").set(depth as f64);
    histogram!("sensor_node_queue_depth_hist").record(depth as f64);
}

/// In-memory aggregation for the end-of-run summary
#[derive(Debug, Clone, Default)]
pub struct NodeStatsAggregator {
    queue_depth: RunningStats,
    link_up_polls: u64,
    polls: u64,
}

impl NodeStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one periodic observation
    pub fn observe(&mut self, queue_depth: usize, initialized: bool) {
        self.polls += 1;
        if initialized {
            self.link_up_polls += 1;
        }
        self.queue_depth.push(queue_depth as f64);
    }

    pub fn summary(
        &self,
        duration: Duration,
        acquisition: AcquisitionSnapshot,
        session: SessionSnapshot,
    ) -> NodeSummary {
        NodeSummary {
            duration,
            acquisition,
            session,
            queue_depth: StatsSummary::from(&self.queue_depth),
            link_up_ratio: if self.polls > 0 {
                self.link_up_polls as f64 / self.polls as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// End-of-run summary
#[derive(Debug, Clone, Default)]
pub struct NodeSummary {
    pub duration: Duration,
    pub acquisition: AcquisitionSnapshot,
    pub session: SessionSnapshot,
    pub queue_depth: StatsSummary,
    /// Share of observations with samples flowing, in percent
    pub link_up_ratio: f64,
}

impl NodeSummary {
    /// Samples put on the wire per second
    pub fn samples_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.session.samples_sent as f64 / secs
        } else {
            0.0
        }
    }

    /// Samples lost to full buffers, in percent of samples taken
    pub fn drop_rate(&self) -> f64 {
        if self.acquisition.samples_taken > 0 {
            self.acquisition.samples_dropped as f64 / self.acquisition.samples_taken as f64 * 100.0
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for NodeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Sensor Node Summary ===")?;
        writeln!(f, "Duration: {:.2}s", self.duration.as_secs_f64())?;
        writeln!(f, "Link up: {:.1}%", self.link_up_ratio)?;
        writeln!(
            f,
            "Samples taken: {} (dropped {}, {:.2}%)",
            self.acquisition.samples_taken,
            self.acquisition.samples_dropped,
            self.drop_rate()
        )?;
        writeln!(
            f,
            "Samples sent: {} ({:.1}/s)",
            self.session.samples_sent,
            self.samples_per_sec()
        )?;
        writeln!(
            f,
            "Frames sent: {} ({} bytes, {} keepalives)",
            self.session.frames_sent, self.session.bytes_sent, self.session.keepalives_sent
        )?;
        writeln!(
            f,
            "Negotiations: {}, reconnects: {}, resets: {}",
            self.session.negotiations, self.session.reconnects, self.acquisition.resets
        )?;
        writeln!(
            f,
            "Discarded messages: {} on reset, {} stale",
            self.acquisition.messages_discarded, self.session.stale_discarded
        )?;
        writeln!(f, "Malformed server frames: {}", self.session.malformed_frames)?;
        writeln!(f, "Queue depth: {}", self.queue_depth)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.2}, std={:.2} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean and variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
