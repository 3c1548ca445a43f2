//! 采样上下文 - 驱动 scheduler 的独立 OS 线程

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::Uptime;
use tracing::{debug, info, warn};

use crate::error::AcquisitionError;
use crate::metrics::{AcquisitionMetrics, MetricsSnapshot};
use crate::scheduler::Scheduler;

/// Handle to the running sampling thread
pub struct SamplingThread {
    stop: Arc<AtomicBool>,
    metrics: Arc<AcquisitionMetrics>,
    handle: JoinHandle<()>,
}

impl SamplingThread {
    /// Move the scheduler onto its own thread and tick it every `interval`
    ///
    /// The thread exits when stopped or when the outbound queue closes.
    pub fn spawn(
        mut scheduler: Scheduler,
        uptime: Uptime,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let metrics = scheduler.metrics();
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("sampling".to_string())
            .spawn(move || {
                info!(
                    channels = scheduler.channel_count(),
                    interval_us = interval.as_micros() as u64,
                    "sampling thread started"
                );
                while !thread_stop.load(Ordering::Relaxed) {
                    match scheduler.tick(uptime.now_ms()) {
                        Ok(_) => {}
                        Err(AcquisitionError::QueueClosed) => {
                            debug!("outbound queue closed");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "scheduler pass failed");
                        }
                    }
                    thread::sleep(interval);
                }
                info!("sampling thread stopped");
            })?;

        Ok(Self {
            stop,
            metrics,
            handle,
        })
    }

    pub fn metrics(&self) -> &Arc<AcquisitionMetrics> {
        &self.metrics
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the thread to stop and wait for it
    ///
    /// A producer blocked on a full queue only returns once the consumer is
    /// dropped, so stop the session first.
    pub fn stop(self) -> MetricsSnapshot {
        self.stop.store(true, Ordering::Relaxed);
        if self.handle.join().is_err() {
            warn!("sampling thread panicked");
        }
        self.metrics.snapshot()
    }
}
