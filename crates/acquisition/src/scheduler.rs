//! Acquisition Scheduler - 在通道集合上执行调度轮次

use std::sync::Arc;

use contracts::{LinkStatus, SampleSource, SharedParams};
use tracing::{debug, instrument, trace};

use crate::channel::Channel;
use crate::error::{AcquisitionError, Result};
use crate::metrics::AcquisitionMetrics;
use crate::queue::OutboundProducer;

/// Channel ids are one byte on the wire, the count is one byte in the Info frame
pub const MAX_CHANNELS: usize = u8::MAX as usize;

/// Outcome of one scheduling pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Channels sampled
    pub sampled: usize,
    /// Batches pushed to the outbound queue
    pub queued: usize,
    /// Readings lost to a full buffer
    pub dropped: usize,
}

/// Acquisition Scheduler
///
/// 独占通道（按 id 索引）与发送队列的 producer 端，只在采样上下文运行。
pub struct Scheduler {
    channels: Vec<Channel>,
    producer: OutboundProducer,
    link: Arc<LinkStatus>,
    max_samples: u8,
    /// Epoch the buffered samples belong to
    epoch: u64,
    /// Last reset generation applied to the buffers
    generation: u64,
    metrics: Arc<AcquisitionMetrics>,
}

impl Scheduler {
    /// Create a scheduler whose channel buffers hold `max_samples` each
    pub fn new(producer: OutboundProducer, link: Arc<LinkStatus>, max_samples: u8) -> Self {
        let epoch = link.epoch();
        let generation = link.generation();
        Self {
            channels: Vec::new(),
            producer,
            link,
            max_samples,
            epoch,
            generation,
            metrics: Arc::new(AcquisitionMetrics::new()),
        }
    }

    /// Register a channel; its id is the registration order
    ///
    /// Returns the parameter handle the session negotiates into.
    pub fn add_channel(&mut self, source: Box<dyn SampleSource>) -> Result<Arc<SharedParams>> {
        if self.channels.len() >= MAX_CHANNELS {
            return Err(AcquisitionError::TooManyChannels { max: MAX_CHANNELS });
        }
        let id = self.channels.len() as u8;
        let channel = Channel::new(id, source, self.max_samples);
        let params = Arc::clone(channel.params());
        debug!(channel_id = id, max_samples = self.max_samples, "channel registered");
        self.channels.push(channel);
        Ok(params)
    }

    /// Parameter handles in channel-id order
    pub fn params(&self) -> Vec<Arc<SharedParams>> {
        self.channels
            .iter()
            .map(|c| Arc::clone(c.params()))
            .collect()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, id: u8) -> Option<&Channel> {
        self.channels.get(usize::from(id))
    }

    pub fn metrics(&self) -> Arc<AcquisitionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn queue_len(&self) -> usize {
        self.producer.len()
    }

    /// One sampling-context iteration
    ///
    /// Follows the link first: a new connection epoch resets the buffers and
    /// drains the queue while not initialized, a new generation only resets
    /// the buffers. Then runs a pass only if parameters are live.
    pub fn tick(&mut self, now_ms: u32) -> Result<PassReport> {
        let epoch = self.link.epoch();
        let generation = self.link.generation();
        if epoch != self.epoch {
            debug!(from = self.epoch, to = epoch, "connection epoch changed");
            self.epoch = epoch;
            self.generation = generation;
            self.reset_all();
            if !self.link.is_initialized() {
                self.drain_queue();
            }
        } else if generation != self.generation {
            debug!(from = self.generation, to = generation, "buffer reset requested");
            self.generation = generation;
            self.reset_all();
        }

        if !self.link.is_initialized() {
            return Ok(PassReport::default());
        }
        self.run_pass(now_ms)
    }

    /// Sample every due channel in id order and queue completed batches
    ///
    /// Blocks while the outbound queue is full.
    ///
    /// # Errors
    /// `QueueClosed` once the session side is gone.
    pub fn run_pass(&mut self, now_ms: u32) -> Result<PassReport> {
        let mut report = PassReport::default();

        for channel in &mut self.channels {
            if !channel.is_sample_due(now_ms) {
                continue;
            }

            report.sampled += 1;
            self.metrics.record_sample();
            if let Err(e) = channel.sample_now(now_ms) {
                report.dropped += 1;
                self.metrics.record_dropped();
                debug!(channel_id = channel.id(), error = %e, "sample dropped");
            }

            if channel.is_batch_ready() {
                let message = channel.take_batch(self.epoch);
                trace!(
                    channel_id = message.channel_id,
                    samples = message.sample_count,
                    epoch = message.epoch,
                    "batch ready"
                );
                self.producer.push_blocking(message)?;
                self.metrics.record_queued();
                report.queued += 1;
            }
        }

        Ok(report)
    }

    /// Clear every channel's buffer
    #[instrument(name = "scheduler_reset_all", skip(self))]
    pub fn reset_all(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
        self.metrics.record_reset();
    }

    /// Discard every queued message, returns how many were dropped
    #[instrument(name = "scheduler_drain_queue", skip(self))]
    pub fn drain_queue(&self) -> usize {
        let dropped = self.producer.drain();
        if dropped > 0 {
            self.metrics.record_discarded(dropped);
            debug!(dropped, "outbound queue drained");
        }
        dropped
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("channels", &self.channels)
            .field("queue_len", &self.producer.len())
            .field("epoch", &self.epoch)
            .field("generation", &self.generation)
            .finish()
    }
}
