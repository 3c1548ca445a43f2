//! Channel - 单个读取回调，附带采样节拍门控与缓冲

use std::sync::Arc;

use bytes::Bytes;
use contracts::{OutboundMessage, SampleSource, SharedParams};

use crate::buffer::SampleBuffer;
use crate::error::Result;

/// One sampling source
///
/// Owned by the scheduler. Only `params` is shared with the session context.
pub struct Channel {
    id: u8,
    params: Arc<SharedParams>,
    last_sample_ms: u32,
    buffer: SampleBuffer,
    source: Box<dyn SampleSource>,
}

impl Channel {
    pub fn new(id: u8, source: Box<dyn SampleSource>, max_samples: u8) -> Self {
        Self {
            id,
            params: Arc::new(SharedParams::default()),
            last_sample_ms: 0,
            buffer: SampleBuffer::new(max_samples),
            source,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Handle the session uses to apply negotiated parameters
    pub fn params(&self) -> &Arc<SharedParams> {
        &self.params
    }

    pub fn last_sample_ms(&self) -> u32 {
        self.last_sample_ms
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// `now - last >= period`, wrapping with the uptime counter
    pub fn is_sample_due(&self, now_ms: u32) -> bool {
        now_ms.wrapping_sub(self.last_sample_ms) >= self.params.sampling_period_ms()
    }

    /// Read the source and record `(now, value)`
    ///
    /// # Errors
    /// `BufferFull` if the buffer has no room; the reading is lost.
    pub fn sample_now(&mut self, now_ms: u32) -> Result<()> {
        let value = self.source.read();
        self.last_sample_ms = now_ms;
        self.buffer.write(now_ms, value)
    }

    /// Enough samples buffered for one outbound message
    pub fn is_batch_ready(&self) -> bool {
        let count = self.buffer.sample_count();
        count > 0 && count >= self.params.batch_size()
    }

    /// Snapshot the buffered batch and clear the buffer
    pub fn take_batch(&mut self, epoch: u64) -> OutboundMessage {
        let message = OutboundMessage {
            epoch,
            channel_id: self.id,
            sample_count: self.buffer.sample_count(),
            payload: Bytes::copy_from_slice(self.buffer.as_bytes()),
        };
        self.buffer.clear();
        message
    }

    /// Drop buffered samples
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("params", &self.params.get())
            .field("last_sample_ms", &self.last_sample_ms)
            .field("buffered", &self.buffer.sample_count())
            .finish()
    }
}
