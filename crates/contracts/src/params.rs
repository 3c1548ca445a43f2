//! 通道节拍参数
//!
//! 由 session 上下文写入，采样上下文读取。
//! 锁只在 get/set 期间持有，不跨越 I/O。

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::NodeError;

/// Negotiated cadence of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelParams {
    /// Minimum uptime between two samples (0 = every tick)
    pub sampling_period_ms: u32,

    /// Samples per outbound message
    pub batch_size: u8,
}

impl ChannelParams {
    pub fn new(sampling_period_ms: u32, batch_size: u8) -> Self {
        Self {
            sampling_period_ms,
            batch_size,
        }
    }

    /// Check the batch size against the transport maximum
    pub fn validate(self, channel_id: u8, max_batch: u8) -> Result<Self, NodeError> {
        if self.batch_size > max_batch {
            return Err(NodeError::ParameterOutOfRange {
                channel_id,
                requested: self.batch_size,
                max: max_batch,
            });
        }
        Ok(self)
    }

    /// Same parameters with the batch size limited to `max_batch`
    pub fn clamped(self, max_batch: u8) -> Self {
        Self {
            batch_size: self.batch_size.min(max_batch),
            ..self
        }
    }

    /// Time needed to fill one batch, used by the keepalive policy
    pub fn batch_span_ms(&self) -> u64 {
        u64::from(self.sampling_period_ms) * u64::from(self.batch_size)
    }
}

impl Default for ChannelParams {
    /// Effectively idle until negotiated
    fn default() -> Self {
        Self {
            sampling_period_ms: u32::MAX,
            batch_size: 1,
        }
    }
}

/// Per-channel guarded parameters
#[derive(Debug, Default)]
pub struct SharedParams {
    inner: Mutex<ChannelParams>,
}

impl SharedParams {
    pub fn new(params: ChannelParams) -> Self {
        Self {
            inner: Mutex::new(params),
        }
    }

    /// Atomic read of both fields
    pub fn get(&self) -> ChannelParams {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Atomic replace of both fields
    pub fn set(&self, params: ChannelParams) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = params;
    }

    pub fn sampling_period_ms(&self) -> u32 {
        self.get().sampling_period_ms
    }

    pub fn batch_size(&self) -> u8 {
        self.get().batch_size
    }
}
