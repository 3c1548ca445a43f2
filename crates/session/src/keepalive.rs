//! KeepAlive 策略（仅 datagram 链路）

use std::time::Duration;

use contracts::ChannelParams;

/// 决定空闲时是否需要发送 KeepAlive 帧
///
/// 初始为开启。参数确定后，只有当某个通道填满一个批次的时间超过阈值时才保持开启。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlivePolicy {
    enabled: bool,
    threshold_ms: u64,
}

impl KeepAlivePolicy {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            enabled: true,
            threshold_ms,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Idle time before a KeepAlive frame is due
    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms)
    }

    /// Re-evaluate over all channels, returns the new state
    pub fn recompute(&mut self, params: impl IntoIterator<Item = ChannelParams>) -> bool {
        self.enabled = params
            .into_iter()
            .any(|p| p.batch_span_ms() > self.threshold_ms);
        self.enabled
    }
}
