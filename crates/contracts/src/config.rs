//! NodeConfig - Config Loader 的输出
//!
//! 描述完整节点：身份、采集端链路、采样节拍、keepalive 策略、
//! 时钟偏移来源以及静态通道列表。

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{ConfigProvider, TransportKind};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete node configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NodeConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Node identity
    #[validate(nested)]
    pub node: NodeIdentity,

    /// Collector link
    #[validate(nested)]
    pub server: ServerConfig,

    /// Sampling context settings
    #[serde(default)]
    #[validate(nested)]
    pub sampling: SamplingConfig,

    /// UDP keepalive policy
    #[serde(default)]
    #[validate(nested)]
    pub keepalive: KeepAliveConfig,

    /// Clock offset source
    #[serde(default)]
    pub clock: ClockConfig,

    /// Channels, id = position in this list
    #[validate(length(min = 1, max = 255))]
    #[validate(nested)]
    pub channels: Vec<ChannelConfig>,
}

/// Node identity
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NodeIdentity {
    /// Device name sent in the Info frame (ASCII)
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

/// Collector link
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Collector host name or IP
    #[validate(length(min = 1))]
    pub address: String,

    /// Collector port
    #[validate(range(min = 1))]
    pub port: u16,

    /// Link flavour
    #[serde(default)]
    pub transport: TransportKind,

    /// Pause between two failed connect attempts
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Datagram only: Info resend period while waiting for parameters
    #[serde(default = "default_info_retry_ms")]
    #[validate(range(min = 1))]
    pub info_retry_ms: u64,
}

fn default_reconnect_interval_ms() -> u64 {
    500
}

fn default_info_retry_ms() -> u64 {
    5_000
}

/// Sampling context settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SamplingConfig {
    /// Pause between two scheduler passes (>= 100 passes per second)
    #[serde(default = "default_tick_interval_us")]
    #[validate(range(min = 1, max = 10_000))]
    pub tick_interval_us: u64,

    /// Outbound queue slots per channel
    #[serde(default = "default_queue_capacity_per_channel")]
    #[validate(range(min = 1, max = 1024))]
    pub queue_capacity_per_channel: usize,
}

fn default_tick_interval_us() -> u64 {
    1_000
}

fn default_queue_capacity_per_channel() -> usize {
    10
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            tick_interval_us: default_tick_interval_us(),
            queue_capacity_per_channel: default_queue_capacity_per_channel(),
        }
    }
}

/// UDP keepalive policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KeepAliveConfig {
    /// Idle time before a KeepAlive frame, also the enable threshold for `period * batch`
    #[serde(default = "default_keepalive_threshold_ms")]
    #[validate(range(min = 1))]
    pub threshold_ms: u64,
}

fn default_keepalive_threshold_ms() -> u64 {
    15_000
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            threshold_ms: default_keepalive_threshold_ms(),
        }
    }
}

/// Clock offset source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClockConfig {
    #[serde(default)]
    pub mode: ClockMode,

    /// Used when `mode = "fixed"`
    #[serde(default)]
    pub fixed_offset_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Host wall clock minus uptime
    #[default]
    System,
    /// `fixed_offset_ms`
    Fixed,
}

/// One sampling channel
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChannelConfig {
    /// Human-readable label (logs, `info` output)
    #[validate(length(min = 1))]
    pub name: String,

    /// Read callback
    pub source: SourceConfig,
}

/// Built-in read callbacks for running without hardware
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Always the same value
    Constant { value: f64 },

    /// `start + n * step` on the n-th read
    Ramp {
        #[serde(default)]
        start: f64,
        #[serde(default = "default_ramp_step")]
        step: f64,
    },

    /// `offset + amplitude * sin(2π t / period)` of uptime
    Sine {
        #[serde(default = "default_amplitude")]
        amplitude: f64,
        period_ms: f64,
        #[serde(default)]
        offset: f64,
    },

    /// Uniform in `[min, max)`
    Noise { min: f64, max: f64 },

    /// Uptime in milliseconds
    Uptime,
}

fn default_ramp_step() -> f64 {
    1.0
}

fn default_amplitude() -> f64 {
    1.0
}

impl NodeConfig {
    /// Total outbound queue capacity
    pub fn queue_capacity(&self) -> usize {
        self.channels.len() * self.sampling.queue_capacity_per_channel
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl ConfigProvider for NodeConfig {
    fn server_address(&self) -> &str {
        &self.server.address
    }

    fn server_port(&self) -> u16 {
        self.server.port
    }

    fn device_name(&self) -> &str {
        &self.node.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> NodeConfig {
        serde_json::from_str(
            r#"{
                "node": { "name": "node-01" },
                "server": { "address": "127.0.0.1", "port": 5005 },
                "channels": [
                    { "name": "ramp", "source": { "kind": "ramp" } },
                    { "name": "temp", "source": { "kind": "sine", "period_ms": 1000.0 } }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = sample_config();
        assert_eq!(config.server.transport, TransportKind::Udp);
        assert_eq!(config.sampling.tick_interval_us, 1_000);
        assert_eq!(config.keepalive.threshold_ms, 15_000);
        assert_eq!(config.clock.mode, ClockMode::System);
        assert_eq!(config.queue_capacity(), 20);
        assert_eq!(
            config.channels[0].source,
            SourceConfig::Ramp {
                start: 0.0,
                step: 1.0
            }
        );
    }

    #[test]
    fn test_field_validation() {
        let mut config = sample_config();
        assert!(config.validate().is_ok());

        config.node.name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_provider() {
        let config = sample_config();
        assert_eq!(config.server_address(), "127.0.0.1");
        assert_eq!(config.server_port(), 5005);
        assert_eq!(config.device_name(), "node-01");
    }
}
