//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围（contract 类型上派生的 `Validate`）
//! - 设备名为 ASCII，且不含 stream 名称终止符
//! - 通道名唯一
//! - sine 周期 > 0，noise 区间非空
//! - fixed 时钟模式必须带 offset

use std::collections::HashSet;

use ::validator::Validate;
use contracts::{wire, ClockMode, NodeConfig, NodeError, SourceConfig};

/// Validate a NodeConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &NodeConfig) -> Result<(), NodeError> {
    validate_fields(config)?;
    validate_device_name(config)?;
    validate_channel_names(config)?;
    validate_sources(config)?;
    validate_clock(config)?;
    Ok(())
}

/// Derived range/length checks
fn validate_fields(config: &NodeConfig) -> Result<(), NodeError> {
    config.validate().map_err(|errors| {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "config".to_string());
        NodeError::config_validation(field, errors.to_string())
    })
}

/// The name travels verbatim in the Info frame
fn validate_device_name(config: &NodeConfig) -> Result<(), NodeError> {
    let name = &config.node.name;
    if !name.is_ascii() {
        return Err(NodeError::config_validation(
            "node.name",
            "device name must be ASCII",
        ));
    }
    if name.as_bytes().contains(&wire::NAME_TERMINATOR) {
        return Err(NodeError::config_validation(
            "node.name",
            "device name must not contain the ETX byte (0x03)",
        ));
    }
    Ok(())
}

/// Channel names unique
fn validate_channel_names(config: &NodeConfig) -> Result<(), NodeError> {
    let mut seen = HashSet::new();
    for (idx, channel) in config.channels.iter().enumerate() {
        if !seen.insert(&channel.name) {
            return Err(NodeError::config_validation(
                format!("channels[{}].name", idx),
                format!("duplicate channel name '{}'", channel.name),
            ));
        }
    }
    Ok(())
}

/// Source parameters
fn validate_sources(config: &NodeConfig) -> Result<(), NodeError> {
    for (idx, channel) in config.channels.iter().enumerate() {
        match channel.source {
            SourceConfig::Sine { period_ms, .. } if period_ms <= 0.0 => {
                return Err(NodeError::config_validation(
                    format!("channels[{}].source.period_ms", idx),
                    format!("period_ms must be > 0, got {}", period_ms),
                ));
            }
            SourceConfig::Noise { min, max } if min >= max => {
                return Err(NodeError::config_validation(
                    format!("channels[{}].source", idx),
                    format!("noise range is empty: min ({}) >= max ({})", min, max),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Clock offset source
fn validate_clock(config: &NodeConfig) -> Result<(), NodeError> {
    if config.clock.mode == ClockMode::Fixed && config.clock.fixed_offset_ms == 0 {
        return Err(NodeError::config_validation(
            "clock.fixed_offset_ms",
            "fixed clock mode requires a non-zero offset",
        ));
    }
    Ok(())
}
