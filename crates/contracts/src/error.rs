//! 分层错误定义
//!
//! 按来源分类：config / params / transport / wire

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum NodeError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Parameter Errors =====
    /// Requested batch size exceeds the transport maximum (clamped, never rejected)
    #[error("batch size {requested} for channel {channel_id} exceeds maximum {max}")]
    ParameterOutOfRange {
        channel_id: u8,
        requested: u8,
        max: u8,
    },

    // ===== Transport Errors =====
    /// The link to the collector is gone
    #[error("transport '{transport}' disconnected: {message}")]
    TransportDisconnected { transport: String, message: String },

    /// Inbound frame could not be decoded
    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl NodeError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create transport disconnected error
    pub fn disconnected(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportDisconnected {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Create malformed frame error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    /// Whether this error ends the current connection epoch
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::TransportDisconnected { .. } | Self::Io(_))
    }
}
