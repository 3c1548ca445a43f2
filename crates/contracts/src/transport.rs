//! Transport trait - Session 输出接口
//!
//! 一种能力，两种实现（TCP stream、UDP datagram）。
//! 协议状态机只针对该 trait 编写一次。

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::NodeError;

/// Link flavour, decides framing and the per-message sample limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Connection-oriented byte stream
    Tcp,
    /// Connectionless datagrams
    #[default]
    Udp,
}

impl TransportKind {
    /// Hard maximum of samples per SensorSamples frame
    pub fn max_samples_per_message(self) -> u8 {
        match self {
            Self::Tcp => 89,
            // 3-byte header + 121 * 12 = 1455 bytes, fits one Ethernet MTU datagram
            Self::Udp => 121,
        }
    }

    /// Whether frames are self-delimiting datagrams
    pub fn is_datagram(self) -> bool {
        matches!(self, Self::Udp)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransportKind {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(NodeError::config_validation(
                "server.transport",
                format!("unknown transport '{other}'"),
            )),
        }
    }
}

/// Link to the collector
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Framing family
    fn kind(&self) -> TransportKind;

    /// Whether `connect` succeeded and no failure was seen since
    fn is_connected(&self) -> bool;

    /// Open the link. Datagram transports only bind and set the peer.
    async fn connect(&mut self) -> Result<(), NodeError>;

    /// Write one complete frame
    ///
    /// # Errors
    /// `TransportDisconnected` or `Io` end the connection epoch
    async fn send(&mut self, frame: &[u8]) -> Result<(), NodeError>;

    /// Next inbound chunk: one datagram, or whatever bytes a stream read returned.
    /// Must be cancel-safe.
    async fn receive(&mut self) -> Result<Bytes, NodeError>;

    /// Drop the link
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_maxima() {
        assert_eq!(TransportKind::Tcp.max_samples_per_message(), 89);
        assert_eq!(TransportKind::Udp.max_samples_per_message(), 121);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("TCP".parse::<TransportKind>().unwrap(), TransportKind::Tcp);
        assert_eq!("udp".parse::<TransportKind>().unwrap(), TransportKind::Udp);
        assert!("serial".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&TransportKind::Tcp).unwrap();
        assert_eq!(json, "\"tcp\"");
    }
}
