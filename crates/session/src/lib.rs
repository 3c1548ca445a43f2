//! # Session
//!
//! 传感器节点的网络会话。
//!
//! ## 职责
//! - 发布节点信息并协商通道参数
//! - 将发送队列写到线上
//! - 响应服务端请求，保持空闲 datagram 链路存活
//! - 任何传输失败都重置连接 epoch
//!
//! 状态机只针对 `contracts::Transport` 编写一次，TCP 与 UDP
//! 仅在 transport 与分帧上不同。

pub mod codec;
pub mod error;
pub mod keepalive;
pub mod metrics;
pub mod mock;
pub mod session;
pub mod state;
pub mod tcp;
pub mod udp;

pub use codec::{ClientFrame, ClientStreamDecoder, Codec, NodeInfo, ServerDecoder, ServerFrame};
pub use contracts::{Transport, TransportKind};
pub use error::SessionError;
pub use keepalive::KeepAlivePolicy;
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use mock::{mock_link, MockPeer, MockTransport};
pub use session::{Session, SessionBuilder, SessionConfig};
pub use state::SessionState;
pub use tcp::{TcpTransport, DEFAULT_CONNECT_TIMEOUT};
pub use udp::UdpTransport;
