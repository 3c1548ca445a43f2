//! # Contracts
//!
//! 传感器节点各 crate 共享的冻结接口契约。
//! 业务 crate 只依赖本 crate，禁止反向依赖。
//!
//! ## 时间模型
//! - 样本携带相对时间戳：设备运行毫秒数（`u32`，回绕）
//! - 采集端使用 Info 帧中一次性发送的时钟偏移换算为墙钟时间
//!
//! ## 数据流
//! - 样本：`SampleSource` → `SampleBuffer` → `OutboundMessage` → `Transport`
//! - 配置：`Transport` → Session → `SharedParams`

mod clock;
mod config;
mod error;
mod link;
mod message;
mod params;
mod sample;
mod source;
mod transport;
pub mod wire;

pub use clock::{ClockOffsetSource, FixedClockOffset, SystemClockOffset, Uptime};
pub use config::*;
pub use error::*;
pub use link::LinkStatus;
pub use message::OutboundMessage;
pub use params::{ChannelParams, SharedParams};
pub use sample::{Sample, SAMPLE_SIZE};
pub use source::{ConfigProvider, SampleSource};
pub use transport::{LocalTransport, Transport, TransportKind};
