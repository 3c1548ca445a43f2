//! # Acquisition
//!
//! 采样与缓冲引擎。
//!
//! ## 职责
//! - 将读数编码进定长样本缓冲
//! - 按协商得到的周期为每个通道做门控
//! - 通过有界阻塞队列将完整批次交给 session
//! - 连接 epoch 变化时重置缓冲与队列
//!
//! ## 使用示例
//!
//! ```ignore
//! use acquisition::{outbound_queue, Scheduler, SamplingThread};
//!
//! let (producer, consumer) = outbound_queue(capacity);
//! let mut scheduler = Scheduler::new(producer, link.clone(), max_samples);
//! let params = scheduler.add_channel(Box::new(|| read_adc()))?;
//!
//! let sampling = SamplingThread::spawn(scheduler, uptime, Duration::from_millis(1))?;
//! // session 消费 `consumer` 并写入 `params`
//! ```

mod buffer;
mod channel;
mod error;
mod metrics;
mod queue;
mod sampling;
mod scheduler;
pub mod sources;

pub use buffer::SampleBuffer;
pub use channel::Channel;
pub use error::{AcquisitionError, Result};
pub use metrics::{AcquisitionMetrics, MetricsSnapshot};
pub use queue::{outbound_queue, OutboundConsumer, OutboundProducer, QueueProbe};
pub use sampling::SamplingThread;
pub use scheduler::{PassReport, Scheduler, MAX_CHANNELS};
pub use sources::build_source;
