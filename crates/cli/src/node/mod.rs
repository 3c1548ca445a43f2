//! 节点编排 - 将采样线程与网络 session 连接起来

mod runner;

pub use runner::{collector_addr, NodeOptions, NodeRunner};
