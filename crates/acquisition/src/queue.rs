//! Outbound Queue - 两个执行上下文之间的有界 SPSC 交接
//!
//! 队列满时 producer 阻塞（背压，不丢弃），consumer 异步等待。
//! 重置时两端都可以清空队列。

use async_channel::{bounded, Receiver, Sender, TryRecvError};
use contracts::OutboundMessage;

use crate::error::{AcquisitionError, Result};

/// 创建最多容纳 `capacity` 条消息的队列
pub fn outbound_queue(capacity: usize) -> (OutboundProducer, OutboundConsumer) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        OutboundProducer {
            tx,
            drain_rx: rx.clone(),
        },
        OutboundConsumer { rx },
    )
}

/// 采样上下文一端
#[derive(Debug)]
pub struct OutboundProducer {
    tx: Sender<OutboundMessage>,
    /// Lets the scheduler empty the queue on reset
    drain_rx: Receiver<OutboundMessage>,
}

impl OutboundProducer {
    /// 入队，队列满时阻塞调用线程
    ///
    /// 不能在 async runtime 内部调用。
    pub fn push_blocking(&self, message: OutboundMessage) -> Result<()> {
        self.tx
            .send_blocking(message)
            .map_err(|_| AcquisitionError::QueueClosed)
    }

    /// Discard all queued messages, returns how many were dropped
    pub fn drain(&self) -> usize {
        drain(&self.drain_rx)
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Fill-level view for monitoring
    pub fn probe(&self) -> QueueProbe {
        QueueProbe {
            rx: self.drain_rx.clone(),
        }
    }
}

/// Read-only view of the queue fill level
#[derive(Debug, Clone)]
pub struct QueueProbe {
    rx: Receiver<OutboundMessage>,
}

impl QueueProbe {
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(0)
    }
}

/// Session 上下文一端
///
/// drop 时关闭队列，阻塞中的 producer 随之返回并停止。
#[derive(Debug)]
pub struct OutboundConsumer {
    rx: Receiver<OutboundMessage>,
}

impl OutboundConsumer {
    /// Wait for the next message. Cancel-safe.
    ///
    /// # Errors
    /// `QueueClosed` once the producer is gone and the queue is empty.
    pub async fn recv(&self) -> Result<OutboundMessage> {
        self.rx.recv().await.map_err(|_| AcquisitionError::QueueClosed)
    }

    /// Next message if one is ready
    pub fn try_recv(&self) -> Result<Option<OutboundMessage>> {
        match self.rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(AcquisitionError::QueueClosed),
        }
    }

    /// Discard all queued messages, returns how many were dropped
    pub fn drain(&self) -> usize {
        drain(&self.rx)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Producer gone or queue closed
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Close the queue from the consumer side
    pub fn close(&self) {
        self.rx.close();
    }
}

impl Drop for OutboundConsumer {
    fn drop(&mut self) {
        self.rx.close();
    }
}

fn drain(rx: &Receiver<OutboundMessage>) -> usize {
    let mut dropped = 0;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}
