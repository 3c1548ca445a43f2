//! OutboundMessage - Scheduler 输出，Session 输入

use bytes::Bytes;

/// Immutable snapshot of one channel's completed batch
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Connection epoch the samples were collected in
    pub epoch: u64,

    /// Channel ID
    pub channel_id: u8,

    /// Number of 12-byte records in `payload`
    pub sample_count: u8,

    /// Raw sample records, sent verbatim
    pub payload: Bytes,
}

impl OutboundMessage {
    /// Payload length in bytes
    pub fn byte_len(&self) -> usize {
        self.payload.len()
    }
}
