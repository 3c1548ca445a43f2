//! Sample - 采集的基本单元
//!
//! 线上与内存中一个样本均为 12 字节：`u32` 运行毫秒数，
//! 随后是 IEEE-754 `f64`，均为小端，无填充。

use serde::{Deserialize, Serialize};

/// Encoded size of one sample record
pub const SAMPLE_SIZE: usize = 12;

const TIMESTAMP_SIZE: usize = 4;

/// A single reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Milliseconds since device boot (not wall-clock)
    pub timestamp_ms: u32,

    /// Raw reading
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp_ms: u32, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }

    /// Encode into a 12-byte record
    pub fn to_bytes(&self) -> [u8; SAMPLE_SIZE] {
        let mut record = [0u8; SAMPLE_SIZE];
        record[..TIMESTAMP_SIZE].copy_from_slice(&self.timestamp_ms.to_le_bytes());
        record[TIMESTAMP_SIZE..].copy_from_slice(&self.value.to_le_bytes());
        record
    }

    /// Decode one record, `None` if fewer than 12 bytes are given
    pub fn from_bytes(record: &[u8]) -> Option<Self> {
        if record.len() < SAMPLE_SIZE {
            return None;
        }
        let mut ts = [0u8; TIMESTAMP_SIZE];
        ts.copy_from_slice(&record[..TIMESTAMP_SIZE]);
        let mut value = [0u8; 8];
        value.copy_from_slice(&record[TIMESTAMP_SIZE..SAMPLE_SIZE]);
        Some(Self {
            timestamp_ms: u32::from_le_bytes(ts),
            value: f64::from_le_bytes(value),
        })
    }

    /// Decode back-to-back records. A trailing partial record is ignored.
    pub fn decode_all(payload: &[u8]) -> Vec<Self> {
        payload
            .chunks_exact(SAMPLE_SIZE)
            .filter_map(Self::from_bytes)
            .collect()
    }

    /// Absolute unix time in milliseconds given the node's clock offset
    pub fn unix_time_ms(&self, clock_offset_ms: u64) -> u64 {
        clock_offset_ms + u64::from(self.timestamp_ms)
    }
}
