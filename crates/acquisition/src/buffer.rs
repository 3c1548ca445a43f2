//! SampleBuffer - 定长的样本编码缓冲
//!
//! 底层字节即线上 payload，取出一个批次只需一次拷贝。

use contracts::{Sample, SAMPLE_SIZE};

use crate::error::{AcquisitionError, Result};

/// 12 字节样本记录的定长缓冲
#[derive(Debug)]
pub struct SampleBuffer {
    data: Box<[u8]>,
    cursor: usize,
    count: u8,
}

impl SampleBuffer {
    /// Create a buffer holding at most `max_samples` records
    pub fn new(max_samples: u8) -> Self {
        Self {
            data: vec![0u8; usize::from(max_samples) * SAMPLE_SIZE].into_boxed_slice(),
            cursor: 0,
            count: 0,
        }
    }

    /// 追加一条记录
    ///
    /// # Errors
    /// 空间不足时返回 `BufferFull`，缓冲保持不变。
    pub fn write(&mut self, timestamp_ms: u32, value: f64) -> Result<()> {
        let end = self.cursor + SAMPLE_SIZE;
        if end > self.data.len() {
            return Err(AcquisitionError::BufferFull {
                capacity: self.capacity(),
            });
        }
        self.data[self.cursor..end].copy_from_slice(&Sample::new(timestamp_ms, value).to_bytes());
        self.cursor = end;
        self.count += 1;
        Ok(())
    }

    /// Forget all records; the backing memory is not zeroed
    pub fn clear(&mut self) {
        self.cursor = 0;
        self.count = 0;
    }

    pub fn sample_count(&self) -> u8 {
        self.count
    }

    pub fn byte_size(&self) -> usize {
        self.cursor
    }

    /// Encoded records written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.cursor]
    }

    /// Capacity in samples
    pub fn capacity(&self) -> u8 {
        (self.data.len() / SAMPLE_SIZE) as u8
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.cursor + SAMPLE_SIZE > self.data.len()
    }

    /// Decode the record at `index`
    pub fn sample(&self, index: u8) -> Option<Sample> {
        if index >= self.count {
            return None;
        }
        let start = usize::from(index) * SAMPLE_SIZE;
        Sample::from_bytes(&self.data[start..start + SAMPLE_SIZE])
    }

    /// Decode all records in write order
    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.as_bytes()
            .chunks_exact(SAMPLE_SIZE)
            .filter_map(Sample::from_bytes)
    }
}
