//! Acquisition error types

use thiserror::Error;

/// Acquisition errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AcquisitionError {
    /// Sample buffer has no room left, the sample is dropped
    #[error("sample buffer full ({capacity} samples), sample dropped")]
    BufferFull {
        /// Buffer capacity in samples
        capacity: u8,
    },

    /// The session side of the outbound queue is gone
    #[error("outbound queue closed")]
    QueueClosed,

    /// Channel ids are a single byte on the wire
    #[error("too many channels, at most {max} supported")]
    TooManyChannels {
        /// Maximum channel count
        max: usize,
    },
}

/// Acquisition Result type alias
pub type Result<T> = std::result::Result<T, AcquisitionError>;
