//! Session error types

use acquisition::AcquisitionError;
use contracts::NodeError;
use thiserror::Error;

/// Errors that end a session run
///
/// Transport failures are not among them: they are absorbed by a full
/// reconnect cycle.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The sampling side is gone, nothing left to stream
    #[error("outbound queue closed")]
    QueueClosed,

    /// Invalid session setup
    #[error(transparent)]
    Node(#[from] NodeError),
}

impl From<AcquisitionError> for SessionError {
    fn from(err: AcquisitionError) -> Self {
        match err {
            AcquisitionError::QueueClosed => Self::QueueClosed,
            other => Self::Node(NodeError::Other(other.to_string())),
        }
    }
}
