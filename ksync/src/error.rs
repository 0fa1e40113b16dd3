use thiserror::Error;

use crate::def::SYSCALL_ERR;

/// Errors reported by the barrier registry and the bounded buffers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Resource exhausted: all {capacity} barrier slots are allocated")]
    ResourceExhausted { capacity: usize },

    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("Timed out while waiting")]
    TimedOut,
}

impl SyncError {
    /// The single undistinguished value the call surface reports for any failure.
    pub fn sentinel(&self) -> i64 {
        SYSCALL_ERR
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
