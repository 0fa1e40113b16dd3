//! Configuration for the ksync services.
//!
//! The configuration only carries sizes:
//! - `barrier_count`: number of barrier slots in the registry (default: 10)
//! - `buffer_size`: number of cells in each bounded buffer (default: 20)
//!
//! # Usage Examples
//! ```
//! use ksync::config::Config;
//!
//! let config = Config::default();
//! assert_eq!(config.barrier_count, 10);
//!
//! let small = Config::new(2, 4);
//! assert_eq!(small.buffer_size, 4);
//! ```

use std::num::NonZeroUsize;

use crate::def::{BARRIER_COUNT, BUF_SIZE};
use crate::error::{Result, SyncError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of barrier instances allocated at once.
    pub barrier_count: usize,
    /// Capacity of the slot buffer and of the semaphore buffer.
    pub buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            barrier_count: BARRIER_COUNT,
            buffer_size: BUF_SIZE,
        }
    }
}

impl Config {
    pub fn new(barrier_count: usize, buffer_size: usize) -> Self {
        Self {
            barrier_count,
            buffer_size,
        }
    }

    /// Rejects zero-sized tables; every ring needs at least one cell.
    pub fn validate(&self) -> Result<()> {
        if self.barrier_count == 0 {
            return Err(SyncError::InvalidArgument(
                "barrier_count must be at least 1".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(SyncError::InvalidArgument(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// `buffer_size` as the capacity the buffer constructors take.
    pub fn buffer_capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.buffer_size).ok_or_else(|| {
            SyncError::InvalidArgument("buffer_size must be at least 1".to_string())
        })
    }
}
