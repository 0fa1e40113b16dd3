//! Core definitions and constants for ksync.
//!
//! This module contains the fixed sizes used throughout the crate:
//! - Barrier table capacity
//! - Bounded buffer capacity
//! - The sentinel returned by the call surface on failure
//!
//! Both capacities are defaults only; `Config` may override them when
//! building the services.

use std::num::NonZeroUsize;

/// Number of barrier instances that may be allocated at the same time.
pub const BARRIER_COUNT: usize = 10;

/// Number of cells in each bounded buffer.
pub const BUF_SIZE: usize = 20;

/// [`BUF_SIZE`] as a ring capacity.
pub const BUF_CAPACITY: NonZeroUsize = NonZeroUsize::MIN.saturating_add(BUF_SIZE - 1);

/// Value returned by every call of the kernel call surface that fails.
pub const SYSCALL_ERR: i64 = -1;

/// Value returned by calls of the kernel call surface that succeed without a payload.
pub const SYSCALL_OK: i64 = 0;

/// Item carried by the bounded buffers.
pub type Item = i32;
