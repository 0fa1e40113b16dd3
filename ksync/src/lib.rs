//! # ksync
//!
//! Kernel-style synchronization services for cooperating threads:
//!
//! - [`barrier`]: a registry of up to `BARRIER_COUNT` reusable barriers.
//!   `enter(id, tag, n)` blocks until `n` callers have joined the round.
//! - [`buffer::SlotBuffer`]: a bounded ring where every slot has its own lock
//!   and `inserted`/`deleted` condition variables, so producers and consumers
//!   only ever wait on the slot they claimed.
//! - [`buffer::SemBuffer`]: a bounded ring guarded by `empty`/`full` counting
//!   semaphores and one binary semaphore per role.
//!
//! [`syscall`] exposes the three services as integer-returning calls on
//! process-wide instances, reporting failures with a single `-1` sentinel.
//! Observable output (barrier entry/release lines, consumed items) goes through
//! a [`trace::TraceSink`].
//!
//! None of the waits has a deadline except the explicit `*_timeout` variants.
//! A caller that waits with no matching counterpart blocks forever.

pub mod barrier;
pub mod buffer;
pub mod config;
pub mod def;
pub mod error;
pub mod sync;
pub mod syscall;
pub mod trace;

pub use barrier::{BarrierRegistry, CyclicBarrier};
pub use buffer::{SemBuffer, SlotBuffer};
pub use config::Config;
pub use error::SyncError;
