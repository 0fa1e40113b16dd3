//! Bounded producer/consumer buffers.
//!
//! Two rings with the same interface and different coordination:
//! - [`SlotBuffer`]: per-slot lock plus `inserted`/`deleted` condition variables
//! - [`SemBuffer`]: `empty`/`full` counting semaphores plus one binary semaphore per role
//!
//! Both report every consumed item to their trace sink under a print lock that
//! is separate from the data path.

pub mod sem_buffer;
pub mod slot_buffer;

pub use sem_buffer::SemBuffer;
pub use slot_buffer::SlotBuffer;
