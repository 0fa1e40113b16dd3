//! Reusable multi-party barriers.
//!
//! A [`BarrierRegistry`] hands out ids for up to a fixed number of live
//! [`CyclicBarrier`] instances. Callers join a round of an instance with
//! `enter(id, tag, n)`; the round is released once `n` callers have joined,
//! after which the instance is ready for the next round.

pub mod cyclic;
pub mod registry;

pub use cyclic::CyclicBarrier;
pub use registry::BarrierRegistry;
