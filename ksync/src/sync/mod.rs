//! Blocking primitives the services are built from.
//!
//! Sleeping locks and condition variables are `parking_lot::Mutex` and
//! `parking_lot::Condvar`. The counting semaphore lives here.

pub mod semaphore;

pub use semaphore::{Semaphore, SemaphorePermit};
