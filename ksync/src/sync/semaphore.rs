//! Counting semaphore.
//!
//! A semaphore maintains a count of available permits. [`Semaphore::wait`]
//! blocks while the count is zero and then takes one permit;
//! [`Semaphore::post`] returns a permit and wakes one blocked waiter, if any.
//!
//! The semaphore is built from a `parking_lot::Mutex` guarding the count and a
//! `parking_lot::Condvar` for the sleeping waiters. Wake order among waiters is
//! whatever the condition variable gives us; callers must only rely on
//! liveness.
//!
//! A semaphore initialized with one permit is used as a sleeping mutex. For
//! that use [`Semaphore::acquire`] returns a [`SemaphorePermit`] which posts
//! the permit back when dropped.

use parking_lot::{Condvar, Mutex};
use std::time::Instant;

pub struct Semaphore {
    permits: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    /// Creates a semaphore holding `permits` permits.
    pub const fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            cond: Condvar::new(),
        }
    }

    /// Resets the count to `permits`.
    ///
    /// Must not race with threads blocked in [`wait`](Self::wait); the
    /// buffers only call it from their own `init`.
    pub fn init(&self, permits: usize) {
        *self.permits.lock() = permits;
    }

    /// Blocks until a permit is available, then takes it.
    pub fn wait(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.cond.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Like [`wait`](Self::wait), but gives up at `deadline`.
    ///
    /// Returns `true` if a permit was taken.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            if self.cond.wait_until(&mut permits, deadline).timed_out() && *permits == 0 {
                return false;
            }
        }
        *permits -= 1;
        true
    }

    /// Returns one permit and wakes one waiter.
    pub fn post(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        self.cond.notify_one();
    }

    /// Waits for a permit and returns a guard that posts it back on drop.
    pub fn acquire(&self) -> SemaphorePermit<'_> {
        self.wait();
        SemaphorePermit { sema: self }
    }

    /// Number of permits currently available.
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}

/// An RAII permit; the semaphore is posted when this structure is dropped.
///
/// This structure is created by [`Semaphore::acquire`].
pub struct SemaphorePermit<'a> {
    sema: &'a Semaphore,
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        self.sema.post();
    }
}
