use std::iter::repeat_with;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::Mutex;

use super::cyclic::CyclicBarrier;
use crate::error::{Result, SyncError};
use crate::trace::TraceSink;

/// Fixed-capacity table of barrier instances.
///
/// An id is live from the `allocate` that returned it until the matching
/// `free`. Scanning for a free entry and marking it happen under one lock, so
/// two allocations can never return the same live id. Every allocation gets a
/// fresh [`CyclicBarrier`], so a reused id starts with an empty round.
pub struct BarrierRegistry {
    table: Mutex<Vec<Option<Arc<CyclicBarrier>>>>,
    sink: Arc<dyn TraceSink>,
}

impl BarrierRegistry {
    pub fn new(capacity: usize, sink: Arc<dyn TraceSink>) -> Self {
        let table = repeat_with(|| None).take(capacity).collect();
        Self {
            table: Mutex::new(table),
            sink,
        }
    }

    pub fn capacity(&self) -> usize {
        self.table.lock().len()
    }

    /// Claims the lowest free id.
    pub fn allocate(&self) -> Result<usize> {
        let mut table = self.table.lock();
        let capacity = table.len();
        let id = table
            .iter()
            .position(Option::is_none)
            .ok_or(SyncError::ResourceExhausted { capacity })?;
        table[id] = Some(Arc::new(CyclicBarrier::new(id)));
        debug!("barrier {} allocated", id);
        Ok(id)
    }

    /// Joins a round of barrier `id`, blocking until `n` callers have joined.
    pub fn enter(&self, id: usize, tag: i32, n: usize) -> Result<()> {
        let barrier = self.lookup(id)?;
        barrier.enter(tag, n, &*self.sink)
    }

    /// Like [`enter`](Self::enter), bounded by `timeout`.
    pub fn enter_timeout(&self, id: usize, tag: i32, n: usize, timeout: Duration) -> Result<()> {
        let barrier = self.lookup(id)?;
        barrier.enter_until(tag, n, Instant::now() + timeout, &*self.sink)
    }

    /// Releases id `id` for reuse.
    ///
    /// Callers still parked in the instance are not woken; the caller of
    /// `free` must make sure there are none.
    pub fn free(&self, id: usize) -> Result<()> {
        let mut table = self.table.lock();
        let entry = Self::entry_mut(&mut table, id)?;
        if let Some(barrier) = entry.take() {
            if barrier.waiting() > 0 {
                debug!(
                    "barrier {} freed with {} callers still parked",
                    id,
                    barrier.waiting()
                );
            }
        }
        debug!("barrier {} freed", id);
        Ok(())
    }

    /// Number of callers parked in the open round of `id`.
    pub fn waiting(&self, id: usize) -> Result<usize> {
        Ok(self.lookup(id)?.waiting())
    }

    pub fn is_allocated(&self, id: usize) -> bool {
        matches!(self.table.lock().get(id), Some(Some(_)))
    }

    /// Live ids in ascending order.
    pub fn allocated(&self) -> Vec<usize> {
        self.table
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(id, entry)| entry.as_ref().map(|_| id))
            .collect()
    }

    fn lookup(&self, id: usize) -> Result<Arc<CyclicBarrier>> {
        let mut table = self.table.lock();
        let entry = Self::entry_mut(&mut table, id)?;
        entry.clone().ok_or_else(|| not_allocated(id))
    }

    fn entry_mut(
        table: &mut [Option<Arc<CyclicBarrier>>],
        id: usize,
    ) -> Result<&mut Option<Arc<CyclicBarrier>>> {
        let capacity = table.len();
        let entry = table.get_mut(id).ok_or_else(|| {
            SyncError::InvalidArgument(format!(
                "barrier id {} out of range 0..{}",
                id, capacity
            ))
        })?;
        if entry.is_none() {
            return Err(not_allocated(id));
        }
        Ok(entry)
    }
}

fn not_allocated(id: usize) -> SyncError {
    SyncError::PreconditionViolation(format!("barrier {} is not allocated", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::NullTrace;
    use std::collections::HashSet;
    use std::thread;

    fn registry(capacity: usize) -> BarrierRegistry {
        BarrierRegistry::new(capacity, Arc::new(NullTrace))
    }

    #[test]
    fn test_allocate_lowest_free() {
        let reg = registry(10);
        assert_eq!(reg.allocate().unwrap(), 0);
        assert_eq!(reg.allocate().unwrap(), 1);
        reg.free(0).unwrap();
        assert_eq!(reg.allocate().unwrap(), 0);
        assert_eq!(reg.allocated(), vec![0, 1]);
    }

    #[test]
    fn test_exhaustion() {
        let reg = registry(3);
        for i in 0..3 {
            assert_eq!(reg.allocate().unwrap(), i);
        }
        assert_eq!(
            reg.allocate(),
            Err(SyncError::ResourceExhausted { capacity: 3 })
        );
        reg.free(1).unwrap();
        assert_eq!(reg.allocate().unwrap(), 1);
    }

    #[test]
    fn test_unallocated_ids_rejected() {
        let reg = registry(4);
        assert!(matches!(reg.free(2), Err(SyncError::PreconditionViolation(_))));
        assert!(matches!(
            reg.enter(2, 0, 1),
            Err(SyncError::PreconditionViolation(_))
        ));
        assert!(matches!(reg.free(4), Err(SyncError::InvalidArgument(_))));
        assert!(matches!(
            reg.enter(99, 0, 1),
            Err(SyncError::InvalidArgument(_))
        ));
        let id = reg.allocate().unwrap();
        reg.free(id).unwrap();
        assert!(matches!(
            reg.free(id),
            Err(SyncError::PreconditionViolation(_))
        ));
        assert!(!reg.is_allocated(id));
    }

    #[test]
    fn test_concurrent_allocations_unique() {
        let reg = Arc::new(registry(10));
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let reg = reg.clone();
                thread::spawn(move || reg.allocate().unwrap())
            })
            .collect();
        let ids: HashSet<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 10);
        assert!(reg.allocate().is_err());
    }

    #[test]
    fn test_instances_do_not_share_counters() {
        let reg = Arc::new(registry(10));
        let a = reg.allocate().unwrap();
        let b = reg.allocate().unwrap();
        // one caller parked on `a` must not count toward `b`
        let parked = {
            let reg = reg.clone();
            thread::spawn(move || reg.enter(a, 1, 2))
        };
        while reg.waiting(a).unwrap() == 0 {
            thread::yield_now();
        }
        let helper = {
            let reg = reg.clone();
            thread::spawn(move || reg.enter(b, 2, 2))
        };
        reg.enter(b, 2, 2).unwrap();
        helper.join().unwrap().unwrap();
        assert_eq!(reg.waiting(a).unwrap(), 1);
        assert_eq!(reg.waiting(b).unwrap(), 0);
        reg.enter(a, 1, 2).unwrap();
        parked.join().unwrap().unwrap();
    }

    #[test]
    fn test_reallocated_id_starts_empty() {
        let reg = registry(2);
        let id = reg.allocate().unwrap();
        assert_eq!(
            reg.enter_timeout(id, 0, 2, Duration::from_millis(10)),
            Err(SyncError::TimedOut)
        );
        reg.free(id).unwrap();
        assert_eq!(reg.allocate().unwrap(), id);
        assert_eq!(reg.waiting(id).unwrap(), 0);
    }
}
