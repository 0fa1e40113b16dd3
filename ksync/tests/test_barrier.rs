use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ksync::trace::{MemoryTrace, NullTrace, TraceEvent};
use ksync::{BarrierRegistry, SyncError};
use parking_lot::Mutex;

#[test]
fn test_release_only_after_all_parties() {
    const PARTIES: usize = 5;
    const ROUNDS: usize = 20;
    let reg = Arc::new(BarrierRegistry::new(10, Arc::new(NullTrace)));
    let id = reg.allocate().unwrap();
    let arrived = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..PARTIES)
        .map(|_| {
            let reg = reg.clone();
            let arrived = arrived.clone();
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    arrived.fetch_add(1, Ordering::SeqCst);
                    reg.enter(id, round as i32, PARTIES).unwrap();
                    // everyone of this round has arrived before anyone leaves
                    assert!(arrived.load(Ordering::SeqCst) >= (round + 1) * PARTIES);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(arrived.load(Ordering::SeqCst), PARTIES * ROUNDS);
    assert_eq!(reg.waiting(id).unwrap(), 0);
}

#[test]
fn test_concurrent_instances_keep_separate_rounds() {
    let trace = Arc::new(MemoryTrace::new());
    let reg = Arc::new(BarrierRegistry::new(10, trace.clone()));
    let ids: Vec<usize> = (0..3).map(|_| reg.allocate().unwrap()).collect();

    let mut handles = Vec::new();
    for (k, &id) in ids.iter().enumerate() {
        let parties = k + 2;
        for _ in 0..parties {
            let reg = reg.clone();
            handles.push(thread::spawn(move || {
                for round in 0..10 {
                    reg.enter(id, round, parties).unwrap();
                }
            }));
        }
    }
    for h in handles {
        h.join().unwrap();
    }
    for (k, &id) in ids.iter().enumerate() {
        let released = trace
            .events()
            .iter()
            .filter(|e| matches!(e, TraceEvent::BarrierReleased { id: i, .. } if *i == id))
            .count();
        assert_eq!(released, (k + 2) * 10);
        assert_eq!(reg.waiting(id).unwrap(), 0);
    }
}

#[test]
fn test_live_ids_unique_under_churn() {
    let reg = Arc::new(BarrierRegistry::new(10, Arc::new(NullTrace)));
    let live = Arc::new(Mutex::new(HashSet::new()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let reg = reg.clone();
            let live = live.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let id = match reg.allocate() {
                        Ok(id) => id,
                        Err(SyncError::ResourceExhausted { .. }) => continue,
                        Err(e) => panic!("unexpected error {}", e),
                    };
                    assert!(live.lock().insert(id), "id {} handed out twice", id);
                    thread::yield_now();
                    assert!(live.lock().remove(&id));
                    reg.free(id).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert!(reg.allocated().is_empty());
}

#[test]
fn test_lone_party_times_out() {
    let reg = BarrierRegistry::new(1, Arc::new(NullTrace));
    let id = reg.allocate().unwrap();
    assert_eq!(
        reg.enter_timeout(id, 0, 3, Duration::from_millis(20)),
        Err(SyncError::TimedOut)
    );
    assert_eq!(reg.waiting(id).unwrap(), 0);
}
