//! Workloads that drive the kernel call surface from worker threads.
//!
//! Each workload checks its own outcome: every barrier call must return `0`,
//! and the multiset of consumed items must equal the multiset produced.

use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use crossbeam::channel::unbounded;
use ksync::def::Item;
use ksync::syscall::Syscalls;
use log::{debug, info};
use serde::Serialize;
use threadpool::ThreadPool;

use super::utils::split_work;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BufferChoice {
    Cond,
    Sem,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub workload: String,
    pub threads: usize,
    pub operations: usize,
}

/// Publishes a finished run as `ksync-bench.<workload>.*` gauges.
fn record_run(report: &RunReport, elapsed: Duration) {
    let duration_s = elapsed.as_secs_f64();
    let prefix = format!("ksync-bench.{}", report.workload);
    metrics::gauge!(format!("{}.operations", prefix)).set(report.operations as f64);
    metrics::gauge!(format!("{}.duration_s", prefix)).set(duration_s);
    if duration_s > 0.0 {
        let ops_per_sec = report.operations as f64 / duration_s;
        metrics::gauge!(format!("{}.ops_per_sec", prefix)).set(ops_per_sec);
    }
}

/// `threads` parties on each of `instances` barriers, meeting `rounds` times.
///
/// All parties must be able to run at once, so the pool is sized to hold
/// every one of them.
pub fn run_barrier(
    sys: &'static Syscalls,
    threads: usize,
    rounds: usize,
    instances: usize,
) -> Result<RunReport> {
    if threads == 0 || rounds == 0 || instances == 0 {
        bail!("threads, rounds and instances must all be at least 1");
    }
    let parties = i32::try_from(threads)?;

    let mut ids = Vec::with_capacity(instances);
    for _ in 0..instances {
        let id = sys.barrier_alloc();
        if id < 0 {
            for id in ids {
                sys.barrier_free(id);
            }
            bail!("Barrier table exhausted while allocating {} instances", instances);
        }
        ids.push(id as i32);
    }
    debug!("allocated barriers {:?}", ids);

    let pool = ThreadPool::new(threads * instances);
    let (tx, rx) = unbounded();
    let start = Instant::now();
    for &id in &ids {
        for _ in 0..threads {
            let tx = tx.clone();
            pool.execute(move || {
                let failures = (0..rounds)
                    .filter(|&round| sys.barrier(round as i32, id, parties) != 0)
                    .count();
                let _ = tx.send(failures);
            });
        }
    }
    drop(tx);
    pool.join();
    let elapsed = start.elapsed();

    for &id in &ids {
        sys.barrier_free(id);
    }
    if pool.panic_count() > 0 {
        bail!("{} barrier workers panicked", pool.panic_count());
    }
    let failures: usize = rx.iter().sum();
    if failures > 0 {
        bail!("{} barrier calls failed", failures);
    }

    let report = RunReport {
        workload: "barrier".to_string(),
        threads: threads * instances,
        operations: threads * instances * rounds,
    };
    record_run(&report, elapsed);
    info!(
        "{} rounds on {} barriers of {} parties in {:.1?}",
        rounds, instances, threads, elapsed
    );
    Ok(report)
}

/// Moves `items` distinct values from `producers` to `consumers` through one buffer.
pub fn run_prodcons(
    sys: &'static Syscalls,
    choice: BufferChoice,
    producers: usize,
    consumers: usize,
    items: usize,
) -> Result<RunReport> {
    if producers == 0 || consumers == 0 {
        bail!("producers and consumers must both be at least 1");
    }
    if items > Item::MAX as usize {
        bail!("items must fit in an {}-bit item", Item::BITS);
    }

    let (produce, consume): (fn(&Syscalls, Item) -> i64, fn(&Syscalls) -> i64) = match choice {
        BufferChoice::Cond => {
            sys.buffer_cond_init();
            (Syscalls::cond_produce, Syscalls::cond_consume)
        }
        BufferChoice::Sem => {
            sys.buffer_sem_init();
            (Syscalls::sem_produce, Syscalls::sem_consume)
        }
    };

    let pool = ThreadPool::new(producers + consumers);
    let (tx, rx) = unbounded();
    let start = Instant::now();

    let mut next = 0;
    for count in split_work(items, producers) {
        let first = next;
        next += count;
        pool.execute(move || {
            for v in first..first + count {
                produce(sys, v as Item);
            }
        });
    }
    for count in split_work(items, consumers) {
        let tx = tx.clone();
        pool.execute(move || {
            for _ in 0..count {
                let _ = tx.send(consume(sys));
            }
        });
    }
    drop(tx);
    pool.join();
    let elapsed = start.elapsed();

    if pool.panic_count() > 0 {
        bail!("{} buffer workers panicked", pool.panic_count());
    }
    let mut got: Vec<i64> = rx.iter().collect();
    got.sort_unstable();
    let expected: Vec<i64> = (0..items as i64).collect();
    if got != expected {
        bail!(
            "Consumed items differ from produced items ({} consumed, {} produced)",
            got.len(),
            items
        );
    }

    let workload = match choice {
        BufferChoice::Cond => "cond-prodcons",
        BufferChoice::Sem => "sem-prodcons",
    };
    info!(
        "{}: {} items, {} producers, {} consumers in {:.1?}",
        workload, items, producers, consumers, elapsed
    );
    let report = RunReport {
        workload: workload.to_string(),
        threads: producers + consumers,
        operations: items * 2,
    };
    record_run(&report, elapsed);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::utils::MetricsRecorder;
    use ksync::config::Config;
    use ksync::trace::NullTrace;
    use std::sync::Arc;

    fn leaked_syscalls(config: Config) -> &'static Syscalls {
        Box::leak(Box::new(
            Syscalls::new(&config, Arc::new(NullTrace)).unwrap(),
        ))
    }

    #[test]
    fn test_barrier_workload() {
        let sys = leaked_syscalls(Config::new(4, 8));
        let (metrics, report) = MetricsRecorder::scoped(|| run_barrier(sys, 3, 5, 2));
        assert_eq!(report.unwrap().operations, 30);
        assert!(sys.barriers().allocated().is_empty());

        let values = metrics.snapshot_values();
        assert_eq!(values["ksync-bench.barrier.operations"], 30.0);
        assert!(values["ksync-bench.barrier.duration_s"] > 0.0);
        assert!(values["ksync-bench.barrier.ops_per_sec"] > 0.0);
    }

    #[test]
    fn test_barrier_workload_exhausts_table() {
        let sys = leaked_syscalls(Config::new(1, 8));
        let (metrics, result) = MetricsRecorder::scoped(|| run_barrier(sys, 2, 1, 2));
        assert!(result.is_err());
        assert!(sys.barriers().allocated().is_empty());
        assert!(metrics.snapshot_values().is_empty());
    }

    #[test]
    fn test_prodcons_workloads() {
        let sys = leaked_syscalls(Config::new(1, 4));
        let cond = run_prodcons(sys, BufferChoice::Cond, 3, 2, 101).unwrap();
        assert_eq!(cond.workload, "cond-prodcons");
        let (metrics, sem) =
            MetricsRecorder::scoped(|| run_prodcons(sys, BufferChoice::Sem, 2, 3, 101));
        assert_eq!(sem.unwrap().operations, 202);
        let values = metrics.snapshot_values();
        assert_eq!(values["ksync-bench.sem-prodcons.operations"], 202.0);
        assert!(!values.contains_key("ksync-bench.cond-prodcons.operations"));
    }

    #[test]
    fn test_prodcons_rejects_missing_role() {
        let sys = leaked_syscalls(Config::new(1, 4));
        assert!(run_prodcons(sys, BufferChoice::Sem, 0, 1, 5).is_err());
    }
}
