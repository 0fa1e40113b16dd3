//! Kernel call surface.
//!
//! Every call takes raw integer arguments, blocks the caller as long as the
//! underlying service requires, and returns one integer: the payload (`0`, a
//! barrier id or a consumed item) or the sentinel `-1`. The typed error never
//! reaches the caller; its text goes to the trace as a `Diagnostic` event and
//! to the log.
//!
//! [`Syscalls`] bundles one barrier registry, one slot buffer and one
//! semaphore buffer. The free functions (`sys_*`) operate on the process-wide
//! instance, which is built with the default sizes from `def` and reports to the sink
//! installed with [`set_trace_sink`] (the log by default).

use std::sync::Arc;

use lazy_static::lazy_static;
use log::warn;
use parking_lot::RwLock;

use crate::barrier::BarrierRegistry;
use crate::buffer::{SemBuffer, SlotBuffer};
use crate::config::Config;
use crate::def::{Item, BARRIER_COUNT, BUF_CAPACITY, SYSCALL_OK};
use crate::error::{Result, SyncError};
use crate::trace::{LogTrace, TraceEvent, TraceSink};

pub struct Syscalls {
    barriers: BarrierRegistry,
    slot_buffer: SlotBuffer,
    sem_buffer: SemBuffer,
    sink: Arc<dyn TraceSink>,
}

impl Syscalls {
    pub fn new(config: &Config, sink: Arc<dyn TraceSink>) -> Result<Self> {
        config.validate()?;
        let capacity = config.buffer_capacity()?;
        Ok(Self {
            barriers: BarrierRegistry::new(config.barrier_count, sink.clone()),
            slot_buffer: SlotBuffer::new(capacity, sink.clone()),
            sem_buffer: SemBuffer::new(capacity, sink.clone()),
            sink,
        })
    }

    pub fn barriers(&self) -> &BarrierRegistry {
        &self.barriers
    }

    pub fn slot_buffer(&self) -> &SlotBuffer {
        &self.slot_buffer
    }

    pub fn sem_buffer(&self) -> &SemBuffer {
        &self.sem_buffer
    }

    pub fn barrier_alloc(&self) -> i64 {
        self.finish("barrier_alloc", self.barriers.allocate().map(|id| id as i64))
    }

    pub fn barrier(&self, tag: i32, id: i32, n: i32) -> i64 {
        let res = barrier_id(id).and_then(|id| {
            let n = party_count(n)?;
            self.barriers.enter(id, tag, n)
        });
        self.finish("barrier", res.map(|_| SYSCALL_OK))
    }

    pub fn barrier_free(&self, id: i32) -> i64 {
        let res = barrier_id(id).and_then(|id| self.barriers.free(id));
        self.finish("barrier_free", res.map(|_| SYSCALL_OK))
    }

    pub fn buffer_cond_init(&self) -> i64 {
        self.slot_buffer.init();
        SYSCALL_OK
    }

    pub fn cond_produce(&self, item: Item) -> i64 {
        self.slot_buffer.produce(item);
        SYSCALL_OK
    }

    pub fn cond_consume(&self) -> i64 {
        self.slot_buffer.consume() as i64
    }

    pub fn buffer_sem_init(&self) -> i64 {
        self.sem_buffer.init();
        SYSCALL_OK
    }

    pub fn sem_produce(&self, item: Item) -> i64 {
        self.sem_buffer.produce(item);
        SYSCALL_OK
    }

    pub fn sem_consume(&self) -> i64 {
        self.sem_buffer.consume() as i64
    }

    fn finish(&self, call: &str, res: Result<i64>) -> i64 {
        match res {
            Ok(v) => v,
            Err(err) => {
                warn!("{} failed: {}", call, err);
                self.sink.emit(&TraceEvent::Diagnostic {
                    message: err.to_string(),
                });
                err.sentinel()
            }
        }
    }
}

fn barrier_id(id: i32) -> Result<usize> {
    usize::try_from(id)
        .map_err(|_| SyncError::InvalidArgument(format!("negative barrier id {}", id)))
}

fn party_count(n: i32) -> Result<usize> {
    match usize::try_from(n) {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(SyncError::InvalidArgument(format!(
            "barrier party count {} must be at least 1",
            n
        ))),
    }
}

/// Forwards to whichever sink is currently installed for the process-wide services.
struct GlobalTrace;

impl TraceSink for GlobalTrace {
    fn emit(&self, event: &TraceEvent) {
        TRACE_SINK.read().emit(event);
    }
}

lazy_static! {
    static ref TRACE_SINK: RwLock<Arc<dyn TraceSink>> = RwLock::new(Arc::new(LogTrace));
    static ref SYSCALLS: Syscalls = Syscalls {
        barriers: BarrierRegistry::new(BARRIER_COUNT, Arc::new(GlobalTrace)),
        slot_buffer: SlotBuffer::new(BUF_CAPACITY, Arc::new(GlobalTrace)),
        sem_buffer: SemBuffer::new(BUF_CAPACITY, Arc::new(GlobalTrace)),
        sink: Arc::new(GlobalTrace),
    };
}

/// Installs the sink the process-wide services report to, returning the previous one.
pub fn set_trace_sink(sink: Arc<dyn TraceSink>) -> Arc<dyn TraceSink> {
    std::mem::replace(&mut *TRACE_SINK.write(), sink)
}

/// The process-wide services behind the `sys_*` functions.
pub fn global() -> &'static Syscalls {
    &SYSCALLS
}

pub fn sys_barrier_alloc() -> i64 {
    SYSCALLS.barrier_alloc()
}

pub fn sys_barrier(tag: i32, id: i32, n: i32) -> i64 {
    SYSCALLS.barrier(tag, id, n)
}

pub fn sys_barrier_free(id: i32) -> i64 {
    SYSCALLS.barrier_free(id)
}

pub fn sys_buffer_cond_init() -> i64 {
    SYSCALLS.buffer_cond_init()
}

pub fn sys_cond_produce(item: Item) -> i64 {
    SYSCALLS.cond_produce(item)
}

pub fn sys_cond_consume() -> i64 {
    SYSCALLS.cond_consume()
}

pub fn sys_buffer_sem_init() -> i64 {
    SYSCALLS.buffer_sem_init()
}

pub fn sys_sem_produce(item: Item) -> i64 {
    SYSCALLS.sem_produce(item)
}

pub fn sys_sem_consume() -> i64 {
    SYSCALLS.sem_consume()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::MemoryTrace;

    fn syscalls(trace: Arc<MemoryTrace>) -> Syscalls {
        Syscalls::new(&Config::new(2, 4), trace).unwrap()
    }

    #[test]
    fn test_bad_config_rejected() {
        assert!(Syscalls::new(&Config::new(0, 4), Arc::new(MemoryTrace::new())).is_err());
        assert!(Syscalls::new(&Config::new(4, 0), Arc::new(MemoryTrace::new())).is_err());
    }

    #[test]
    fn test_barrier_errors_map_to_sentinel() {
        let trace = Arc::new(MemoryTrace::new());
        let sys = syscalls(trace.clone());
        assert_eq!(sys.barrier_free(0), -1);
        assert_eq!(sys.barrier(0, 0, 1), -1);
        assert_eq!(sys.barrier(0, -3, 1), -1);
        assert_eq!(sys.barrier_free(7), -1);
        assert_eq!(sys.barrier_alloc(), 0);
        assert_eq!(sys.barrier(0, 0, 0), -1);
        assert_eq!(sys.barrier(0, 0, -2), -1);
        assert_eq!(sys.barrier_alloc(), 1);
        assert_eq!(sys.barrier_alloc(), -1);
        let diagnostics = trace
            .events()
            .into_iter()
            .filter(|e| matches!(e, TraceEvent::Diagnostic { .. }))
            .count();
        assert_eq!(diagnostics, 7);
    }

    #[test]
    fn test_barrier_success_returns_zero() {
        let sys = syscalls(Arc::new(MemoryTrace::new()));
        let id = sys.barrier_alloc();
        assert_eq!(id, 0);
        assert_eq!(sys.barrier(5, id as i32, 1), 0);
        assert_eq!(sys.barrier_free(id as i32), 0);
    }

    #[test]
    fn test_buffers_return_items() {
        let trace = Arc::new(MemoryTrace::new());
        let sys = syscalls(trace.clone());
        assert_eq!(sys.buffer_cond_init(), 0);
        assert_eq!(sys.cond_produce(11), 0);
        assert_eq!(sys.cond_consume(), 11);
        assert_eq!(sys.buffer_sem_init(), 0);
        assert_eq!(sys.sem_produce(12), 0);
        assert_eq!(sys.sem_consume(), 12);
        assert_eq!(trace.consumed(), vec![11, 12]);
    }
}
