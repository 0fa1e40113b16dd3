//! The shared observable trace.
//!
//! Services report what callers can observe (barrier entry and release,
//! consumed items, rejected calls) as [`TraceEvent`]s handed to a
//! [`TraceSink`]. The `Display` form of an event is the console line the
//! services have always printed.
//!
//! Sinks:
//! - [`LogTrace`]: forwards to the `log` facade under the `ksync::trace` target
//! - [`ConsoleTrace`]: writes straight to stdout, consumed items on one line
//! - [`MemoryTrace`]: records events for later inspection
//! - [`NullTrace`]: drops everything

use std::fmt;
use std::io::{self, Write};
use std::thread;

use auto_impl::auto_impl;
use parking_lot::Mutex;

use crate::def::Item;

/// Which bounded buffer produced a `Consumed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Slot,
    Sem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    BarrierEntered { caller: String, tag: i32, id: usize },
    BarrierReleased { caller: String, tag: i32, id: usize },
    Consumed { buffer: BufferKind, item: Item },
    Diagnostic { message: String },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::BarrierEntered { caller, tag, id } => write!(
                f,
                "{}: Entered barrier#{} for barrier array id {}",
                caller, tag, id
            ),
            TraceEvent::BarrierReleased { caller, tag, id } => write!(
                f,
                "{}: Finished barrier#{} for barrier array id {}",
                caller, tag, id
            ),
            TraceEvent::Consumed { item, .. } => write!(f, "{} ", item),
            TraceEvent::Diagnostic { message } => write!(f, "Error : {}", message),
        }
    }
}

/// Destination of trace events. Implementations must tolerate concurrent callers.
#[auto_impl(&, Arc, Box)]
pub trait TraceSink: Send + Sync {
    fn emit(&self, event: &TraceEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogTrace;

impl TraceSink for LogTrace {
    fn emit(&self, event: &TraceEvent) {
        match event {
            TraceEvent::Diagnostic { .. } => log::warn!(target: "ksync::trace", "{}", event),
            _ => log::info!(target: "ksync::trace", "{}", event),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleTrace;

impl TraceSink for ConsoleTrace {
    fn emit(&self, event: &TraceEvent) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        // consumed items share a line, like the kernel console
        let res = match event {
            TraceEvent::Consumed { .. } => write!(out, "{}", event),
            _ => writeln!(out, "{}", event),
        };
        if res.and_then(|_| out.flush()).is_err() {
            log::debug!("console trace dropped an event");
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullTrace;

impl TraceSink for NullTrace {
    fn emit(&self, _event: &TraceEvent) {}
}

#[derive(Debug, Default)]
pub struct MemoryTrace {
    events: Mutex<Vec<TraceEvent>>,
}

impl MemoryTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    /// Items from `Consumed` events, in trace order.
    pub fn consumed(&self) -> Vec<Item> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                TraceEvent::Consumed { item, .. } => Some(*item),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl TraceSink for MemoryTrace {
    fn emit(&self, event: &TraceEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Label identifying the calling thread in trace lines.
pub fn caller_label() -> String {
    let current = thread::current();
    match current.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", current.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_display_matches_console_format() {
        let entered = TraceEvent::BarrierEntered {
            caller: "7".into(),
            tag: 2,
            id: 0,
        };
        assert_eq!(
            entered.to_string(),
            "7: Entered barrier#2 for barrier array id 0"
        );
        let released = TraceEvent::BarrierReleased {
            caller: "7".into(),
            tag: 2,
            id: 0,
        };
        assert_eq!(
            released.to_string(),
            "7: Finished barrier#2 for barrier array id 0"
        );
        let consumed = TraceEvent::Consumed {
            buffer: BufferKind::Sem,
            item: 42,
        };
        assert_eq!(consumed.to_string(), "42 ");
    }

    #[test]
    fn test_memory_trace_through_arc() {
        let mem = Arc::new(MemoryTrace::new());
        let sink: Arc<dyn TraceSink> = mem.clone();
        sink.emit(&TraceEvent::Consumed {
            buffer: BufferKind::Slot,
            item: 1,
        });
        sink.emit(&TraceEvent::Diagnostic {
            message: "x".into(),
        });
        sink.emit(&TraceEvent::Consumed {
            buffer: BufferKind::Slot,
            item: 2,
        });
        assert_eq!(mem.events().len(), 3);
        assert_eq!(mem.consumed(), vec![1, 2]);
        mem.clear();
        assert!(mem.events().is_empty());
    }

    #[test]
    fn test_caller_label_uses_thread_name() {
        let label = thread::Builder::new()
            .name("worker-3".into())
            .spawn(caller_label)
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(label, "worker-3");
    }
}
