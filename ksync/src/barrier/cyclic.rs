use std::time::Instant;

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use crate::error::{Result, SyncError};
use crate::trace::{caller_label, TraceEvent, TraceSink};

#[derive(Debug, Default)]
struct RoundState {
    /// Callers that joined the open round.
    arrived: usize,
    /// Bumped on every release; waiters sleep until it moves.
    generation: u64,
    /// Party count given by the first caller of the open round.
    parties: Option<usize>,
}

/// One reusable rendezvous point.
///
/// Each instance owns its lock, join counter and condition variable, so rounds
/// on different instances never see each other's arrivals. The party count is
/// supplied by every caller; a round is released when the counter reaches the
/// count supplied by the caller that completes it.
#[derive(Debug)]
pub struct CyclicBarrier {
    id: usize,
    state: Mutex<RoundState>,
    cond: Condvar,
}

impl CyclicBarrier {
    pub(crate) fn new(id: usize) -> Self {
        Self {
            id,
            state: Mutex::new(RoundState::default()),
            cond: Condvar::new(),
        }
    }

    /// Joins the open round and blocks until `n` callers have joined it.
    ///
    /// The entry event is emitted before the caller can block and the release
    /// event after it has been released, both under the instance lock.
    pub fn enter(&self, tag: i32, n: usize, sink: &dyn TraceSink) -> Result<()> {
        self.enter_inner(tag, n, None, sink)
    }

    /// Like [`enter`](Self::enter), but a caller still waiting at `deadline`
    /// withdraws from the round and gets [`SyncError::TimedOut`].
    pub fn enter_until(
        &self,
        tag: i32,
        n: usize,
        deadline: Instant,
        sink: &dyn TraceSink,
    ) -> Result<()> {
        self.enter_inner(tag, n, Some(deadline), sink)
    }

    fn enter_inner(
        &self,
        tag: i32,
        n: usize,
        deadline: Option<Instant>,
        sink: &dyn TraceSink,
    ) -> Result<()> {
        if n == 0 {
            return Err(SyncError::InvalidArgument(
                "barrier party count must be at least 1".to_string(),
            ));
        }
        let caller = caller_label();
        let mut state = self.state.lock();
        sink.emit(&TraceEvent::BarrierEntered {
            caller: caller.clone(),
            tag,
            id: self.id,
        });

        let opened_with = state.parties;
        match opened_with {
            None => state.parties = Some(n),
            Some(parties) if parties != n => warn!(
                "barrier {}: caller {} expects {} parties, round was opened with {}",
                self.id, caller, n, parties
            ),
            Some(_) => {}
        }

        state.arrived += 1;
        if state.arrived == n {
            state.arrived = 0;
            state.parties = None;
            state.generation = state.generation.wrapping_add(1);
            let woken = self.cond.notify_all();
            debug!(
                "barrier {}: round {} released by {}, woke {}",
                self.id, state.generation, caller, woken
            );
        } else {
            let generation = state.generation;
            while state.generation == generation {
                match deadline {
                    None => self.cond.wait(&mut state),
                    Some(deadline) => {
                        let timed_out = self.cond.wait_until(&mut state, deadline).timed_out();
                        if timed_out && state.generation == generation {
                            state.arrived -= 1;
                            if state.arrived == 0 {
                                state.parties = None;
                            }
                            debug!("barrier {}: {} timed out, withdrew", self.id, caller);
                            return Err(SyncError::TimedOut);
                        }
                    }
                }
            }
        }

        sink.emit(&TraceEvent::BarrierReleased {
            caller,
            tag,
            id: self.id,
        });
        Ok(())
    }

    /// Callers currently parked in the open round.
    pub fn waiting(&self) -> usize {
        self.state.lock().arrived
    }

    /// Number of rounds released so far.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }
}
