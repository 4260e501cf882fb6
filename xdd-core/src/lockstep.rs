//! Lockstep (spec.md §4.7 C7): pace a slave target against a master
//! target's progress, gated on an interval of time, op count, byte count,
//! or a percentage of the master's total. Built on the same
//! generation-counter pattern as [`crate::barrier::Barrier`] rather than a
//! fresh primitive, since both are "N waiters release together when a
//! condition crosses a threshold."

use std::sync::{Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum LockstepInterval {
    Time(Duration),
    Ops(u64),
    Bytes(u64),
    Percent(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockstepCompletion {
    /// When the master finishes, let the slave run to its own completion.
    Complete,
    /// When the master finishes, stop the slave immediately.
    Stop,
}

struct GateState {
    generation: u64,
    master_done: bool,
}

/// Shared between one master target thread and one or more slave target
/// threads. The master advances `generation` each time its progress
/// crosses the configured interval; slaves block until it does.
pub struct LockstepGate {
    state: Mutex<GateState>,
    cond: Condvar,
    pub interval: LockstepInterval,
    pub completion: LockstepCompletion,
}

impl LockstepGate {
    pub fn new(interval: LockstepInterval, completion: LockstepCompletion) -> Self {
        Self {
            state: Mutex::new(GateState {
                generation: 0,
                master_done: false,
            }),
            cond: Condvar::new(),
            interval,
            completion,
        }
    }

    /// Master: advance the gate, releasing any slave waiting on the
    /// previous generation.
    pub fn advance(&self) {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        self.cond.notify_all();
    }

    /// Master: mark its run complete. Slaves waiting on the gate wake
    /// immediately; whether that means "stop" or "keep going alone" is up
    /// to the caller via `completion`.
    pub fn mark_master_done(&self) {
        let mut state = self.state.lock().unwrap();
        state.master_done = true;
        self.cond.notify_all();
    }

    pub fn is_master_done(&self) -> bool {
        self.state.lock().unwrap().master_done
    }

    /// Slave: block until `generation` advances past `last_seen`, or the
    /// master finishes. Returns the new generation.
    pub fn wait_for_advance(&self, last_seen: u64) -> u64 {
        let mut state = self.state.lock().unwrap();
        while state.generation == last_seen && !state.master_done {
            state = self.cond.wait(state).unwrap();
        }
        state.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn slave_wakes_on_advance() {
        let gate = Arc::new(LockstepGate::new(
            LockstepInterval::Ops(1),
            LockstepCompletion::Complete,
        ));
        let gate2 = gate.clone();
        let slave = thread::spawn(move || gate2.wait_for_advance(0));
        thread::sleep(Duration::from_millis(20));
        gate.advance();
        assert_eq!(slave.join().unwrap(), 1);
    }

    #[test]
    fn slave_wakes_on_master_done() {
        let gate = Arc::new(LockstepGate::new(
            LockstepInterval::Time(Duration::from_secs(1)),
            LockstepCompletion::Stop,
        ));
        let gate2 = gate.clone();
        let slave = thread::spawn(move || gate2.wait_for_advance(0));
        thread::sleep(Duration::from_millis(20));
        gate.mark_master_done();
        slave.join().unwrap();
    }
}
