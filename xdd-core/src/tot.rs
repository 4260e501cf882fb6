//! Target Offset Table (spec.md §3 "TOT", §4.2 C2).
//!
//! A fixed-size ring of `N = queue_depth` slots, indexed by `op_number mod
//! N`. `wait_for_previous` blocks on slot `(op-1) mod N` until it is
//! released; `release` marks slot `op mod N` released and wakes waiters.
//! The slot identity is the op number, not the worker id, so out-of-order
//! worker execution is still globally ordered by op number (spec.md §4.2
//! "Rationale").
//!
//! Grounded on the ticket/slot ordering state machine in the teacher's
//! `cognitod/src/runtime/sequencer.rs` (`OrderingValidator`, per-slot
//! state, reaper timeout for stalled producers) — generalized from a
//! lock-free single-consumer ring to a blocking multi-waiter ring, since
//! here *all* slot transitions are worker-thread-driven rather than one
//! eBPF producer plus one consumer.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::error::XddError;
use crate::plan::RunFlags;

#[derive(Debug, Clone, Copy, Default)]
struct TotSlot {
    is_released: bool,
    latest_writer_worker: Option<usize>,
    latest_waiter_worker: Option<usize>,
    latest_completion_ns: u64,
}

/// Poll interval used while `wait_for_previous` waits, so it can observe
/// the cancellation token without a dedicated notifier.
const RECOVERY_POLL: Duration = Duration::from_millis(250);

/// Total time a worker may wait on a TOT slot before the wait is treated
/// as a stuck predecessor and surfaced as [`XddError::Ordering`] (spec.md
/// §7 "OrderingError": "TOT slot not released within a recovery timeout").
const RECOVERY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Tot {
    slots: Vec<(Mutex<TotSlot>, Condvar)>,
}

impl Tot {
    pub fn new(queue_depth: usize) -> Self {
        let n = queue_depth.max(1);
        let mut slots = Vec::with_capacity(n);
        for _ in 0..n {
            slots.push((Mutex::new(TotSlot::default()), Condvar::new()));
        }
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot_index(&self, op: u64) -> usize {
        (op % self.slots.len() as u64) as usize
    }

    /// Block until op `op - 1`'s slot has been released. Returns
    /// immediately for `op == 0` (spec.md §4.2 "special case").
    pub fn wait_for_previous(
        &self,
        target: usize,
        op: u64,
        waiter_worker: usize,
        flags: &RunFlags,
    ) -> Result<(), XddError> {
        if op == 0 {
            return Ok(());
        }
        let prev = op - 1;
        let idx = self.slot_index(prev);
        let (mutex, cond) = &self.slots[idx];
        let mut guard = mutex.lock().unwrap();
        guard.latest_waiter_worker = Some(waiter_worker);
        let mut waited = Duration::ZERO;
        while !guard.is_released {
            if flags.should_stop() {
                return Err(XddError::Canceled);
            }
            let (g, timeout) = cond.wait_timeout(guard, RECOVERY_POLL).unwrap();
            guard = g;
            if timeout.timed_out() {
                waited += RECOVERY_POLL;
                if flags.should_stop() {
                    return Err(XddError::Canceled);
                }
                if waited >= RECOVERY_TIMEOUT {
                    return Err(XddError::Ordering {
                        target,
                        op_number: op,
                    });
                }
            }
        }
        guard.is_released = false;
        Ok(())
    }

    /// Mark op `op`'s slot released and wake any worker waiting on it.
    pub fn release(&self, op: u64, releaser_worker: usize, completion_ns: u64) {
        let idx = self.slot_index(op);
        let (mutex, cond) = &self.slots[idx];
        let mut guard = mutex.lock().unwrap();
        guard.is_released = true;
        guard.latest_writer_worker = Some(releaser_worker);
        guard.latest_completion_ns = completion_ns;
        cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration as StdDuration;

    #[test]
    fn op_zero_never_waits() {
        let tot = Tot::new(4);
        let flags = RunFlags::new();
        assert!(tot.wait_for_previous(0, 0, 0, &flags).is_ok());
    }

    #[test]
    fn op_k_waits_for_op_k_minus_1_release() {
        let tot = Arc::new(Tot::new(4));
        let flags = RunFlags::new();
        let tot2 = tot.clone();
        let flags2 = flags.clone();
        let order = Arc::new(Mutex::new(Vec::new()));
        let order2 = order.clone();

        let waiter = thread::spawn(move || {
            tot2.wait_for_previous(0, 1, 1, &flags2).unwrap();
            order2.lock().unwrap().push(1);
        });

        thread::sleep(StdDuration::from_millis(20));
        order.lock().unwrap().push(0);
        tot.release(0, 0, 100);
        waiter.join().unwrap();

        assert_eq!(*order.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn canceled_flag_unblocks_waiter() {
        let tot = Arc::new(Tot::new(2));
        let flags = RunFlags::new();
        let tot2 = tot.clone();
        let flags2 = flags.clone();
        let handle = thread::spawn(move || tot2.wait_for_previous(0, 1, 1, &flags2));
        thread::sleep(StdDuration::from_millis(10));
        flags.raise_canceled();
        let result = handle.join().unwrap();
        assert!(result.is_err());
    }
}
