//! Named barrier + process-wide registry (spec.md §4.1 C1, Design Notes §9).
//!
//! The historical implementation keeps barriers on a circular doubly
//! linked list; Design Notes §9 asks for "a single owner collection of
//! barrier records keyed by id" instead, with a teardown routine that
//! asserts emptiness or reports leaks. This mirrors the single-owner,
//! `Mutex`-guarded store the teacher uses for its `ContextStore`
//! (`cognitod/src/context.rs`), generalized from a VecDeque of events to a
//! map of barriers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};

use crate::clock::Clock;
use crate::error::XddError;

/// Who is waiting at a barrier (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupantKind {
    Target,
    Worker,
    Support,
    Main,
    Cleanup,
}

#[derive(Debug, Clone)]
pub struct Occupant {
    pub kind: OccupantKind,
    pub name: String,
    pub first_wait_ns: u64,
    pub released_ns: u64,
}

struct BarrierState {
    threshold: usize,
    generation: u64,
    waiting: Vec<Occupant>,
}

/// A named synchronization point. Created via [`BarrierRegistry::create`];
/// auto-deregisters from its registry on drop.
pub struct Barrier {
    id: u64,
    name: String,
    state: Mutex<BarrierState>,
    cond: Condvar,
    registry: Weak<RegistryInner>,
}

impl Barrier {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until `threshold` callers have called `wait`. All callers are
    /// released atomically once the threshold is reached; the barrier then
    /// resets for the next use (cyclic, like `std::sync::Barrier`).
    pub fn wait(&self, kind: OccupantKind, name: impl Into<String>, clock: &Clock) {
        let name = name.into();
        let first_wait_ns = clock.now();
        let mut guard = self.state.lock().unwrap();
        let my_generation = guard.generation;
        guard.waiting.push(Occupant {
            kind,
            name,
            first_wait_ns,
            released_ns: 0,
        });
        if guard.waiting.len() >= guard.threshold {
            let released_ns = clock.now();
            for occ in &mut guard.waiting {
                occ.released_ns = released_ns;
            }
            guard.generation = guard.generation.wrapping_add(1);
            guard.waiting.clear();
            self.cond.notify_all();
        } else {
            while guard.generation == my_generation {
                guard = self.cond.wait(guard).unwrap();
            }
        }
    }

    /// Current occupants, for deadlock diagnosis.
    pub fn occupants(&self) -> Vec<Occupant> {
        self.state.lock().unwrap().waiting.clone()
    }
}

impl Drop for Barrier {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.barriers.lock().unwrap().remove(&self.id);
        }
    }
}

struct RegistryInner {
    barriers: Mutex<HashMap<u64, String>>,
    next_id: AtomicU64,
}

/// Process-wide barrier chain (spec.md: "circular doubly-linked list");
/// implemented as a single-owner registry per Design Notes §9.
#[derive(Clone)]
pub struct BarrierRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for BarrierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BarrierRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                barriers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn create(&self, name: impl Into<String>, threshold: usize) -> Arc<Barrier> {
        let name = name.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .barriers
            .lock()
            .unwrap()
            .insert(id, name.clone());
        Arc::new(Barrier {
            id,
            name,
            state: Mutex::new(BarrierState {
                threshold,
                generation: 0,
                waiting: Vec::new(),
            }),
            cond: Condvar::new(),
            registry: Arc::downgrade(&self.inner),
        })
    }

    /// Assert the registry is empty, i.e. every barrier created has been
    /// dropped. Called at `Plan` teardown.
    pub fn teardown(&self) -> Result<(), XddError> {
        let map = self.inner.barriers.lock().unwrap();
        if map.is_empty() {
            Ok(())
        } else {
            Err(XddError::BarrierLeaked(map.len()))
        }
    }

    pub fn len(&self) -> usize {
        self.inner.barriers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn two_waiters_release_together() {
        let registry = BarrierRegistry::new();
        let barrier = registry.create("test", 2);
        let clock = Clock::new();
        let b2 = barrier.clone();
        let clock2 = clock;
        let handle = thread::spawn(move || {
            b2.wait(OccupantKind::Worker, "w0", &clock2);
        });
        barrier.wait(OccupantKind::Target, "t0", &clock);
        handle.join().unwrap();
    }

    #[test]
    fn drop_deregisters_and_teardown_succeeds() {
        let registry = BarrierRegistry::new();
        {
            let _b = registry.create("scratch", 1);
            assert_eq!(registry.len(), 1);
        }
        assert!(registry.teardown().is_ok());
    }

    #[test]
    fn leaked_barrier_fails_teardown() {
        let registry = BarrierRegistry::new();
        let _b = registry.create("leaked", 1);
        assert!(registry.teardown().is_err());
    }
}
