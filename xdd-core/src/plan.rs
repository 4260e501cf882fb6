//! Plan / global state (spec.md §4.11 C11, §3 "Plan", Design Notes §9
//! "Global mutable state → owned Plan").
//!
//! The historical `xgp` global is replaced by a `Plan` value created by
//! `Plan::new`, populated by the CLI layer, handed to `Plan::run`, and
//! released by dropping it. Cancellation is a cheap `Arc<RunFlags>`
//! consulted at loop heads instead of polling a global, matching the
//! cancellation-token guidance in Design Notes §9. This mirrors the single
//! shared, `Arc`-handed-to-every-subsystem pattern the teacher uses for its
//! `ContextStore` (`cognitod/src/context.rs`), generalized from one shared
//! store to the run-wide flag word plus barrier registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::barrier::BarrierRegistry;
use crate::clock::Clock;

/// Run-wide cancellation / fatal-error flags, polled at every loop head
/// (spec.md §5 "Cancellation / timeouts").
#[derive(Default)]
pub struct RunFlags {
    pub abort: AtomicBool,
    pub canceled: AtomicBool,
    pub run_complete: AtomicBool,
    pub run_time_expired: AtomicBool,
}

impl RunFlags {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// True if any fatal/cancellation condition has been raised.
    pub fn should_stop(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
            || self.canceled.load(Ordering::SeqCst)
            || self.run_time_expired.load(Ordering::SeqCst)
    }

    pub fn raise_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn raise_canceled(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn raise_time_expired(&self) {
        self.run_time_expired.store(true, Ordering::SeqCst);
    }
}

/// Heartbeat-thread-wide state word (spec.md §4.11).
#[derive(Default)]
pub struct HeartbeatFlags {
    pub active: AtomicBool,
    pub holdoff: AtomicBool,
    pub exit: AtomicBool,
}

/// Global run configuration and registries (spec.md §3 "Plan").
///
/// Owns the barrier-chain anchor and the run-wide flags; the target array
/// itself is owned by the caller (`xdd-cli`/the engine's `run` entry
/// point) since its shape depends on how many targets the configuration
/// describes — `Plan` only owns what is truly global.
pub struct Plan {
    pub flags: Arc<RunFlags>,
    pub heartbeat_flags: Arc<HeartbeatFlags>,
    pub barriers: BarrierRegistry,
    pub clock: Clock,
}

impl Default for Plan {
    fn default() -> Self {
        Self::new()
    }
}

impl Plan {
    pub fn new() -> Self {
        Self {
            flags: RunFlags::new(),
            heartbeat_flags: Arc::new(HeartbeatFlags::default()),
            barriers: BarrierRegistry::new(),
            clock: Clock::new(),
        }
    }

    /// Called at run end; asserts the barrier registry is empty.
    pub fn teardown(&self) -> Result<(), crate::error::XddError> {
        self.barriers.teardown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_plan_has_no_flags_raised() {
        let plan = Plan::new();
        assert!(!plan.flags.should_stop());
    }

    #[test]
    fn teardown_succeeds_with_no_barriers() {
        let plan = Plan::new();
        assert!(plan.teardown().is_ok());
    }
}
