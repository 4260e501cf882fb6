//! Throttle (spec.md §4.7 C7): converts a `ThrottleSpec` into a per-op
//! sleep so issue timing matches the planned `scheduled_issue_time_ns`
//! produced by the access-pattern planner rather than recomputing delay
//! logic at dispatch time.

use std::thread;
use std::time::Duration;

use crate::clock::Clock;

/// Sleep until `scheduled_issue_time_ns` on `clock`, if that is in the
/// future. No-op (and no busy-wait) if the schedule has already slipped
/// past it, since throttling only ever holds ops back, never speeds them
/// up (spec.md §4.7 "Throttle never advances the clock").
pub fn wait_for_issue_time(clock: &Clock, scheduled_issue_time_ns: u64) {
    let now = clock.now();
    if scheduled_issue_time_ns > now {
        thread::sleep(Duration::from_nanos(scheduled_issue_time_ns - now));
    }
}
