//! Heartbeat monitor (spec.md §4.9 C9): a periodic thread that samples
//! every target's counters and emits a CSV line. Firing interval is the
//! minimum of all configured non-zero intervals; a target whose own
//! interval hasn't elapsed yet is filtered out of that line rather than
//! skipping the whole tick (spec.md §4.9 "Scheduling").

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::counters::TargetCounters;

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatSpec {
    pub interval: Duration,
    /// If the restart monitor adjusts cadence under load (spec.md §4.9
    /// "restart-percent adjustment"), this scales `interval` down.
    pub restart_percent: Option<f64>,
}

pub struct HeartbeatTarget {
    pub index: usize,
    pub spec: HeartbeatSpec,
    pub counters: Arc<TargetCounters>,
    last_fired: std::sync::Mutex<Instant>,
}

impl HeartbeatTarget {
    pub fn new(index: usize, spec: HeartbeatSpec, counters: Arc<TargetCounters>) -> Self {
        Self {
            index,
            spec,
            counters,
            last_fired: std::sync::Mutex::new(Instant::now()),
        }
    }

    fn effective_interval(&self) -> Duration {
        match self.spec.restart_percent {
            Some(pct) if pct > 0.0 && pct < 1.0 => self.spec.interval.mul_f64(pct),
            _ => self.spec.interval,
        }
    }

    fn due(&self) -> bool {
        let mut last = self.last_fired.lock().unwrap();
        if last.elapsed() >= self.effective_interval() {
            *last = Instant::now();
            true
        } else {
            false
        }
    }
}

/// Drives the heartbeat thread: wakes at the minimum non-zero interval
/// across all targets, writes one CSV line per due target, repeats until
/// `stop` is set.
pub fn run_heartbeat<W: Write>(targets: &[HeartbeatTarget], stop: &AtomicBool, mut out: W) {
    let tick = targets
        .iter()
        .map(|t| t.effective_interval())
        .filter(|d| !d.is_zero())
        .min()
        .unwrap_or(Duration::from_secs(1));
    let poll = Duration::from_millis(50).min(tick);

    while !stop.load(Ordering::Relaxed) {
        let mut waited = Duration::ZERO;
        while waited < tick {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            std::thread::sleep(poll);
            waited += poll;
        }
        for target in targets {
            if !target.due() {
                continue;
            }
            let snap = target.counters.snapshot();
            let _ = writeln!(
                out,
                "{},{},{},{},{}",
                target.index,
                snap.read_ops,
                snap.write_ops,
                snap.bytes_completed,
                snap.error_ops
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_fires_once_per_interval() {
        let target = HeartbeatTarget::new(
            0,
            HeartbeatSpec {
                interval: Duration::from_millis(10),
                restart_percent: None,
            },
            Arc::new(TargetCounters::new()),
        );
        assert!(!target.due());
        std::thread::sleep(Duration::from_millis(15));
        assert!(target.due());
    }

    #[test]
    fn restart_percent_shrinks_interval() {
        let target = HeartbeatTarget::new(
            0,
            HeartbeatSpec {
                interval: Duration::from_secs(10),
                restart_percent: Some(0.1),
            },
            Arc::new(TargetCounters::new()),
        );
        assert_eq!(target.effective_interval(), Duration::from_secs(1));
    }
}
