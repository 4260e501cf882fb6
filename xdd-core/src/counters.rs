//! Per-target counters (spec.md §3 "Target", §8 invariants 1–2, §3
//! "Extended stats" supplement). Writers use short critical sections;
//! readers (Heartbeat, Results) copy out under the same mutex rather than
//! reading individual atomics, so a snapshot is always consistent (spec.md
//! §5 "Shared-resource policy").

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Default)]
pub struct CountersSnapshot {
    pub read_ops: u64,
    pub write_ops: u64,
    pub noop_ops: u64,
    pub error_ops: u64,
    pub bytes_completed: u64,
    pub longest_op_ns: u64,
    pub shortest_op_ns: u64,
}

#[derive(Debug, Default)]
struct ExtendedStats {
    longest_op_ns: u64,
    shortest_op_ns: u64,
}

/// `target.current_bytes_completed` and the per-kind op counts (spec.md
/// §3 invariant: "monotonic within a pass and equals the sum of
/// task_xfer_size over successful ops").
pub struct TargetCounters {
    read_ops: AtomicU64,
    write_ops: AtomicU64,
    noop_ops: AtomicU64,
    error_ops: AtomicU64,
    bytes_completed: AtomicU64,
    extended: Mutex<ExtendedStats>,
}

impl Default for TargetCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetCounters {
    pub fn new() -> Self {
        Self {
            read_ops: AtomicU64::new(0),
            write_ops: AtomicU64::new(0),
            noop_ops: AtomicU64::new(0),
            error_ops: AtomicU64::new(0),
            bytes_completed: AtomicU64::new(0),
            extended: Mutex::new(ExtendedStats::default()),
        }
    }

    pub fn reset(&self) {
        self.read_ops.store(0, Ordering::SeqCst);
        self.write_ops.store(0, Ordering::SeqCst);
        self.noop_ops.store(0, Ordering::SeqCst);
        self.error_ops.store(0, Ordering::SeqCst);
        self.bytes_completed.store(0, Ordering::SeqCst);
        *self.extended.lock().unwrap() = ExtendedStats::default();
    }

    pub fn record_read(&self, bytes: u64, op_elapsed_ns: u64) {
        self.read_ops.fetch_add(1, Ordering::SeqCst);
        self.bytes_completed.fetch_add(bytes, Ordering::SeqCst);
        self.record_elapsed(op_elapsed_ns);
    }

    pub fn record_write(&self, bytes: u64, op_elapsed_ns: u64) {
        self.write_ops.fetch_add(1, Ordering::SeqCst);
        self.bytes_completed.fetch_add(bytes, Ordering::SeqCst);
        self.record_elapsed(op_elapsed_ns);
    }

    pub fn record_noop(&self, op_elapsed_ns: u64) {
        self.noop_ops.fetch_add(1, Ordering::SeqCst);
        self.record_elapsed(op_elapsed_ns);
    }

    pub fn record_error(&self) {
        self.error_ops.fetch_add(1, Ordering::SeqCst);
    }

    fn record_elapsed(&self, op_elapsed_ns: u64) {
        let mut ext = self.extended.lock().unwrap();
        if ext.longest_op_ns == 0 || op_elapsed_ns > ext.longest_op_ns {
            ext.longest_op_ns = op_elapsed_ns;
        }
        if ext.shortest_op_ns == 0 || op_elapsed_ns < ext.shortest_op_ns {
            ext.shortest_op_ns = op_elapsed_ns;
        }
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        let ext = self.extended.lock().unwrap();
        CountersSnapshot {
            read_ops: self.read_ops.load(Ordering::SeqCst),
            write_ops: self.write_ops.load(Ordering::SeqCst),
            noop_ops: self.noop_ops.load(Ordering::SeqCst),
            error_ops: self.error_ops.load(Ordering::SeqCst),
            bytes_completed: self.bytes_completed.load(Ordering::SeqCst),
            longest_op_ns: ext.longest_op_ns,
            shortest_op_ns: ext.shortest_op_ns,
        }
    }

    pub fn completed_ops(&self) -> u64 {
        self.read_ops.load(Ordering::SeqCst)
            + self.write_ops.load(Ordering::SeqCst)
            + self.noop_ops.load(Ordering::SeqCst)
            + self.error_ops.load(Ordering::SeqCst)
    }

    pub fn bytes_completed(&self) -> u64 {
        self.bytes_completed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_count_conservation() {
        let c = TargetCounters::new();
        c.record_read(1024, 100);
        c.record_write(1024, 200);
        c.record_noop(10);
        c.record_error();
        assert_eq!(c.completed_ops(), 4);
    }

    #[test]
    fn byte_count_conservation() {
        let c = TargetCounters::new();
        c.record_write(1024, 50);
        c.record_write(2048, 60);
        assert_eq!(c.bytes_completed(), 3072);
    }

    #[test]
    fn longest_shortest_track_extremes() {
        let c = TargetCounters::new();
        c.record_write(1, 500);
        c.record_write(1, 100);
        c.record_write(1, 900);
        let snap = c.snapshot();
        assert_eq!(snap.shortest_op_ns, 100);
        assert_eq!(snap.longest_op_ns, 900);
    }
}
