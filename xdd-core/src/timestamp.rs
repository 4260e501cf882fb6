//! Timestamp trace (spec.md §4.10 C10): a preallocated ring of
//! [`xdd_wire::timestamp::TraceEntry`] that workers fill in as they
//! complete ops, dumped to a binary file (with a `TraceFileHeader`) at
//! the end of a run, and optionally rendered to a human-readable CSV.

use std::fs::File;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use xdd_wire::timestamp::{TraceEntry, TraceFileHeader, TraceOpType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    /// Stop recording once the ring fills.
    Oneshot,
    /// Overwrite the oldest entries once the ring fills.
    Wrap,
}

#[derive(Debug, Clone, Copy)]
pub enum TriggerMode {
    /// Record from the first op onward.
    Immediate,
    /// Start recording once `cpu_start_ns` passes this time.
    Time(u64),
    /// Start recording once `op_number` reaches this value.
    Op(u64),
}

pub struct TraceRing {
    entries: Mutex<Vec<TraceEntry>>,
    size: usize,
    wrap: WrapMode,
    trigger: TriggerMode,
    next_index: AtomicU64,
    filled: AtomicU64,
    armed: std::sync::atomic::AtomicBool,
}

impl TraceRing {
    pub fn new(size: usize, wrap: WrapMode, trigger: TriggerMode) -> Self {
        Self {
            entries: Mutex::new(vec![TraceEntry::zeroed_with(TraceOpType::Noop, 0, 0); size]),
            size,
            wrap,
            trigger,
            next_index: AtomicU64::new(0),
            filled: AtomicU64::new(0),
            armed: std::sync::atomic::AtomicBool::new(matches!(trigger, TriggerMode::Immediate)),
        }
    }

    fn should_arm(&self, op_number: u64, cpu_start_ns: u64) -> bool {
        if self.armed.load(Ordering::Relaxed) {
            return true;
        }
        let fires = match self.trigger {
            TriggerMode::Immediate => true,
            TriggerMode::Time(t) => cpu_start_ns >= t,
            TriggerMode::Op(n) => op_number >= n,
        };
        if fires {
            self.armed.store(true, Ordering::Relaxed);
        }
        fires
    }

    /// Record one entry. No-op before the trigger fires; no-op once a
    /// oneshot ring is full.
    pub fn record(&self, entry: TraceEntry) {
        if self.size == 0 || !self.should_arm(entry.op_number, entry.cpu_start_ns) {
            return;
        }
        let filled = self.filled.load(Ordering::Relaxed);
        if self.wrap == WrapMode::Oneshot && filled >= self.size as u64 {
            return;
        }
        let idx = (self.next_index.fetch_add(1, Ordering::Relaxed) as usize) % self.size;
        self.entries.lock().unwrap()[idx] = entry;
        if filled < self.size as u64 {
            self.filled.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn len(&self) -> usize {
        self.filled.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in chronological order (oldest first).
    pub fn ordered_entries(&self) -> Vec<TraceEntry> {
        let guard = self.entries.lock().unwrap();
        let filled = self.filled.load(Ordering::Relaxed) as usize;
        if filled < self.size {
            guard[..filled].to_vec()
        } else {
            let start = (self.next_index.load(Ordering::Relaxed) as usize) % self.size;
            let mut out = Vec::with_capacity(self.size);
            out.extend_from_slice(&guard[start..]);
            out.extend_from_slice(&guard[..start]);
            out
        }
    }

    /// Write the binary trace file: header followed by entries, each via
    /// their explicit `bytemuck` byte representation.
    pub fn dump_binary(&self, mut out: File, clock_resolution_ns: u64, timer_overhead_ns: u64, id: &str) -> io::Result<()> {
        let entries = self.ordered_entries();
        let mut header = TraceFileHeader::new(entries.len() as u64, clock_resolution_ns, timer_overhead_ns);
        header.set_id_string(id);
        out.write_all(bytemuck::bytes_of(&header))?;
        for entry in &entries {
            out.write_all(bytemuck::bytes_of(entry))?;
        }
        Ok(())
    }

    /// Render a human-readable CSV summary (one row per entry): spec.md
    /// §6 names `SUMMARY` (key timings only) and `DETAILED` (every field)
    /// report flavors.
    pub fn dump_csv<W: Write>(&self, mut out: W, detailed: bool) -> io::Result<()> {
        if detailed {
            writeln!(out, "op_number,byte_offset,op_type,worker_no,pass_no,cpu_start_ns,cpu_end_ns,disk_start_ns,disk_end_ns,net_start_ns,net_end_ns,disk_xfer_size,net_xfer_size,net_calls")?;
        } else {
            writeln!(out, "op_number,op_type,cpu_start_ns,cpu_end_ns")?;
        }
        for entry in self.ordered_entries() {
            if detailed {
                writeln!(
                    out,
                    "{},{},{:?},{},{},{},{},{},{},{},{},{},{},{}",
                    entry.op_number,
                    entry.byte_offset,
                    entry.op_type(),
                    entry.worker_no,
                    entry.pass_no,
                    entry.cpu_start_ns,
                    entry.cpu_end_ns,
                    entry.disk_start_ns,
                    entry.disk_end_ns,
                    entry.net_start_ns,
                    entry.net_end_ns,
                    entry.disk_xfer_size,
                    entry.net_xfer_size,
                    entry.net_calls
                )?;
            } else {
                writeln!(
                    out,
                    "{},{:?},{},{}",
                    entry.op_number,
                    entry.op_type(),
                    entry.cpu_start_ns,
                    entry.cpu_end_ns
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(op_number: u64) -> TraceEntry {
        let mut e = TraceEntry::zeroed_with(TraceOpType::Write, 0, 0);
        e.op_number = op_number;
        e
    }

    #[test]
    fn oneshot_ring_stops_at_capacity() {
        let ring = TraceRing::new(2, WrapMode::Oneshot, TriggerMode::Immediate);
        ring.record(entry(0));
        ring.record(entry(1));
        ring.record(entry(2));
        assert_eq!(ring.len(), 2);
        let ordered: Vec<_> = ring.ordered_entries().iter().map(|e| e.op_number).collect();
        assert_eq!(ordered, vec![0, 1]);
    }

    #[test]
    fn wrap_ring_overwrites_oldest() {
        let ring = TraceRing::new(2, WrapMode::Wrap, TriggerMode::Immediate);
        ring.record(entry(0));
        ring.record(entry(1));
        ring.record(entry(2));
        let ordered: Vec<_> = ring.ordered_entries().iter().map(|e| e.op_number).collect();
        assert_eq!(ordered, vec![1, 2]);
    }

    #[test]
    fn op_trigger_holds_recording_until_armed() {
        let ring = TraceRing::new(4, WrapMode::Wrap, TriggerMode::Op(2));
        ring.record(entry(0));
        ring.record(entry(1));
        assert!(ring.is_empty());
        ring.record(entry(2));
        assert_eq!(ring.len(), 1);
    }
}
