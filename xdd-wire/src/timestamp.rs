//! Binary timestamp trace layout (spec.md §3 "Timestamp Trace Entry", §4.10,
//! §6 "Timestamp file format"). Mirrors the cache-aligned Pod-struct pattern
//! the teacher uses for `SequencedSlot` in `linnix-ai-ebpf-common`, sized for
//! a one-event-per-op record instead of a ring-buffer slot.

use bytemuck::{Pod, Zeroable};

/// Magic number at the start of a binary trace file.
pub const TRACE_FILE_MAGIC: u32 = 0xDEAD_BEEF;

/// Operation kind recorded in a trace entry.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraceOpType {
    Read = 0,
    Write = 1,
    Noop = 2,
    Eof = 3,
}

impl TraceOpType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Read,
            1 => Self::Write,
            2 => Self::Noop,
            _ => Self::Eof,
        }
    }
}

/// One fixed-size record per completed operation (spec.md §3).
///
/// Field order is chosen so every `u64` is naturally aligned and the
/// struct has no compiler-inserted padding, matching the requirement that
/// `bytemuck::Pod` structs fully account for their own bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct TraceEntry {
    pub op_number: u64,
    pub byte_offset: u64,
    pub thread_id: u64,
    pub cpu_start_ns: u64,
    pub cpu_end_ns: u64,
    pub disk_start_ns: u64,
    pub disk_end_ns: u64,
    pub net_start_ns: u64,
    pub net_end_ns: u64,
    pub disk_xfer_size: u64,
    pub net_xfer_size: u64,
    pub pass_no: u32,
    pub worker_no: u32,
    pub net_calls: u32,
    pub op_type: u8,
    _pad: [u8; 3],
}

impl TraceEntry {
    pub fn zeroed_with(op_type: TraceOpType, pass_no: u32, worker_no: u32) -> Self {
        Self {
            op_type: op_type as u8,
            pass_no,
            worker_no,
            ..Zeroable::zeroed()
        }
    }

    pub fn op_type(&self) -> TraceOpType {
        TraceOpType::from_u8(self.op_type)
    }
}

/// Header written once at the start of a binary trace file (spec.md §6).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct TraceFileHeader {
    pub magic: u32,
    pub version: u32,
    pub clock_resolution_ns: u64,
    pub timer_overhead_ns: u64,
    pub numents: u64,
    pub target_thread_id: u64,
    pub request_size: u64,
    pub block_size: u64,
    pub trigtime_ns: u64,
    pub trigop: u64,
    pub delta_ns: u64,
    pub size_bytes: u64,
    pub current_index: u64,
    pub target_options: u64,
    pub global_options: u64,
    pub id_string: [u8; 32],
    pub date_string: [u8; 32],
}

impl TraceFileHeader {
    pub fn new(numents: u64, clock_resolution_ns: u64, timer_overhead_ns: u64) -> Self {
        Self {
            magic: TRACE_FILE_MAGIC,
            version: 1,
            clock_resolution_ns,
            timer_overhead_ns,
            numents,
            size_bytes: numents * core::mem::size_of::<TraceEntry>() as u64,
            ..Zeroable::zeroed()
        }
    }

    pub fn set_id_string(&mut self, s: &str) {
        copy_fixed(&mut self.id_string, s);
    }

    pub fn set_date_string(&mut self, s: &str) {
        copy_fixed(&mut self.date_string, s);
    }
}

fn copy_fixed(dst: &mut [u8], s: &str) {
    let n = s.len().min(dst.len());
    dst[..n].copy_from_slice(&s.as_bytes()[..n]);
    for b in &mut dst[n..] {
        *b = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_has_no_hidden_padding() {
        // every field is 8-byte aligned except the two trailing 32-byte
        // string arrays, so the struct size must equal the field sum.
        assert_eq!(core::mem::size_of::<TraceFileHeader>(), 176);
    }

    #[test]
    fn entry_has_no_hidden_padding() {
        assert_eq!(core::mem::size_of::<TraceEntry>(), 104);
    }

    #[test]
    fn op_type_round_trips() {
        let e = TraceEntry::zeroed_with(TraceOpType::Write, 1, 2);
        assert_eq!(e.op_type(), TraceOpType::Write);
    }
}
