//! E2E wire header shared by the source and destination sides of an
//! end-to-end copy (spec.md §3 "E2E Header", §4.6, §6).
//!
//! The header is a fixed 64-byte record placed immediately before the
//! payload in a worker's send buffer. The byte order on the wire is fixed
//! here as little-endian (spec.md §9 leaves this an open question for
//! implementers to resolve).

use bytemuck::{Pod, Zeroable};

/// `magic` value marking a data frame (payload of `data_length` bytes follows).
pub const MAGIC_DATA_READY: u32 = 0x0720_1959;
/// `magic` value marking an EOF frame (no payload; `data_length == 0`).
pub const MAGIC_EOF: u32 = 0x0720_1960;

/// Size in bytes of [`E2eHeader`] on the wire.
pub const E2E_HEADER_SIZE: usize = 64;

/// Fixed 64-byte trailer/header preceding an E2E payload.
///
/// Field order matches spec.md §3 with explicit padding to reach 64 bytes.
/// `recv_time_ns` is always zero as sent by the source; the destination
/// fills it in locally after the read completes, it is never sent back.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct E2eHeader {
    pub magic: u32,
    pub sender_worker: u32,
    pub op_sequence: u64,
    pub send_time_ns: u64,
    pub recv_time_ns: u64,
    pub byte_offset: u64,
    pub data_length: u64,
    _reserved: [u8; 16],
}

impl E2eHeader {
    pub fn data(sender_worker: u32, op_sequence: u64, send_time_ns: u64, byte_offset: u64, data_length: u64) -> Self {
        Self {
            magic: MAGIC_DATA_READY,
            sender_worker,
            op_sequence,
            send_time_ns,
            recv_time_ns: 0,
            byte_offset,
            data_length,
            _reserved: [0; 16],
        }
    }

    pub fn eof(sender_worker: u32, op_sequence: u64, send_time_ns: u64) -> Self {
        Self {
            magic: MAGIC_EOF,
            sender_worker,
            op_sequence,
            send_time_ns,
            recv_time_ns: 0,
            byte_offset: 0,
            data_length: 0,
            _reserved: [0; 16],
        }
    }

    pub fn is_eof(&self) -> bool {
        self.magic == MAGIC_EOF
    }

    /// Encode into the documented little-endian wire format.
    pub fn to_le_bytes(&self) -> [u8; E2E_HEADER_SIZE] {
        let mut out = [0u8; E2E_HEADER_SIZE];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..8].copy_from_slice(&self.sender_worker.to_le_bytes());
        out[8..16].copy_from_slice(&self.op_sequence.to_le_bytes());
        out[16..24].copy_from_slice(&self.send_time_ns.to_le_bytes());
        out[24..32].copy_from_slice(&self.recv_time_ns.to_le_bytes());
        out[32..40].copy_from_slice(&self.byte_offset.to_le_bytes());
        out[40..48].copy_from_slice(&self.data_length.to_le_bytes());
        out
    }

    /// Decode from the documented little-endian wire format.
    pub fn from_le_bytes(buf: &[u8; E2E_HEADER_SIZE]) -> Self {
        Self {
            magic: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            sender_worker: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            op_sequence: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            send_time_ns: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            recv_time_ns: u64::from_le_bytes(buf[24..32].try_into().unwrap()),
            byte_offset: u64::from_le_bytes(buf[32..40].try_into().unwrap()),
            data_length: u64::from_le_bytes(buf[40..48].try_into().unwrap()),
            _reserved: [0; 16],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_64_bytes() {
        assert_eq!(core::mem::size_of::<E2eHeader>(), E2E_HEADER_SIZE);
    }

    #[test]
    fn round_trips_through_wire_bytes() {
        let h = E2eHeader::data(3, 42, 123_456_789, 4096, 1024);
        let bytes = h.to_le_bytes();
        let back = E2eHeader::from_le_bytes(&bytes);
        assert_eq!(h, back);
    }

    #[test]
    fn eof_frame_has_zero_payload() {
        let h = E2eHeader::eof(1, 9, 1);
        assert!(h.is_eof());
        assert_eq!(h.data_length, 0);
    }
}
