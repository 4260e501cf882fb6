//! Access-pattern planner (spec.md §3 "Seek list", §4.3 C3).
//!
//! Generates the per-target operation list deterministically from a
//! `PatternSpec`, or loads one previously saved. Grounded on
//! `original_source/src/common/access_pattern.c` for the seeded-RNG /
//! mixed-rwratio / interleave semantics; the save/load file uses `serde`
//! the way the teacher's `config.rs` uses it for its TOML config, here
//! applied to a YAML-serialized seek list (a deterministic, diffable text
//! format, matching spec.md §4.3 "saves/loads the list to a deterministic
//! text file").

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpType {
    Read,
    Write,
    Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeekEntry {
    pub op_type: OpType,
    pub reqsize: u64,
    pub block_offset: u64,
    pub scheduled_issue_time_ns: u64,
}

/// Issue-time shaping policy (spec.md §4.3, §4.7 C7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThrottleSpec {
    None,
    /// bytes/sec, optional ± uniform variance fraction (e.g. 0.05 = ±5%).
    Bandwidth { bytes_per_sec: f64, variance: f64 },
    Iops { iops: f64 },
    Delay { seconds: f64 },
}

impl ThrottleSpec {
    fn seconds_per_op(&self, xfer_size: u64, rng: &mut Lcg) -> f64 {
        match *self {
            ThrottleSpec::None => 0.0,
            ThrottleSpec::Bandwidth {
                bytes_per_sec,
                variance,
            } => {
                let base = xfer_size as f64 / bytes_per_sec;
                if variance > 0.0 {
                    let jitter = (rng.next_unit() * 2.0 - 1.0) * variance;
                    (base * (1.0 + jitter)).max(0.0)
                } else {
                    base
                }
            }
            ThrottleSpec::Iops { iops } => 1.0 / iops,
            ThrottleSpec::Delay { seconds } => seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOrder {
    Sequential,
    Random,
}

#[derive(Debug, Clone)]
pub struct PatternSpec {
    pub start_offset_blocks: u64,
    pub pass_offset_blocks: u64,
    pub request_size_blocks: u64,
    pub block_size: u64,
    pub numreqs: Option<u64>,
    pub bytes: Option<u64>,
    /// -1.0 = all NOOP, 0.0 = all WRITE, 1.0 = all READ, fraction = mixed.
    pub rwratio: f64,
    pub throttle: ThrottleSpec,
    pub seed: u64,
    pub order: AccessOrder,
    /// Upper bound, in request-sized blocks, for random offsets. `None`
    /// means the whole planned extent.
    pub range_blocks: Option<u64>,
    /// Number of interleaved streams (spec.md "interleave lets multiple
    /// workers stripe").
    pub interleave: u64,
    /// Fixed stride, in request-sized blocks, between successive
    /// sequential ops (spec.md "stagger distributes a fixed stride").
    pub stagger_blocks: Option<u64>,
}

impl PatternSpec {
    pub fn xfer_size(&self) -> u64 {
        self.request_size_blocks * self.block_size
    }

    fn total_ops(&self) -> Result<u64, PlanError> {
        match (self.numreqs, self.bytes) {
            (Some(n), _) => Ok(n),
            (None, Some(b)) => {
                let xfer = self.xfer_size().max(1);
                Ok(b.div_ceil(xfer))
            }
            (None, None) => Err(PlanError::Empty),
        }
    }
}

/// Simple seeded LCG (glibc `rand_r`-style constants), chosen so the
/// planner has no external RNG dependency and reproduces identically
/// across runs and platforms given the same seed (spec.md §4.3).
struct Lcg {
    state: u32,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self {
            state: seed as u32 ^ 0x5bd1_e995,
        }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(1_103_515_245)
            .wrapping_add(12_345);
        (self.state >> 16) & 0x7fff
    }

    fn next_unit(&mut self) -> f64 {
        self.next_u32() as f64 / 0x7fff as f64
    }

    fn next_below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            0
        } else {
            (self.next_u32() as u64).wrapping_mul(bound) >> 15
        }
    }
}

/// Generate the planned operation list for one pass of one target.
pub fn plan_seek_list(spec: &PatternSpec) -> Result<Vec<SeekEntry>, PlanError> {
    let total = spec.total_ops()?;
    if total == 0 {
        return Err(PlanError::Empty);
    }
    let xfer = spec.xfer_size();
    let mut rng = Lcg::new(spec.seed);
    let mut entries = Vec::with_capacity(total as usize);
    let mut schedule_ns = 0f64;
    let mut prior_read_target = 0i64;

    let range = spec
        .range_blocks
        .unwrap_or(total * spec.request_size_blocks.max(1));

    for k in 0..total {
        let op_type = if spec.rwratio < 0.0 {
            OpType::Noop
        } else if spec.rwratio >= 1.0 {
            OpType::Read
        } else if spec.rwratio <= 0.0 {
            OpType::Write
        } else {
            // running-percentage mixed rw: READ when floor(rwratio * k)
            // exceeds the prior running count, else WRITE.
            let target_reads = (spec.rwratio * (k + 1) as f64).floor() as i64;
            if target_reads > prior_read_target {
                prior_read_target = target_reads;
                OpType::Read
            } else {
                OpType::Write
            }
        };

        let block_offset = match spec.order {
            AccessOrder::Sequential => {
                let stride = spec.stagger_blocks.unwrap_or(spec.request_size_blocks.max(1));
                let stream = if spec.interleave > 1 { k % spec.interleave } else { 0 };
                spec.start_offset_blocks
                    + spec.pass_offset_blocks
                    + stream * range
                    + (k / spec.interleave.max(1)) * stride
            }
            AccessOrder::Random => {
                spec.start_offset_blocks + spec.pass_offset_blocks + rng.next_below(range.max(1))
            }
        };

        let seconds_per_op = spec.throttle.seconds_per_op(xfer, &mut rng);
        let scheduled_issue_time_ns = if matches!(spec.throttle, ThrottleSpec::None) {
            0
        } else {
            schedule_ns as u64
        };
        schedule_ns += seconds_per_op * 1_000_000_000.0;

        entries.push(SeekEntry {
            op_type,
            reqsize: xfer,
            block_offset: block_offset * spec.block_size,
            scheduled_issue_time_ns,
        });
    }

    Ok(entries)
}

/// Seek-distance histogram: bucket counts of `|offset[k] - offset[k-1]|`.
pub fn seek_distance_histogram(entries: &[SeekEntry], buckets: usize) -> Result<Vec<u64>, PlanError> {
    if buckets == 0 {
        return Err(PlanError::RangeTooSmall);
    }
    let max_distance = entries
        .windows(2)
        .map(|w| w[1].block_offset.abs_diff(w[0].block_offset))
        .max()
        .unwrap_or(0);
    let bucket_width = (max_distance / buckets as u64).max(1);
    let mut hist = vec![0u64; buckets];
    for w in entries.windows(2) {
        let d = w[1].block_offset.abs_diff(w[0].block_offset);
        let idx = ((d / bucket_width) as usize).min(buckets - 1);
        hist[idx] += 1;
    }
    Ok(hist)
}

pub fn save_seek_list(path: impl AsRef<Path>, entries: &[SeekEntry]) -> std::io::Result<()> {
    let text = serde_yaml::to_string(entries).map_err(std::io::Error::other)?;
    fs::write(path, text)
}

pub fn load_seek_list(path: impl AsRef<Path>) -> std::io::Result<Vec<SeekEntry>> {
    let text = fs::read_to_string(path)?;
    serde_yaml::from_str(&text).map_err(std::io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_spec() -> PatternSpec {
        PatternSpec {
            start_offset_blocks: 0,
            pass_offset_blocks: 0,
            request_size_blocks: 128,
            block_size: 1024,
            numreqs: Some(10),
            bytes: None,
            rwratio: 0.0,
            throttle: ThrottleSpec::None,
            seed: 42,
            order: AccessOrder::Sequential,
            range_blocks: None,
            interleave: 1,
            stagger_blocks: None,
        }
    }

    #[test]
    fn s1_sequential_write_produces_10_ops_of_128kb() {
        let spec = base_spec();
        let entries = plan_seek_list(&spec).unwrap();
        assert_eq!(entries.len(), 10);
        assert!(entries.iter().all(|e| e.op_type == OpType::Write));
        assert!(entries.iter().all(|e| e.reqsize == 128 * 1024));
        // sequential, non-overlapping offsets
        let mut offsets: Vec<_> = entries.iter().map(|e| e.block_offset).collect();
        offsets.dedup();
        assert_eq!(offsets.len(), 10);
    }

    #[test]
    fn empty_plan_is_an_error() {
        let mut spec = base_spec();
        spec.numreqs = None;
        spec.bytes = None;
        assert_eq!(plan_seek_list(&spec).unwrap_err(), PlanError::Empty);
    }

    #[test]
    fn mixed_rwratio_hits_target_read_fraction() {
        let mut spec = base_spec();
        spec.numreqs = Some(100);
        spec.rwratio = 0.3;
        let entries = plan_seek_list(&spec).unwrap();
        let reads = entries.iter().filter(|e| e.op_type == OpType::Read).count();
        assert_eq!(reads, 30);
    }

    #[test]
    fn bandwidth_throttle_sets_increasing_schedule() {
        let mut spec = base_spec();
        spec.throttle = ThrottleSpec::Bandwidth {
            bytes_per_sec: 100.0 * 1024.0 * 1024.0,
            variance: 0.0,
        };
        let entries = plan_seek_list(&spec).unwrap();
        for w in entries.windows(2) {
            assert!(w[1].scheduled_issue_time_ns >= w[0].scheduled_issue_time_ns);
        }
        assert!(entries[0].scheduled_issue_time_ns == 0);
        assert!(entries.last().unwrap().scheduled_issue_time_ns > 0);
    }

    #[test]
    fn save_and_load_round_trips() {
        let spec = base_spec();
        let entries = plan_seek_list(&spec).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeklist.yaml");
        save_seek_list(&path, &entries).unwrap();
        let loaded = load_seek_list(&path).unwrap();
        assert_eq!(entries, loaded);
    }

    #[test]
    fn zero_buckets_is_range_too_small() {
        let spec = base_spec();
        let entries = plan_seek_list(&spec).unwrap();
        assert_eq!(
            seek_distance_histogram(&entries, 0).unwrap_err(),
            PlanError::RangeTooSmall
        );
    }
}
