//! Target and run configuration (spec.md §3 "Target", §6 CLI subset).
//!
//! These are the structs `xdd-cli` builds from `clap` arguments (or a
//! loaded paramfile) and hands to the engine. Parsing/paramfile loading
//! itself is out of scope for `xdd-core` (spec.md §1 names argument
//! parsing and paramfile loading as an external collaborator); this module
//! only defines the shape, following the teacher's `cognitod/src/config.rs`
//! `#[derive(Deserialize)] + #[serde(default = ...)]` style so the same
//! struct can double as a paramfile schema.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pattern::{AccessOrder, ThrottleSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderingMode {
    None,
    Loose,
    Serial,
}

impl Default for OrderingMode {
    fn default() -> Self {
        OrderingMode::None
    }
}

/// A target can be an E2E source *or* destination, never both at once
/// (Design Notes §9 "Multi-role objects" — encoded as a tag, not
/// overlapping option bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Standalone,
    E2eSource,
    E2eDestination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMode {
    None,
    Contents,
    Location,
}

/// `-datapattern` family (spec.md §3 SUPPLEMENT, Design Notes §9
/// "strategy object with a single fill method").
#[derive(Debug, Clone)]
pub enum DataPattern {
    Zero,
    Ascii(u8),
    Sequenced,
    Hex(Vec<u8>),
    File(PathBuf),
}

impl DataPattern {
    /// Fill `buf` (of length `length`) with the pattern's bytes as if it
    /// were the content starting at absolute `offset` in the target.
    pub fn fill(&self, buf: &mut [u8], offset: u64, length: usize) {
        let buf = &mut buf[..length];
        match self {
            DataPattern::Zero => buf.fill(0),
            DataPattern::Ascii(byte) => buf.fill(*byte),
            DataPattern::Sequenced => {
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = ((offset as usize + i) % 256) as u8;
                }
            }
            DataPattern::Hex(bytes) => {
                if bytes.is_empty() {
                    buf.fill(0);
                } else {
                    for (i, b) in buf.iter_mut().enumerate() {
                        *b = bytes[i % bytes.len()];
                    }
                }
            }
            DataPattern::File(path) => {
                // Best-effort: read the file once into memory-sized chunks
                // would belong to a loader external to this pure strategy
                // object; here we fall back to zero if unavailable, since
                // on-disk pattern generation is out of scope (spec.md §1)
                // and this variant exists mainly to round-trip `-datapattern
                // file:<path>` through config.
                let _ = path;
                buf.fill(0);
            }
        }
    }
}

impl Default for DataPattern {
    fn default() -> Self {
        DataPattern::Zero
    }
}

#[derive(Debug, Clone, Default)]
pub struct TargetOptions {
    pub direct_io: bool,
    pub sgio: bool,
    pub create: bool,
    pub recreate: bool,
    pub reopen: bool,
    pub create_new_files: bool,
    pub verify: VerifyModeDefault,
    pub null_target: bool,
    pub restart_enable: bool,
    pub sync_write: bool,
    pub flush_write_every: Option<u32>,
    pub stop_on_error: bool,
}

/// Wrapper so `VerifyMode` (which has no meaningful serde/default use yet)
/// can live in a `#[derive(Default)]` struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyModeDefault(pub VerifyMode);
impl Default for VerifyModeDefault {
    fn default() -> Self {
        VerifyModeDefault(VerifyMode::None)
    }
}

#[derive(Debug, Clone)]
pub struct E2eAddress {
    pub host: String,
    pub base_port: u16,
    pub port_count: u16,
}

#[derive(Debug, Clone, Default)]
pub struct E2eConfig {
    pub addresses: Vec<E2eAddress>,
    pub network_ordering: OrderingMode,
}

#[derive(Debug, Clone)]
pub struct RestartConfig {
    pub file: PathBuf,
    pub freq: Duration,
    pub resume_offset: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct TimestampConfig {
    pub enabled: bool,
    pub wrap: bool,
    pub oneshot: bool,
    pub size: usize,
    pub trigger_time_ns: Option<u64>,
    pub trigger_op: Option<u64>,
    pub output: Option<PathBuf>,
}

/// Per-target configuration (spec.md §3 "Target").
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub index: usize,
    pub path: PathBuf,
    pub block_size: u64,
    pub request_size_blocks: u64,
    pub numreqs: Option<u64>,
    pub bytes: Option<u64>,
    pub queue_depth: usize,
    pub rwratio: f64,
    pub start_offset_blocks: u64,
    pub pass_offset_blocks: u64,
    pub passes: u32,
    pub options: TargetOptions,
    pub storage_ordering: OrderingMode,
    pub throttle: ThrottleSpec,
    pub data_pattern: DataPattern,
    pub report_threshold_ns: Option<u64>,
    pub retry_count: u32,
    pub start_delay: Duration,
    pub pass_delay: Duration,
    pub time_limit: Option<Duration>,
    pub role: Role,
    pub seed: u64,
    pub order: AccessOrder,
    pub range_blocks: Option<u64>,
    pub interleave: u64,
    pub stagger_blocks: Option<u64>,
    pub e2e: Option<E2eConfig>,
    pub restart: Option<RestartConfig>,
    pub timestamp: TimestampConfig,
    /// Cross-target heartbeat cadence/output (spec.md §4.9 C9); shared by
    /// every target in a run, so only one target's value need be set.
    pub heartbeat_secs: Option<u64>,
    pub heartbeat_output: Option<PathBuf>,
    /// `-format` directive string for this target's per-pass results line
    /// (spec.md §4.8, `+OPS`/`+BANDWIDTH`/`+PCT`/`+ETA` directives).
    pub results_format: Option<String>,
}

impl TargetConfig {
    pub fn xfer_size(&self) -> u64 {
        self.request_size_blocks * self.block_size
    }

    /// Default block size is 1024 bytes (spec.md §3 "Target").
    pub fn new(index: usize, path: PathBuf) -> Self {
        Self {
            index,
            path,
            block_size: 1024,
            request_size_blocks: 1,
            numreqs: None,
            bytes: None,
            queue_depth: 1,
            rwratio: 0.0,
            start_offset_blocks: 0,
            pass_offset_blocks: 0,
            passes: 1,
            options: TargetOptions::default(),
            storage_ordering: OrderingMode::None,
            throttle: ThrottleSpec::None,
            data_pattern: DataPattern::default(),
            report_threshold_ns: None,
            retry_count: 0,
            start_delay: Duration::ZERO,
            pass_delay: Duration::ZERO,
            time_limit: None,
            role: Role::Standalone,
            seed: 1,
            order: AccessOrder::Sequential,
            range_blocks: None,
            interleave: 1,
            stagger_blocks: None,
            e2e: None,
            restart: None,
            timestamp: TimestampConfig::default(),
            heartbeat_secs: None,
            heartbeat_output: None,
            results_format: None,
        }
    }
}
