//! `clap` argument surface (spec.md §6, SPEC_FULL.md §6 AMBIENT note).
//!
//! Grouped the way the teacher's `cognitod` CLI flattens related flags
//! into `#[derive(Args)]` sub-structs rather than one flat struct. This is
//! a practical, documented subset of the historical flag grammar, not a
//! byte-for-byte compatible reimplementation (spec.md §1 Non-goals).

use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "xdd", version, about = "Storage and network benchmarking / E2E copy engine")]
pub struct Cli {
    #[command(flatten)]
    pub targets: TargetOpts,
    #[command(flatten)]
    pub seek: SeekOpts,
    #[command(flatten)]
    pub throttle: ThrottleOpts,
    #[command(flatten)]
    pub ordering: OrderingOpts,
    #[command(flatten)]
    pub e2e: E2eOpts,
    #[command(flatten)]
    pub lockstep: LockstepOpts,
    #[command(flatten)]
    pub timestamp: TimestampOpts,
    #[command(flatten)]
    pub restart: RestartOpts,
    #[command(flatten)]
    pub heartbeat: HeartbeatOpts,

    /// Increase log verbosity (-v, -vv); defaults to `warn`.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Args, Debug)]
pub struct TargetOpts {
    /// One or more target paths; repeat for multiple targets.
    #[arg(long = "target", required = true)]
    pub target: Vec<PathBuf>,

    #[arg(long, value_enum, default_value = "write")]
    pub op: OpArg,

    /// Request size in blocks.
    #[arg(long, default_value_t = 1)]
    pub reqsize: u64,

    #[arg(long, default_value_t = 1024)]
    pub blocksize: u64,

    #[arg(long)]
    pub numreqs: Option<u64>,

    #[arg(long)]
    pub bytes: Option<u64>,

    #[arg(long, default_value_t = 1)]
    pub queuedepth: usize,

    #[arg(long, default_value_t = 1)]
    pub passes: u32,

    #[arg(long)]
    pub create: bool,

    #[arg(long)]
    pub recreate: bool,

    #[arg(long)]
    pub reopen: bool,

    #[arg(long)]
    pub direct: bool,

    #[arg(long, value_enum, default_value = "zero")]
    pub datapattern: DataPatternArg,

    /// Byte value for `--datapattern ascii`, e.g. 65 for 'A'.
    #[arg(long, default_value_t = 0)]
    pub datapattern_byte: u8,

    /// Nanosecond threshold above which a completed op is logged.
    #[arg(long)]
    pub report_threshold_ns: Option<u64>,

    #[arg(long)]
    pub time_limit_secs: Option<u64>,

    /// Per-pass results line template, e.g. "+OPS ops, +BANDWIDTH B/s".
    #[arg(long)]
    pub results_format: Option<String>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum OpArg {
    Read,
    Write,
    Mixed,
    Noop,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum DataPatternArg {
    Zero,
    Ascii,
    Sequenced,
}

#[derive(Args, Debug)]
pub struct SeekOpts {
    #[arg(long, value_enum, default_value = "sequential")]
    pub seek: SeekArg,

    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Mixed read/write ratio in [0,1]; ignored unless `--op mixed`.
    #[arg(long, default_value_t = 0.5)]
    pub rwratio: f64,

    #[arg(long)]
    pub range_blocks: Option<u64>,

    #[arg(long)]
    pub interleave: Option<u64>,

    #[arg(long)]
    pub stagger_blocks: Option<u64>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum SeekArg {
    Sequential,
    Random,
}

#[derive(Args, Debug)]
pub struct ThrottleOpts {
    #[arg(long, value_enum)]
    pub throttle: Option<ThrottleKindArg>,

    /// Bandwidth (bytes/sec) or IOPS or delay (seconds), depending on `--throttle`.
    #[arg(long, default_value_t = 0.0)]
    pub throttle_value: f64,

    #[arg(long, default_value_t = 0.0)]
    pub throttle_variance: f64,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ThrottleKindArg {
    Bandwidth,
    Iops,
    Delay,
}

#[derive(Args, Debug)]
pub struct OrderingOpts {
    #[arg(long, value_enum, default_value = "none")]
    pub storage_ordering: OrderingArg,

    #[arg(long, value_enum, default_value = "none")]
    pub network_ordering: OrderingArg,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum OrderingArg {
    None,
    Loose,
    Serial,
}

#[derive(Args, Debug)]
pub struct E2eOpts {
    #[arg(long, value_enum)]
    pub e2e_role: Option<E2eRoleArg>,

    /// `host:baseport:portcount`, repeatable.
    #[arg(long = "e2e-address")]
    pub e2e_addresses: Vec<String>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum E2eRoleArg {
    Source,
    Destination,
}

#[derive(Args, Debug)]
pub struct LockstepOpts {
    /// `master_index slave_index interval_kind interval_value completion`.
    #[arg(long = "lockstep", num_args = 5)]
    pub lockstep: Option<Vec<String>>,
}

#[derive(Args, Debug)]
pub struct TimestampOpts {
    #[arg(long)]
    pub timestamp: bool,

    #[arg(long, default_value_t = 4096)]
    pub timestamp_size: usize,

    #[arg(long)]
    pub timestamp_wrap: bool,

    #[arg(long)]
    pub timestamp_trigtime_ns: Option<u64>,

    #[arg(long)]
    pub timestamp_trigop: Option<u64>,

    #[arg(long)]
    pub timestamp_output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RestartOpts {
    #[arg(long)]
    pub restart_enable: bool,

    #[arg(long)]
    pub restart_file: Option<PathBuf>,

    #[arg(long)]
    pub restart_offset: Option<u64>,
}

#[derive(Args, Debug)]
pub struct HeartbeatOpts {
    #[arg(long)]
    pub heartbeat_secs: Option<u64>,

    #[arg(long)]
    pub heartbeat_output: Option<PathBuf>,
}
