//! Error taxonomy (spec.md §7). The teacher has no structured error enum
//! of its own (everywhere is `anyhow::Result`); this is enriched from the
//! `thiserror`-based domain errors in the `ob-poc` example repo, the
//! closest pack precedent for a named error-kind hierarchy.

use thiserror::Error;

/// Exit codes mirroring spec.md §6.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const INIT_FAILURE: i32 = 1;
    pub const INVALID_ARGUMENT_VALUE: i32 = 2;
    pub const INVALID_OPTION: i32 = 3;
    pub const TARGET_START_FAILURE: i32 = 4;
    pub const CANCELED: i32 = 5;
    pub const IO_ERROR: i32 = 6;
}

#[derive(Debug, Error)]
pub enum XddError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("initialization error for target {target}: {reason}")]
    Init { target: usize, reason: String },

    #[error("I/O error on target {target} worker {worker} op {op_number} offset {byte_offset}: {os_error}")]
    Io {
        target: usize,
        worker: usize,
        op_number: u64,
        byte_offset: u64,
        os_error: String,
    },

    #[error("network error on target {target} worker {worker}: {reason}")]
    Network {
        target: usize,
        worker: usize,
        reason: String,
    },

    #[error("ordering error on target {target}: TOT slot for op {op_number} not released within recovery timeout")]
    Ordering { target: usize, op_number: u64 },

    #[error("run time limit expired")]
    TimeoutExpired,

    #[error("run canceled")]
    Canceled,

    #[error("barrier leaked: {0} barrier(s) still registered at teardown")]
    BarrierLeaked(usize),

    #[error("access pattern planner error: {0}")]
    Plan(#[from] PlanError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("seek list is empty: neither numreqs nor bytes was set")]
    Empty,
    #[error("requested histogram range is too small to bucket")]
    RangeTooSmall,
}

impl XddError {
    /// The exit code this error maps to, per spec.md §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            XddError::Config(_) => exit_code::INVALID_OPTION,
            XddError::Init { .. } => exit_code::INIT_FAILURE,
            XddError::Io { .. } => exit_code::IO_ERROR,
            XddError::Network { .. } => exit_code::IO_ERROR,
            XddError::Ordering { .. } => exit_code::TARGET_START_FAILURE,
            XddError::TimeoutExpired => exit_code::SUCCESS,
            XddError::Canceled => exit_code::CANCELED,
            XddError::BarrierLeaked(_) => exit_code::INIT_FAILURE,
            XddError::Plan(_) => exit_code::INVALID_ARGUMENT_VALUE,
        }
    }
}

pub type XddResult<T> = Result<T, XddError>;
