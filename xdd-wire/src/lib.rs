//! Shared wire and on-disk layouts for the xdd benchmarking engine.
//!
//! This crate is intentionally dependency-light: it defines only the byte
//! layouts that two independent processes (an E2E source and destination)
//! or two stages of one process (a run and a later trace-file reader) must
//! agree on. All engine logic lives in `xdd-core`.

pub mod e2e;
pub mod restart;
pub mod timestamp;

pub use e2e::{E2eHeader, E2E_HEADER_SIZE, MAGIC_DATA_READY, MAGIC_EOF};
pub use restart::RestartRecord;
pub use timestamp::{TraceEntry, TraceFileHeader, TraceOpType, TRACE_FILE_MAGIC};
