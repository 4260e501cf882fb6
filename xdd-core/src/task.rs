//! Task descriptor (spec.md §3 "Task", §4.4 C4).
//!
//! Transient: assigned by the Target Thread at each dispatch, valid
//! between the "wait-for-task" and "task-complete" points in the worker.

use crate::pattern::OpType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Io,
    Reopen,
    Stop,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub kind: OpKind,
    pub op_type: OpType,
    pub byte_offset: u64,
    pub xfer_size: u64,
    pub op_number: u64,
    pub scheduled_issue_time_ns: u64,
    /// Payload already received over the network (E2E destination role).
    /// When set, the worker writes this instead of generating a pattern.
    pub payload: Option<Vec<u8>>,
    pub pass_number: u32,
}

impl Task {
    pub fn stop() -> Self {
        Self {
            kind: OpKind::Stop,
            op_type: OpType::Noop,
            byte_offset: 0,
            xfer_size: 0,
            op_number: 0,
            scheduled_issue_time_ns: 0,
            payload: None,
            pass_number: 0,
        }
    }

    pub fn reopen(op_number: u64) -> Self {
        Self {
            kind: OpKind::Reopen,
            op_type: OpType::Noop,
            byte_offset: 0,
            xfer_size: 0,
            op_number,
            scheduled_issue_time_ns: 0,
            payload: None,
            pass_number: 0,
        }
    }

    pub fn eof(op_number: u64) -> Self {
        Self {
            kind: OpKind::Eof,
            op_type: OpType::Noop,
            byte_offset: 0,
            xfer_size: 0,
            op_number,
            scheduled_issue_time_ns: 0,
            payload: None,
            pass_number: 0,
        }
    }

    pub fn io(op_number: u64, op_type: OpType, byte_offset: u64, xfer_size: u64) -> Self {
        Self {
            kind: OpKind::Io,
            op_type,
            byte_offset,
            xfer_size,
            op_number,
            scheduled_issue_time_ns: 0,
            payload: None,
            pass_number: 0,
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_pass(mut self, pass_number: u32) -> Self {
        self.pass_number = pass_number;
        self
    }
}
