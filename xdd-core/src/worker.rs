//! Worker Thread (spec.md §4.4 C4).
//!
//! A worker owns one reusable I/O buffer and blocks on its own task slot
//! until the Target Thread hands it a `Task`. It performs exactly one
//! operation per wakeup, then signals completion and waits again. This
//! mirrors the teacher's `cognitod/src/runtime/worker.rs` task-cell
//! pattern (one `Mutex<Option<T>>` + `Condvar` per worker, rather than a
//! shared MPMC queue) since spec.md §4.4 assigns tasks to a *specific*
//! worker, not to whichever worker drains a queue first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::Duration;

use log::{debug, trace, warn};

use crate::clock::Clock;
use crate::config::{DataPattern, OrderingMode, TargetOptions};
use crate::counters::TargetCounters;
use crate::error::XddError;
use crate::io_backend::{is_aligned, IoHandle};
use crate::pattern::OpType;
use crate::plan::RunFlags;
use crate::task::{OpKind, Task};
use crate::timestamp::TraceRing;
use crate::tot::Tot;
use xdd_wire::timestamp::{TraceEntry, TraceOpType};

const TASK_POLL: Duration = Duration::from_millis(100);

struct TaskCell {
    task: Option<Task>,
}

/// Per-worker synchronization: the Target Thread pushes a `Task` and waits
/// on `done`; the worker waits on `task` then signals `done`.
pub struct Worker {
    pub index: usize,
    buffer: Mutex<Vec<u8>>,
    cell: Mutex<TaskCell>,
    has_task: Condvar,
    task_done: Condvar,
    /// Fast-path flag so the Target Thread's "any available worker" scan
    /// (spec.md §4.5 C5) doesn't need to lock every worker's cell.
    pub busy: AtomicBool,
    pub eof_received: AtomicBool,
    pub last_error: Mutex<Option<XddError>>,
}

impl Worker {
    pub fn new(index: usize, xfer_size: u64) -> Self {
        Self {
            index,
            buffer: Mutex::new(vec![0u8; xfer_size as usize]),
            cell: Mutex::new(TaskCell { task: None }),
            has_task: Condvar::new(),
            task_done: Condvar::new(),
            busy: AtomicBool::new(false),
            eof_received: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn is_available(&self) -> bool {
        !self.busy.load(Ordering::Acquire)
    }

    /// Copy of the worker's I/O buffer, truncated to `len`. Used by an
    /// E2E source target to retrieve the bytes a completed read put there
    /// (spec.md §4.6: data is framed and sent only after the local read
    /// finishes), safe to call once `wait_idle` confirms the worker is no
    /// longer writing to it.
    pub fn buffer_snapshot(&self, len: usize) -> Vec<u8> {
        let buf = self.buffer.lock().unwrap();
        buf[..len.min(buf.len())].to_vec()
    }

    /// Called by the Target Thread. Blocks until the worker finishes the
    /// previously assigned task (if any), then hands it a new one.
    pub fn assign(&self, task: Task) {
        self.busy.store(true, Ordering::Release);
        let mut cell = self.cell.lock().unwrap();
        cell.task = Some(task);
        self.has_task.notify_one();
    }

    /// Called by the worker thread's main loop: block for the next task.
    fn take_task(&self, flags: &RunFlags) -> Option<Task> {
        let mut cell = self.cell.lock().unwrap();
        loop {
            if let Some(task) = cell.task.take() {
                return Some(task);
            }
            if flags.should_stop() {
                return None;
            }
            let (guard, _) = self.has_task.wait_timeout(cell, TASK_POLL).unwrap();
            cell = guard;
        }
    }

    fn signal_done(&self) {
        self.busy.store(false, Ordering::Release);
        self.task_done.notify_all();
    }

    /// Block until this worker is idle again (used by the Target Thread
    /// at pass boundaries, spec.md §4.5 step "wait for all workers idle").
    pub fn wait_idle(&self, flags: &RunFlags) {
        let cell = self.cell.lock().unwrap();
        let mut cell = cell;
        while self.busy.load(Ordering::Acquire) {
            if flags.should_stop() {
                return;
            }
            let (guard, _) = self.task_done.wait_timeout(cell, TASK_POLL).unwrap();
            cell = guard;
        }
    }
}

/// What the worker needs from its owning Target to perform one op
/// (spec.md §4.4 BEFORE_IO/AFTER_IO). Bundled so `worker_loop` doesn't
/// take a dozen parameters.
pub struct WorkerContext<'a> {
    pub handle: &'a RwLock<Box<dyn IoHandle>>,
    pub tot: &'a Tot,
    pub counters: &'a TargetCounters,
    pub clock: &'a Clock,
    pub options: &'a TargetOptions,
    pub storage_ordering: OrderingMode,
    pub data_pattern: &'a DataPattern,
    pub page_size: u64,
    pub report_threshold_ns: Option<u64>,
    pub target_index: usize,
    pub trace: Option<&'a TraceRing>,
}

/// Run one worker's lifetime: wait for task, perform it, signal done,
/// repeat until `Stop`. Returns once the worker has been told to stop.
pub fn worker_loop(worker: &Worker, ctx: &WorkerContext, flags: &Arc<RunFlags>) {
    loop {
        let task = match worker.take_task(flags) {
            Some(t) => t,
            None => return,
        };

        match task.kind {
            OpKind::Stop => {
                worker.signal_done();
                return;
            }
            OpKind::Eof => {
                worker.eof_received.store(true, Ordering::Release);
                worker.signal_done();
                continue;
            }
            OpKind::Reopen => {
                // Reopen is handled by the Target Thread itself (it owns
                // the handle); the worker just acknowledges.
                worker.signal_done();
                continue;
            }
            OpKind::Io => {}
        }

        if let Err(e) = perform_io(worker, ctx, flags, &task) {
            ctx.counters.record_error();
            *worker.last_error.lock().unwrap() = Some(e);
        }
        worker.signal_done();
    }
}

fn perform_io(
    worker: &Worker,
    ctx: &WorkerContext,
    flags: &Arc<RunFlags>,
    task: &Task,
) -> Result<(), XddError> {
    // BEFORE_IO step 1: storage ordering gate. Under `None` there is no
    // inter-worker happens-before (spec.md §5/§8), so the TOT is skipped
    // entirely rather than serializing every op regardless of
    // `queue_depth`.
    if ctx.storage_ordering != OrderingMode::None {
        ctx.tot
            .wait_for_previous(ctx.target_index, task.op_number, worker.index, flags)?;
    }

    // For Loose ordering the predecessor gate only needs op k-1 to have
    // *started*, so the chain can advance immediately; the AFTER_IO
    // release below is the one that actually completes it (spec.md §4.4
    // step 3: "for loose this is the second release completing the
    // chain").
    let early_release_ns = if ctx.storage_ordering == OrderingMode::Loose {
        let now = ctx.clock.now();
        ctx.tot.release(task.op_number, worker.index, now);
        Some(now)
    } else {
        None
    };

    // BEFORE_IO step 2: direct-I/O alignment fallback. We don't have a
    // second, buffered handle here; unaligned ops on a direct-I/O target
    // are reported rather than silently downgraded, since downgrading
    // would require reopening the file without O_DIRECT mid-run.
    if ctx.options.direct_io
        && !is_aligned(task.byte_offset, task.xfer_size, ctx.page_size)
    {
        warn!(
            "target {}: op {} at offset {} len {} is not page-aligned for direct I/O",
            ctx.target_index, task.op_number, task.byte_offset, task.xfer_size
        );
    }

    let start = ctx.clock.now();
    let mut buf = worker.buffer.lock().unwrap();
    if buf.len() < task.xfer_size as usize {
        buf.resize(task.xfer_size as usize, 0);
    }

    let handle = ctx.handle.read().unwrap();
    let result = match task.op_type {
        OpType::Read => handle.pread(&mut buf[..task.xfer_size as usize], task.byte_offset),
        OpType::Write => {
            match &task.payload {
                Some(payload) => buf[..payload.len()].copy_from_slice(payload),
                None => ctx.data_pattern.fill(&mut buf, task.byte_offset, task.xfer_size as usize),
            }
            handle.pwrite(&buf[..task.xfer_size as usize], task.byte_offset)
        }
        OpType::Noop => handle.noop().map(|_| 0),
    };
    drop(handle);
    drop(buf);
    let end = ctx.clock.now();
    let elapsed = end.saturating_sub(start);

    match result {
        Ok(n) => {
            match task.op_type {
                OpType::Read => ctx.counters.record_read(n as u64, elapsed),
                OpType::Write => ctx.counters.record_write(n as u64, elapsed),
                OpType::Noop => ctx.counters.record_noop(elapsed),
            }
            if let Some(threshold) = ctx.report_threshold_ns {
                if elapsed >= threshold {
                    debug!(
                        "target {}: op {} took {}ns (threshold {}ns)",
                        ctx.target_index, task.op_number, elapsed, threshold
                    );
                }
            }
        }
        Err(io_err) => {
            return Err(XddError::Io {
                target: ctx.target_index,
                worker: worker.index,
                op_number: task.op_number,
                byte_offset: task.byte_offset,
                os_error: io_err.to_string(),
            });
        }
    }

    // AFTER_IO: release the predecessor gate (idempotent for Loose, the
    // only release for Serial) now that the op has actually completed.
    // No-op under `None`, matching the skipped wait above.
    let completion_ns = ctx.clock.now();
    if ctx.storage_ordering != OrderingMode::None && early_release_ns.is_none() {
        ctx.tot.release(task.op_number, worker.index, completion_ns);
    }

    if let Some(trace) = ctx.trace {
        let trace_op = match task.op_type {
            OpType::Read => TraceOpType::Read,
            OpType::Write => TraceOpType::Write,
            OpType::Noop => TraceOpType::Noop,
        };
        let mut entry = TraceEntry::zeroed_with(trace_op, task.pass_number, worker.index as u32);
        entry.op_number = task.op_number;
        entry.byte_offset = task.byte_offset;
        entry.cpu_start_ns = start;
        entry.cpu_end_ns = end;
        entry.disk_start_ns = start;
        entry.disk_end_ns = end;
        entry.disk_xfer_size = task.xfer_size;
        trace.record(entry);
    }
    trace!(
        "target {}: worker {} completed op {} in {}ns",
        ctx.target_index, worker.index, task.op_number, elapsed
    );

    Ok(())
}
