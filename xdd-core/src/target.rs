//! Target Thread (spec.md §4.5 C5).
//!
//! Owns the open file/device handle, the worker pool, and the Target
//! Offset Table for one target. Spawns one scoped OS thread per worker
//! (running [`worker_loop`]) for the lifetime of the run, then the Target
//! thread itself drives the pass loop: generate (or reuse) a seek list,
//! dispatch each entry to whichever worker is free, wait for the pass to
//! drain, report, repeat for `passes`. `std::thread::scope` keeps the
//! worker threads borrowing the Target's handle/TOT/counters directly
//! instead of promoting them to `'static` via extra `Arc`s.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use log::info;

use crate::barrier::OccupantKind;
use crate::clock::Clock;
use crate::config::{Role, TargetConfig};
use crate::counters::{CountersSnapshot, TargetCounters};
use crate::e2e::{DestinationSession, SourceSession};
use crate::error::XddError;
use crate::io_backend::{IoBackend, IoHandle, OpenSpec};
use crate::pattern::{plan_seek_list, OpType, PatternSpec};
use crate::plan::RunFlags;
use crate::restart::RestartState;
use crate::results::{self, PassResult, ResultsBarriers};
use crate::task::Task;
use crate::throttle::wait_for_issue_time;
use crate::timestamp::{TraceRing, TriggerMode, WrapMode};
use crate::tot::Tot;
use crate::worker::{worker_loop, Worker, WorkerContext};
use xdd_wire::e2e::E2eHeader;

/// The per-pass results barriers for the whole run, handed in by the
/// multi-target entry point (spec.md §4.8 C8 "Pass lifecycle"). Absent when
/// a `Target` is driven directly (e.g. tests), in which case `run_pass`
/// just skips cross-target synchronization.
pub struct PassCoordination<'a> {
    pub barriers: &'a ResultsBarriers,
}

pub struct Target {
    pub config: TargetConfig,
    pub counters: Arc<TargetCounters>,
    pub tot: Tot,
    pub clock: Arc<Clock>,
    pub workers: Vec<Worker>,
    pub trace: Option<TraceRing>,
    backend: Box<dyn IoBackend>,
    handle: RwLock<Box<dyn IoHandle>>,
    restart: Option<RestartState>,
    next_op_number: std::sync::atomic::AtomicU64,
}

impl Target {
    pub fn open(
        config: TargetConfig,
        backend: Box<dyn IoBackend>,
        clock: Arc<Clock>,
    ) -> Result<Self, XddError> {
        Self::open_with_counters(config, backend, clock, Arc::new(TargetCounters::new()))
    }

    /// Like [`Target::open`] but with a pre-built, externally shared
    /// counters handle, so a caller (the multi-target `run` entry point)
    /// can sample it from a heartbeat thread before/while the target runs.
    pub fn open_with_counters(
        config: TargetConfig,
        backend: Box<dyn IoBackend>,
        clock: Arc<Clock>,
        counters: Arc<TargetCounters>,
    ) -> Result<Self, XddError> {
        let spec = OpenSpec {
            create: config.options.create || config.options.recreate,
            truncate: config.options.recreate,
            direct: config.options.direct_io,
            read: matches!(config.role, Role::Standalone | Role::E2eDestination)
                || config.rwratio < 1.0,
            write: matches!(config.role, Role::Standalone | Role::E2eDestination)
                || config.rwratio > 0.0,
        };
        let handle = backend.open(&config.path, spec).map_err(|e| XddError::Init {
            target: config.index,
            reason: format!("open {}: {e}", config.path.display()),
        })?;

        let restart = config
            .restart
            .as_ref()
            .map(|r| RestartState::new(r.file.clone(), config.path.display().to_string()));

        let xfer_size = config.xfer_size();
        let workers = (0..config.queue_depth.max(1))
            .map(|i| Worker::new(i, xfer_size))
            .collect();

        let trace = if config.timestamp.enabled {
            let wrap = if config.timestamp.wrap { WrapMode::Wrap } else { WrapMode::Oneshot };
            let trigger = match (config.timestamp.trigger_time_ns, config.timestamp.trigger_op) {
                (Some(t), _) => TriggerMode::Time(t),
                (None, Some(op)) => TriggerMode::Op(op),
                (None, None) => TriggerMode::Immediate,
            };
            Some(TraceRing::new(config.timestamp.size, wrap, trigger))
        } else {
            None
        };

        Ok(Self {
            tot: Tot::new(config.queue_depth.max(1)),
            counters,
            workers,
            trace,
            backend,
            handle: RwLock::new(handle),
            restart,
            clock,
            config,
            next_op_number: std::sync::atomic::AtomicU64::new(0),
        })
    }

    fn worker_context(&self) -> WorkerContext<'_> {
        WorkerContext {
            handle: &self.handle,
            tot: &self.tot,
            counters: &self.counters,
            clock: &self.clock,
            options: &self.config.options,
            storage_ordering: self.config.storage_ordering,
            data_pattern: &self.config.data_pattern,
            page_size: self.backend.page_size(),
            report_threshold_ns: self.config.report_threshold_ns,
            target_index: self.config.index,
            trace: self.trace.as_ref(),
        }
    }

    fn next_op_number(&self) -> u64 {
        self.next_op_number.fetch_add(1, Ordering::SeqCst)
    }

    /// Pick an idle worker, polling briefly if all are busy (spec.md
    /// §4.5 "worker selection"). `queue_depth == 1` always returns that
    /// one worker once it's free.
    fn select_worker(&self, flags: &RunFlags) -> Option<&Worker> {
        loop {
            if flags.should_stop() {
                return None;
            }
            if let Some(w) = self.workers.iter().find(|w| w.is_available()) {
                return Some(w);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn pattern_spec(&self) -> PatternSpec {
        PatternSpec {
            start_offset_blocks: self.config.start_offset_blocks,
            pass_offset_blocks: self.config.pass_offset_blocks,
            request_size_blocks: self.config.request_size_blocks,
            block_size: self.config.block_size,
            numreqs: self.config.numreqs,
            bytes: self.config.bytes,
            rwratio: self.config.rwratio,
            throttle: self.config.throttle,
            seed: self.config.seed,
            order: self.config.order,
            range_blocks: self.config.range_blocks,
            interleave: self.config.interleave,
            stagger_blocks: self.config.stagger_blocks,
        }
    }

    fn stop_workers(&self) {
        for worker in &self.workers {
            worker.assign(Task::stop());
        }
    }

    /// Run every configured pass for a standalone (non-E2E) target.
    pub fn run_standalone(&self, flags: &Arc<RunFlags>) -> Result<(), XddError> {
        self.run_standalone_inner(flags, None)
    }

    /// Like [`Target::run_standalone`] but synchronized against the other
    /// targets in the run via `coordination`'s results barriers (spec.md
    /// §4.8 C8 "Pass lifecycle"). Used by the multi-target `run` entry
    /// point; not needed when driving one `Target` in isolation.
    pub fn run_standalone_with_coordination(
        &self,
        flags: &Arc<RunFlags>,
        coordination: &PassCoordination,
    ) -> Result<(), XddError> {
        self.run_standalone_inner(flags, Some(coordination))
    }

    fn run_standalone_inner(
        &self,
        flags: &Arc<RunFlags>,
        coordination: Option<&PassCoordination>,
    ) -> Result<(), XddError> {
        let ctx = self.worker_context();
        let restart_done = AtomicBool::new(false);
        std::thread::scope(|scope| {
            for worker in &self.workers {
                let ctx = &ctx;
                let flags = flags.clone();
                scope.spawn(move || worker_loop(worker, ctx, &flags));
            }
            if let Some(restart) = &self.restart {
                let freq = self.config.restart.as_ref().map(|r| r.freq).unwrap_or(Duration::from_secs(30));
                let flags = flags.clone();
                let restart_done = &restart_done;
                scope.spawn(move || run_restart_monitor(restart, freq, &flags, restart_done));
            }

            let spec = self.pattern_spec();
            for pass in 0..self.config.passes {
                if flags.should_stop() {
                    break;
                }
                if !self.config.start_delay.is_zero() && pass == 0 {
                    std::thread::sleep(self.config.start_delay);
                }
                self.run_pass(pass, &spec, flags, coordination)?;
                if !self.config.pass_delay.is_zero() {
                    std::thread::sleep(self.config.pass_delay);
                }
                if self.config.options.reopen {
                    self.reopen(flags)?;
                }
            }
            self.stop_workers();
            restart_done.store(true, Ordering::Release);
            Ok(())
        })?;

        self.dump_trace()?;

        if let Some(restart) = &self.restart {
            restart.mark_successful().map_err(|e| XddError::Init {
                target: self.config.index,
                reason: format!("restart checkpoint: {e}"),
            })?;
        }
        Ok(())
    }

    /// Write the collected timestamp trace to its configured output path
    /// as CSV, if tracing was enabled (spec.md §4.10).
    fn dump_trace(&self) -> Result<(), XddError> {
        let (trace, path) = match (&self.trace, &self.config.timestamp.output) {
            (Some(t), Some(p)) => (t, p),
            _ => return Ok(()),
        };
        let file = std::fs::File::create(path).map_err(|e| XddError::Init {
            target: self.config.index,
            reason: format!("creating trace output {}: {e}", path.display()),
        })?;
        trace.dump_csv(file, true).map_err(|e| XddError::Init {
            target: self.config.index,
            reason: format!("writing trace output {}: {e}", path.display()),
        })
    }

    fn run_pass(
        &self,
        pass: u32,
        spec: &PatternSpec,
        flags: &Arc<RunFlags>,
        coordination: Option<&PassCoordination>,
    ) -> Result<(), XddError> {
        let occupant_name = || format!("target{}", self.config.index);
        if let Some(coord) = coordination {
            coord.barriers.startpass.wait(OccupantKind::Target, occupant_name(), &self.clock);
        }

        let seek_list = plan_seek_list(spec)?;
        let pass_start = Instant::now();
        let before = self.counters.snapshot();

        for entry in &seek_list {
            if flags.should_stop() {
                break;
            }
            wait_for_issue_time(&self.clock, entry.scheduled_issue_time_ns);
            let worker = match self.select_worker(flags) {
                Some(w) => w,
                None => break,
            };
            let byte_offset = entry.block_offset;
            let task = Task::io(self.next_op_number(), entry.op_type, byte_offset, entry.reqsize)
                .with_pass(pass);
            worker.assign(task);

            if let Some(restart) = &self.restart {
                restart.advance(byte_offset, entry.reqsize);
            }
        }

        for worker in &self.workers {
            worker.wait_idle(flags);
        }

        if let Some(threshold) = self.config.time_limit {
            if pass_start.elapsed() > threshold {
                flags.raise_time_expired();
            }
        }

        if let Some(coord) = coordination {
            coord.barriers.endpass.wait(OccupantKind::Target, occupant_name(), &self.clock);
        }

        let after = self.counters.snapshot();
        let result = PassResult {
            target_index: self.config.index,
            pass_number: pass,
            snapshot: pass_delta(before, after),
            elapsed: pass_start.elapsed(),
        };
        if let Some(format) = &self.config.results_format {
            info!("{}", results::format_pass_result(format, &result, self.config.numreqs));
        } else {
            info!(
                "target {}: pass {} complete ({} ops, {:.0} B/s)",
                self.config.index,
                pass,
                result.total_ops(),
                result.bandwidth_bytes_per_sec()
            );
        }

        if let Some(coord) = coordination {
            coord.barriers.display.wait(OccupantKind::Target, occupant_name(), &self.clock);
            coord.barriers.waitforcleanup.wait(OccupantKind::Target, occupant_name(), &self.clock);
        }

        Ok(())
    }

    /// E2E source role: read locally via workers, then frame and send
    /// each completed buffer over the configured session (spec.md §4.6).
    pub fn run_e2e_source(&self, session: &SourceSession, flags: &Arc<RunFlags>) -> Result<(), XddError> {
        let ctx = self.worker_context();
        let result: Result<(), XddError> = std::thread::scope(|scope| {
            for worker in &self.workers {
                let ctx = &ctx;
                let flags = flags.clone();
                scope.spawn(move || worker_loop(worker, ctx, &flags));
            }

            let spec = self.pattern_spec();
            let seek_list = plan_seek_list(&spec)?;

            for entry in &seek_list {
                if flags.should_stop() {
                    break;
                }
                wait_for_issue_time(&self.clock, entry.scheduled_issue_time_ns);
                let worker = match self.select_worker(flags) {
                    Some(w) => w,
                    None => break,
                };
                let byte_offset = entry.block_offset;
                let xfer_size = entry.reqsize;
                let op_number = self.next_op_number();
                let task = Task::io(op_number, OpType::Read, byte_offset, xfer_size);
                worker.assign(task);
                worker.wait_idle(flags);

                let send_time_ns = self.clock.now();
                let header = E2eHeader::data(worker.index as u32, op_number, send_time_ns, byte_offset, xfer_size);
                let stream_idx = session.stream_for_worker(worker.index);
                let payload = worker.buffer_snapshot(xfer_size as usize);
                session
                    .send_data(stream_idx, header, &payload)
                    .map_err(|e| XddError::Network {
                        target: self.config.index,
                        worker: worker.index,
                        reason: e.to_string(),
                    })?;
            }
            session
                .send_eof(0, seek_list.len() as u64, self.clock.now())
                .map_err(|e| XddError::Network {
                    target: self.config.index,
                    worker: 0,
                    reason: e.to_string(),
                })?;
            self.stop_workers();
            Ok(())
        });
        result?;
        self.dump_trace()
    }

    /// E2E destination role: receive frames and dispatch local writes.
    pub fn run_e2e_destination(
        &self,
        session: &mut DestinationSession,
        flags: &Arc<RunFlags>,
    ) -> Result<(), XddError> {
        let ctx = self.worker_context();
        let restart_done = AtomicBool::new(false);
        std::thread::scope(|scope| {
            for worker in &self.workers {
                let ctx = &ctx;
                let flags = flags.clone();
                scope.spawn(move || worker_loop(worker, ctx, &flags));
            }
            if let Some(restart) = &self.restart {
                let freq = self.config.restart.as_ref().map(|r| r.freq).unwrap_or(Duration::from_secs(30));
                let flags = flags.clone();
                let restart_done = &restart_done;
                scope.spawn(move || run_restart_monitor(restart, freq, &flags, restart_done));
            }

            let mut active_streams: Vec<usize> = (0..session.stream_count()).collect();
            while !active_streams.is_empty() && !flags.should_stop() {
                active_streams.retain(|&idx| match session.recv_frame(idx) {
                    Ok(Some((header, payload))) => {
                        if let Some(worker) = self.select_worker(flags) {
                            let task = Task::io(
                                self.next_op_number(),
                                OpType::Write,
                                header.byte_offset,
                                header.data_length,
                            )
                            .with_payload(payload);
                            worker.assign(task);
                            if let Some(restart) = &self.restart {
                                restart.advance(header.byte_offset, header.data_length);
                            }
                        }
                        true
                    }
                    Ok(None) => false,
                    Err(_) => false,
                });
            }
            for worker in &self.workers {
                worker.wait_idle(flags);
            }
            self.stop_workers();
            restart_done.store(true, Ordering::Release);
            Ok::<(), XddError>(())
        })?;

        self.dump_trace()?;

        if let Some(restart) = &self.restart {
            restart.mark_successful().map_err(|e| XddError::Init {
                target: self.config.index,
                reason: format!("restart checkpoint: {e}"),
            })?;
        }
        Ok(())
    }

    /// Reopen the target's handle between passes (spec.md §4.5 step 4a,
    /// `-reopen`/`-recreate`/`-createnewfiles`). Posts a `Reopen` task to
    /// every worker first and waits for each to acknowledge it, so no
    /// worker is mid-I/O against the handle by the time it's replaced.
    fn reopen(&self, flags: &Arc<RunFlags>) -> Result<(), XddError> {
        for worker in &self.workers {
            worker.assign(Task::reopen(self.next_op_number()));
        }
        for worker in &self.workers {
            worker.wait_idle(flags);
        }

        let spec = OpenSpec {
            create: self.config.options.create
                || self.config.options.recreate
                || self.config.options.create_new_files,
            truncate: self.config.options.recreate || self.config.options.create_new_files,
            direct: self.config.options.direct_io,
            read: matches!(self.config.role, Role::Standalone | Role::E2eDestination)
                || self.config.rwratio < 1.0,
            write: matches!(self.config.role, Role::Standalone | Role::E2eDestination)
                || self.config.rwratio > 0.0,
        };
        let new_handle = self.backend.open(&self.config.path, spec).map_err(|e| XddError::Init {
            target: self.config.index,
            reason: format!("reopen {}: {e}", self.config.path.display()),
        })?;
        *self.handle.write().unwrap() = new_handle;
        Ok(())
    }
}

/// Per-pass counter deltas (spec.md §4.8 "Pass Result"), derived from two
/// cumulative snapshots taken before and after a pass.
fn pass_delta(before: CountersSnapshot, after: CountersSnapshot) -> CountersSnapshot {
    CountersSnapshot {
        read_ops: after.read_ops - before.read_ops,
        write_ops: after.write_ops - before.write_ops,
        noop_ops: after.noop_ops - before.noop_ops,
        error_ops: after.error_ops - before.error_ops,
        bytes_completed: after.bytes_completed - before.bytes_completed,
        longest_op_ns: after.longest_op_ns,
        shortest_op_ns: after.shortest_op_ns,
    }
}

/// Periodically checkpoints `restart` to disk until `done` is set or the
/// run is canceled (spec.md §4.9 C9 "restart monitor thread"). Runs inside
/// the target's own worker scope rather than as a single cross-target
/// thread, since restart state is already owned per-`Target`.
fn run_restart_monitor(restart: &RestartState, freq: Duration, flags: &RunFlags, done: &AtomicBool) {
    let poll = Duration::from_millis(200).min(freq.max(Duration::from_millis(1)));
    let mut waited = Duration::ZERO;
    while !done.load(Ordering::Acquire) && !flags.should_stop() {
        std::thread::sleep(poll);
        waited += poll;
        if waited >= freq {
            let _ = restart.checkpoint();
            waited = Duration::ZERO;
        }
    }
}
