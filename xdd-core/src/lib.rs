//! Target/worker execution engine for the xdd storage and network
//! benchmarking / E2E file-copy tool.
//!
//! `xdd-cli` is the only intended caller: it builds a [`config::TargetConfig`]
//! per target, wraps them in a [`plan::Plan`], and calls [`run`].

pub mod barrier;
pub mod clock;
pub mod config;
pub mod counters;
pub mod e2e;
pub mod error;
pub mod heartbeat;
pub mod io_backend;
pub mod lockstep;
pub mod pattern;
pub mod plan;
pub mod restart;
pub mod results;
pub mod target;
pub mod task;
pub mod throttle;
pub mod timestamp;
pub mod tot;
pub mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use config::{E2eConfig, Role, TargetConfig};
use counters::TargetCounters;
use error::XddError;
use heartbeat::{HeartbeatSpec, HeartbeatTarget};
use io_backend::StdIoBackend;
use plan::Plan;
use results::ResultsBarriers;
use target::{PassCoordination, Target};

/// Outcome of one target's run, handed back to the caller for reporting.
pub struct TargetOutcome {
    pub index: usize,
    pub counters: counters::CountersSnapshot,
    pub error: Option<XddError>,
}

/// Run every configured target to completion (spec.md §4.11 "Plan::run").
///
/// Standalone and E2E-source targets run directly; E2E-destination targets
/// first accept their incoming connections (which blocks until the source
/// side connects), all on one scoped thread per target so a slow target
/// doesn't block another's startup. Standalone targets additionally
/// synchronize their per-pass results through `plan.barriers` (spec.md
/// §4.8 C8), and if any target configured a heartbeat interval, one
/// cross-target heartbeat thread (spec.md §4.9 C9) samples every target's
/// counters for the run's duration.
pub fn run(plan: &Plan, configs: Vec<TargetConfig>) -> Vec<TargetOutcome> {
    let clock = Arc::new(clock::Clock::new());
    let flags = plan.flags.clone();

    let standalone_count = configs.iter().filter(|c| c.role == Role::Standalone).count();
    let results_barriers = if standalone_count > 0 {
        Some(ResultsBarriers::new(&plan.barriers, standalone_count))
    } else {
        None
    };

    let counters: Vec<Arc<TargetCounters>> =
        configs.iter().map(|_| Arc::new(TargetCounters::new())).collect();
    let heartbeat_targets: Vec<HeartbeatTarget> = configs
        .iter()
        .zip(&counters)
        .filter_map(|(c, ctr)| {
            c.heartbeat_secs.map(|secs| {
                HeartbeatTarget::new(
                    c.index,
                    HeartbeatSpec { interval: Duration::from_secs(secs), restart_percent: None },
                    ctr.clone(),
                )
            })
        })
        .collect();
    let heartbeat_output = configs.iter().find_map(|c| c.heartbeat_output.clone());
    let heartbeat_done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        if !heartbeat_targets.is_empty() {
            let done = &heartbeat_done;
            let output = heartbeat_output.clone();
            scope.spawn(move || match output {
                Some(path) => match std::fs::File::create(&path) {
                    Ok(file) => heartbeat::run_heartbeat(&heartbeat_targets, done, file),
                    Err(e) => log::error!("heartbeat output {}: {e}", path.display()),
                },
                None => heartbeat::run_heartbeat(&heartbeat_targets, done, std::io::stdout()),
            });
        }

        let mut handles = Vec::with_capacity(configs.len());
        for (config, target_counters) in configs.into_iter().zip(counters.into_iter()) {
            let flags = flags.clone();
            let clock = clock.clone();
            let barriers = results_barriers.clone();
            handles.push(
                scope.spawn(move || run_one_target(config, &flags, clock, target_counters, barriers.as_ref())),
            );
        }
        let outcomes = handles.into_iter().map(|h| h.join().unwrap()).collect();
        heartbeat_done.store(true, Ordering::Release);
        outcomes
    })
}

fn run_one_target(
    config: TargetConfig,
    flags: &Arc<plan::RunFlags>,
    clock: Arc<clock::Clock>,
    counters: Arc<TargetCounters>,
    barriers: Option<&ResultsBarriers>,
) -> TargetOutcome {
    let index = config.index;
    let role = config.role;
    let e2e_config = config.e2e.clone();

    let target = match Target::open_with_counters(config, Box::new(StdIoBackend), clock, counters) {
        Ok(t) => t,
        Err(e) => {
            return TargetOutcome {
                index,
                counters: counters::CountersSnapshot::default(),
                error: Some(e),
            }
        }
    };

    let result = match role {
        Role::Standalone => match barriers {
            Some(barriers) => {
                let coordination = PassCoordination { barriers };
                target.run_standalone_with_coordination(flags, &coordination)
            }
            None => target.run_standalone(flags),
        },
        Role::E2eSource => run_as_e2e_source(&target, e2e_config.as_ref(), flags),
        Role::E2eDestination => run_as_e2e_destination(&target, e2e_config.as_ref(), flags),
    };

    TargetOutcome {
        index,
        counters: target.counters.snapshot(),
        error: result.err(),
    }
}

fn run_as_e2e_source(target: &Target, e2e: Option<&E2eConfig>, flags: &Arc<plan::RunFlags>) -> Result<(), XddError> {
    let e2e = e2e.ok_or_else(|| XddError::Config("E2E source target has no E2E addresses configured".into()))?;
    let session = e2e::SourceSession::connect(&e2e.addresses).map_err(|err| XddError::Network {
        target: target.config.index,
        worker: 0,
        reason: err.to_string(),
    })?;
    target.run_e2e_source(&session, flags)
}

fn run_as_e2e_destination(target: &Target, e2e: Option<&E2eConfig>, flags: &Arc<plan::RunFlags>) -> Result<(), XddError> {
    let e2e = e2e.ok_or_else(|| XddError::Config("E2E destination target has no E2E addresses configured".into()))?;
    let addr = e2e
        .addresses
        .first()
        .ok_or_else(|| XddError::Config("E2E destination target has no bind address".into()))?;
    let mut session = e2e::DestinationSession::listen("0.0.0.0", addr.base_port, addr.port_count)
        .map_err(|err| XddError::Network {
            target: target.config.index,
            worker: 0,
            reason: err.to_string(),
        })?;
    target.run_e2e_destination(&mut session, flags)
}
