//! `xdd` binary entry point.
//!
//! Parses the CLI surface in [`cli`], builds one [`xdd_core::config::TargetConfig`]
//! per `--target`, runs them via [`xdd_core::run`], and maps the result to a
//! process exit code per spec.md §6. Mirrors the teacher's `cognitod`
//! binary shape: a thin `main.rs` that wires `env_logger`, a SIGINT
//! handler, and hands off to the library crate immediately.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use xdd_core::config::{
    DataPattern, E2eAddress, E2eConfig, OrderingMode, RestartConfig, Role, TargetConfig,
    TimestampConfig,
};
use xdd_core::error::{exit_code, XddError};
use xdd_core::pattern::{AccessOrder, ThrottleSpec};
use xdd_core::plan::Plan;

use cli::{Cli, DataPatternArg, E2eRoleArg, OpArg, OrderingArg, SeekArg, ThrottleKindArg};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new().filter_level(log_level).init();

    let plan = Plan::new();
    {
        let flags = plan.flags.clone();
        if let Err(e) = ctrlc::set_handler(move || flags.raise_canceled()) {
            error!("failed to install SIGINT handler: {e}");
        }
    }

    let configs = match build_target_configs(&cli) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    info!("starting run with {} target(s)", configs.len());
    let outcomes = xdd_core::run(&plan, configs);

    let mut worst_code = exit_code::SUCCESS;
    for outcome in &outcomes {
        let ops = outcome.counters.read_ops + outcome.counters.write_ops + outcome.counters.noop_ops;
        info!(
            "target {}: {} ops, {} bytes",
            outcome.index, ops, outcome.counters.bytes_completed
        );
        if let Some(err) = &outcome.error {
            error!("target {}: {err}", outcome.index);
            worst_code = worst_code.max(err.exit_code());
        }
    }

    if let Err(e) = plan.teardown() {
        error!("{e}");
        worst_code = worst_code.max(e.exit_code());
    }

    ExitCode::from(worst_code as u8)
}

fn build_target_configs(cli: &Cli) -> Result<Vec<TargetConfig>, XddError> {
    if cli.targets.target.is_empty() {
        return Err(XddError::Config("at least one --target is required".into()));
    }

    let e2e = build_e2e_config(cli)?;
    let restart = build_restart_config(cli);
    let timestamp = build_timestamp_config(cli);
    let throttle = build_throttle(cli);

    let role = match cli.e2e.e2e_role {
        Some(E2eRoleArg::Source) => Role::E2eSource,
        Some(E2eRoleArg::Destination) => Role::E2eDestination,
        None => Role::Standalone,
    };

    let rwratio = match cli.targets.op {
        OpArg::Read => 0.0,
        OpArg::Write | OpArg::Noop => 1.0,
        OpArg::Mixed => cli.seek.rwratio,
    };

    let data_pattern = match cli.targets.datapattern {
        DataPatternArg::Zero => DataPattern::Zero,
        DataPatternArg::Ascii => DataPattern::Ascii(cli.targets.datapattern_byte),
        DataPatternArg::Sequenced => DataPattern::Sequenced,
    };

    let mut configs = Vec::with_capacity(cli.targets.target.len());
    for (index, path) in cli.targets.target.iter().enumerate() {
        let mut config = TargetConfig::new(index, path.clone());
        config.block_size = cli.targets.blocksize;
        config.request_size_blocks = cli.targets.reqsize;
        config.numreqs = cli.targets.numreqs;
        config.bytes = cli.targets.bytes;
        config.queue_depth = cli.targets.queuedepth;
        config.passes = cli.targets.passes;
        config.rwratio = rwratio;
        config.role = role;
        config.seed = cli.seek.seed.wrapping_add(index as u64);
        config.order = match cli.seek.seek {
            SeekArg::Sequential => AccessOrder::Sequential,
            SeekArg::Random => AccessOrder::Random,
        };
        config.range_blocks = cli.seek.range_blocks;
        config.interleave = cli.seek.interleave.unwrap_or(1);
        config.stagger_blocks = cli.seek.stagger_blocks;
        config.storage_ordering = ordering_from_arg(cli.ordering.storage_ordering);
        config.throttle = throttle;
        config.data_pattern = data_pattern.clone();
        config.report_threshold_ns = cli.targets.report_threshold_ns;
        config.time_limit = cli.targets.time_limit_secs.map(std::time::Duration::from_secs);
        config.options.direct_io = cli.targets.direct;
        config.options.create = cli.targets.create;
        config.options.recreate = cli.targets.recreate;
        config.options.reopen = cli.targets.reopen;
        config.options.restart_enable = cli.restart.restart_enable;
        config.e2e = e2e.clone();
        config.restart = restart.clone();
        config.timestamp = timestamp.clone();
        config.heartbeat_secs = cli.heartbeat.heartbeat_secs;
        config.heartbeat_output = cli.heartbeat.heartbeat_output.clone();
        config.results_format = cli.targets.results_format.clone();
        configs.push(config);
    }
    Ok(configs)
}

fn ordering_from_arg(arg: OrderingArg) -> OrderingMode {
    match arg {
        OrderingArg::None => OrderingMode::None,
        OrderingArg::Loose => OrderingMode::Loose,
        OrderingArg::Serial => OrderingMode::Serial,
    }
}

fn build_throttle(cli: &Cli) -> ThrottleSpec {
    match cli.throttle.throttle {
        None => ThrottleSpec::None,
        Some(ThrottleKindArg::Bandwidth) => ThrottleSpec::Bandwidth {
            bytes_per_sec: cli.throttle.throttle_value,
            variance: cli.throttle.throttle_variance,
        },
        Some(ThrottleKindArg::Iops) => ThrottleSpec::Iops { iops: cli.throttle.throttle_value },
        Some(ThrottleKindArg::Delay) => ThrottleSpec::Delay { seconds: cli.throttle.throttle_value },
    }
}

fn build_e2e_config(cli: &Cli) -> Result<Option<E2eConfig>, XddError> {
    if cli.e2e.e2e_role.is_none() {
        return Ok(None);
    }
    if cli.e2e.e2e_addresses.is_empty() {
        return Err(XddError::Config(
            "--e2e-role requires at least one --e2e-address host:baseport:portcount".into(),
        ));
    }
    let mut addresses = Vec::with_capacity(cli.e2e.e2e_addresses.len());
    for raw in &cli.e2e.e2e_addresses {
        addresses.push(parse_e2e_address(raw)?);
    }
    Ok(Some(E2eConfig {
        addresses,
        network_ordering: ordering_from_arg(cli.ordering.network_ordering),
    }))
}

fn parse_e2e_address(raw: &str) -> Result<E2eAddress, XddError> {
    let mut parts = raw.splitn(3, ':');
    let host = parts.next().unwrap_or_default().to_string();
    let base_port: u16 = parts
        .next()
        .ok_or_else(|| XddError::Config(format!("--e2e-address {raw}: missing port")))?
        .parse()
        .map_err(|_| XddError::Config(format!("--e2e-address {raw}: invalid port")))?;
    let port_count: u16 = parts
        .next()
        .unwrap_or("1")
        .parse()
        .map_err(|_| XddError::Config(format!("--e2e-address {raw}: invalid port count")))?;
    Ok(E2eAddress { host, base_port, port_count })
}

fn build_restart_config(cli: &Cli) -> Option<RestartConfig> {
    if !cli.restart.restart_enable {
        return None;
    }
    Some(RestartConfig {
        file: cli
            .restart
            .restart_file
            .clone()
            .unwrap_or_else(|| std::path::PathBuf::from("xdd.restart")),
        freq: std::time::Duration::from_secs(30),
        resume_offset: cli.restart.restart_offset,
    })
}

fn build_timestamp_config(cli: &Cli) -> TimestampConfig {
    TimestampConfig {
        enabled: cli.timestamp.timestamp,
        wrap: cli.timestamp.timestamp_wrap,
        oneshot: !cli.timestamp.timestamp_wrap,
        size: cli.timestamp.timestamp_size,
        trigger_time_ns: cli.timestamp.timestamp_trigtime_ns,
        trigger_op: cli.timestamp.timestamp_trigop,
        output: cli.timestamp.timestamp_output.clone(),
    }
}
