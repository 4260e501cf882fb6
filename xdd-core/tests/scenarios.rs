//! End-to-end scenarios driving the public engine API directly, the way
//! `linnix-cli`'s own integration tests drive its daemon library rather
//! than shelling out to the binary.

use std::sync::Arc;
use std::time::Instant;

use xdd_core::clock::Clock;
use xdd_core::config::{DataPattern, Role, TargetConfig, TimestampConfig};
use xdd_core::io_backend::StdIoBackend;
use xdd_core::pattern::{AccessOrder, ThrottleSpec};
use xdd_core::plan::RunFlags;
use xdd_core::target::Target;

/// S1: sequential writes of a fixed ASCII pattern land at the right size
/// and content, and all ops succeed.
#[test]
fn sequential_write_produces_exact_size_and_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x");

    let mut config = TargetConfig::new(0, path.clone());
    config.request_size_blocks = 128;
    config.block_size = 1024;
    config.numreqs = Some(10);
    config.queue_depth = 4;
    config.passes = 1;
    config.rwratio = 1.0;
    config.order = AccessOrder::Sequential;
    config.data_pattern = DataPattern::Ascii(0x41);
    config.options.create = true;
    config.role = Role::Standalone;

    let flags = RunFlags::new();
    let clock = Arc::new(Clock::new());
    let target = Target::open(config, Box::new(StdIoBackend), clock).expect("open target");
    target.run_standalone(&flags).expect("run standalone");

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 10 * 128 * 1024);
    assert!(bytes.iter().all(|&b| b == 0x41));

    let snapshot = target.counters.snapshot();
    assert_eq!(snapshot.write_ops, 10);
    assert_eq!(snapshot.error_ops, 0);
}

/// S3: bandwidth throttling stretches the run to at least the bandwidth-
/// implied duration.
#[test]
fn bandwidth_throttle_stretches_elapsed_time() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x");

    let block_size = 8192u64;
    let numreqs = 3u64;
    let bytes_per_sec = 32_768.0; // 32 KiB/s
    let expected_secs = (numreqs * block_size) as f64 / bytes_per_sec;

    let mut config = TargetConfig::new(0, path);
    config.request_size_blocks = 1;
    config.block_size = block_size;
    config.numreqs = Some(numreqs);
    config.queue_depth = 1;
    config.passes = 1;
    config.rwratio = 1.0;
    config.throttle = ThrottleSpec::Bandwidth { bytes_per_sec, variance: 0.0 };
    config.options.create = true;

    let flags = RunFlags::new();
    let clock = Arc::new(Clock::new());
    let target = Target::open(config, Box::new(StdIoBackend), clock).expect("open target");

    let start = Instant::now();
    target.run_standalone(&flags).expect("run standalone");
    let elapsed = start.elapsed().as_secs_f64();

    assert!(
        elapsed >= expected_secs * 0.9,
        "expected at least {expected_secs:.3}s, got {elapsed:.3}s"
    );
}

/// Invariant: counters are monotonic within a pass and equal the sum of
/// completed transfer sizes (spec.md §8 invariant 1).
#[test]
fn counters_match_total_bytes_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x");

    let mut config = TargetConfig::new(0, path);
    config.request_size_blocks = 4;
    config.block_size = 512;
    config.numreqs = Some(20);
    config.queue_depth = 2;
    config.passes = 1;
    config.rwratio = 1.0;
    config.options.create = true;

    let flags = RunFlags::new();
    let clock = Arc::new(Clock::new());
    let target = Target::open(config, Box::new(StdIoBackend), clock).expect("open target");
    target.run_standalone(&flags).expect("run standalone");

    let snapshot = target.counters.snapshot();
    assert_eq!(snapshot.bytes_completed, 20 * 4 * 512);
}

/// S6: with serial storage ordering, the timestamp trace shows each op's
/// disk completion strictly after the previous op number's.
#[test]
fn serial_ordering_yields_monotonic_completion_trace() {
    use xdd_core::config::OrderingMode;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x");
    let trace_path = dir.path().join("trace.csv");

    let mut config = TargetConfig::new(0, path);
    config.request_size_blocks = 1;
    config.block_size = 512;
    config.numreqs = Some(64);
    config.queue_depth = 8;
    config.passes = 1;
    config.rwratio = 1.0;
    config.storage_ordering = OrderingMode::Serial;
    config.options.create = true;
    config.timestamp = TimestampConfig {
        enabled: true,
        size: 64,
        output: Some(trace_path.clone()),
        ..Default::default()
    };

    let flags = RunFlags::new();
    let clock = Arc::new(Clock::new());
    let target = Target::open(config, Box::new(StdIoBackend), clock).expect("open target");
    target.run_standalone(&flags).expect("run standalone");

    let csv = std::fs::read_to_string(&trace_path).unwrap();
    let mut rows: Vec<(u64, u64, u64)> = csv
        .lines()
        .skip(1)
        .map(|line| {
            let mut fields = line.split(',');
            let op_number: u64 = fields.next().unwrap().parse().unwrap();
            let byte_offset: u64 = fields.next().unwrap().parse().unwrap();
            // skip op_type, worker_no, pass_no, cpu_start_ns, cpu_end_ns, disk_start_ns
            let disk_end_ns: u64 = fields.nth(6).unwrap().parse().unwrap();
            (op_number, byte_offset, disk_end_ns)
        })
        .collect();
    rows.sort_by_key(|(op, _, _)| *op);

    assert_eq!(rows.len(), 64);
    for pair in rows.windows(2) {
        let (prev, _, prev_end) = pair[0];
        let (next, _, next_end) = pair[1];
        assert_eq!(next, prev + 1);
        assert!(
            next_end > prev_end,
            "op {next} completed at {next_end} which is not after op {prev}'s {prev_end}"
        );
    }
}
