//! Results pipeline (spec.md §4.8 C8): per-pass reporting plus the
//! staged barriers that keep every target's pass boundaries aligned
//! before a report is emitted.

use std::sync::Arc;
use std::time::Duration;

use crate::barrier::{Barrier, BarrierRegistry, OccupantKind};
use crate::clock::Clock;
use crate::counters::CountersSnapshot;
use crate::error::XddError;

/// The four stages every target synchronizes on once per pass (spec.md
/// §4.8 "Pass lifecycle"): all targets finish issuing ops (`startpass` is
/// really "all workers idle, about to report"), the report is computed,
/// displayed, and only then does the next pass (or cleanup) begin.
#[derive(Clone)]
pub struct ResultsBarriers {
    pub startpass: Arc<Barrier>,
    pub endpass: Arc<Barrier>,
    pub display: Arc<Barrier>,
    pub waitforcleanup: Arc<Barrier>,
}

impl ResultsBarriers {
    pub fn new(registry: &BarrierRegistry, target_count: usize) -> Self {
        Self {
            startpass: registry.create("results.startpass", target_count),
            endpass: registry.create("results.endpass", target_count),
            display: registry.create("results.display", target_count),
            waitforcleanup: registry.create("results.waitforcleanup", target_count),
        }
    }
}

/// One pass's reportable numbers, derived from a [`CountersSnapshot`] plus
/// timing (spec.md §3 "Pass Result").
#[derive(Debug, Clone, Copy)]
pub struct PassResult {
    pub target_index: usize,
    pub pass_number: u32,
    pub snapshot: CountersSnapshot,
    pub elapsed: Duration,
}

impl PassResult {
    pub fn total_ops(&self) -> u64 {
        self.snapshot.read_ops + self.snapshot.write_ops + self.snapshot.noop_ops
    }

    pub fn bandwidth_bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.snapshot.bytes_completed as f64 / secs
        }
    }

    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.total_ops() as f64 / secs
        }
    }
}

/// Render `format` against a [`PassResult`], substituting the directive
/// table from spec.md §6 (`+OPS`, `+BANDWIDTH`, `+PCT`, `+ETA`; an
/// unrecognized `+WORD` token is left verbatim, matching the teacher's
/// tolerant-template style in `cognitod/src/report.rs`).
pub fn format_pass_result(format: &str, result: &PassResult, total_ops_planned: Option<u64>) -> String {
    let mut out = String::with_capacity(format.len());
    let mut rest = format;
    while let Some(plus_idx) = rest.find('+') {
        out.push_str(&rest[..plus_idx]);
        let after = &rest[plus_idx + 1..];
        let token_len = after
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after.len());
        let token = &after[..token_len];
        match token {
            "OPS" => out.push_str(&result.total_ops().to_string()),
            "BANDWIDTH" => out.push_str(&format!("{:.2}", result.bandwidth_bytes_per_sec())),
            "PCT" => {
                let pct = match total_ops_planned {
                    Some(planned) if planned > 0 => {
                        (result.total_ops() as f64 / planned as f64) * 100.0
                    }
                    _ => 0.0,
                };
                out.push_str(&format!("{:.1}", pct));
            }
            "ETA" => {
                let eta = match total_ops_planned {
                    Some(planned) if result.ops_per_sec() > 0.0 && planned > result.total_ops() => {
                        (planned - result.total_ops()) as f64 / result.ops_per_sec()
                    }
                    _ => 0.0,
                };
                out.push_str(&format!("{:.1}s", eta));
            }
            _ => {
                out.push('+');
                out.push_str(token);
            }
        }
        rest = &after[token_len..];
    }
    out.push_str(rest);
    out
}

/// Wait at a results barrier, mapping a leaked/poisoned barrier into the
/// engine's error type rather than panicking the reporting thread.
pub fn wait_at(barrier: &Barrier, name: &str, kind: OccupantKind, clock: &Clock) -> Result<(), XddError> {
    barrier.wait(kind, name, clock);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> PassResult {
        PassResult {
            target_index: 0,
            pass_number: 1,
            snapshot: CountersSnapshot {
                read_ops: 10,
                write_ops: 0,
                noop_ops: 0,
                error_ops: 0,
                bytes_completed: 10 * 4096,
                longest_op_ns: 100,
                shortest_op_ns: 10,
            },
            elapsed: Duration::from_secs(1),
        }
    }

    #[test]
    fn ops_directive_substitutes() {
        let result = sample_result();
        let s = format_pass_result("ops=+OPS done", &result, None);
        assert_eq!(s, "ops=10 done");
    }

    #[test]
    fn unknown_directive_passes_through() {
        let result = sample_result();
        let s = format_pass_result("+NOTADIRECTIVE", &result, None);
        assert_eq!(s, "+NOTADIRECTIVE");
    }

    #[test]
    fn pct_directive_uses_planned_total() {
        let result = sample_result();
        let s = format_pass_result("+PCT%", &result, Some(100));
        assert_eq!(s, "10.0%");
    }
}
