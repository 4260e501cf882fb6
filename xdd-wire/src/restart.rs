//! Restart checkpoint record (spec.md §3 "Restart record", §4.9, §6
//! "Restart file format"). Unlike the E2E header and timestamp trace, the
//! restart file is explicitly human-readable text, so this is a plain
//! struct with a line-oriented format rather than a Pod wire layout.

use std::fmt;
use std::str::FromStr;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartRecord {
    pub target_path: String,
    pub byte_offset: u64,
    pub enabled: bool,
    pub resume: bool,
    pub successful: bool,
    pub last_committed_offset: u64,
    pub last_committed_length: u64,
}

const COMPLETION_LINE: &str = "File Copy Operation completed successfully.";

impl RestartRecord {
    pub fn new(target_path: impl Into<String>) -> Self {
        Self {
            target_path: target_path.into(),
            byte_offset: 0,
            enabled: true,
            resume: false,
            successful: false,
            last_committed_offset: 0,
            last_committed_length: 0,
        }
    }

    pub fn mark_successful(&mut self) {
        self.successful = true;
    }
}

impl fmt::Display for RestartRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "target={} last_committed_offset={} last_committed_length={} resume={}",
            self.target_path, self.last_committed_offset, self.last_committed_length, self.resume
        )?;
        if self.successful {
            writeln!(f, "{COMPLETION_LINE}")?;
        }
        Ok(())
    }
}

/// Parsed from a restart file written by [`RestartRecord::Display`].
impl FromStr for RestartRecord {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rec = RestartRecord::new("");
        for line in s.lines() {
            if line.trim() == COMPLETION_LINE {
                rec.successful = true;
                continue;
            }
            for field in line.split_whitespace() {
                let Some((k, v)) = field.split_once('=') else {
                    continue;
                };
                match k {
                    "target" => rec.target_path = v.to_string(),
                    "last_committed_offset" => {
                        rec.last_committed_offset =
                            v.parse().map_err(|e| format!("bad last_committed_offset: {e}"))?;
                        rec.byte_offset = rec.last_committed_offset;
                    }
                    "last_committed_length" => {
                        rec.last_committed_length =
                            v.parse().map_err(|e| format!("bad last_committed_length: {e}"))?;
                    }
                    "resume" => rec.resume = v == "true",
                    _ => {}
                }
            }
        }
        Ok(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_text() {
        let mut rec = RestartRecord::new("/tmp/dest");
        rec.last_committed_offset = 4096;
        rec.last_committed_length = 512;
        rec.mark_successful();
        let text = rec.to_string();
        assert!(text.contains(COMPLETION_LINE));
        let parsed: RestartRecord = text.parse().unwrap();
        assert_eq!(parsed.target_path, "/tmp/dest");
        assert_eq!(parsed.last_committed_offset, 4096);
        assert!(parsed.successful);
    }
}
