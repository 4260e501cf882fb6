//! Restart monitor (spec.md §4.9 C9, supplement): periodically checkpoints
//! each restart-enabled target's committed offset to a small text file
//! using [`xdd_wire::restart::RestartRecord`], and on startup can resume a
//! target from a previous run's checkpoint.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use xdd_wire::restart::RestartRecord;

/// Tracks the highest byte offset known to be durably committed for one
/// target; `checkpoint` serializes it out on the monitor's cadence.
pub struct RestartState {
    path: std::path::PathBuf,
    target_path: String,
    last_committed_offset: AtomicU64,
    last_committed_length: AtomicU64,
}

impl RestartState {
    pub fn new(path: impl Into<std::path::PathBuf>, target_path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            target_path: target_path.into(),
            last_committed_offset: AtomicU64::new(0),
            last_committed_length: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, offset: u64, length: u64) {
        // Only the highest offset matters for resume; workers can commit
        // out of order so this takes the max rather than the latest call.
        self.last_committed_offset.fetch_max(offset, Ordering::SeqCst);
        self.last_committed_length.fetch_max(length, Ordering::SeqCst);
    }

    fn current_record(&self) -> RestartRecord {
        let mut record = RestartRecord::new(self.target_path.clone());
        record.last_committed_offset = self.last_committed_offset.load(Ordering::SeqCst);
        record.last_committed_length = self.last_committed_length.load(Ordering::SeqCst);
        record
    }

    pub fn checkpoint(&self) -> io::Result<()> {
        fs::write(&self.path, self.current_record().to_string())
    }

    pub fn mark_successful(&self) -> io::Result<()> {
        let mut record = self.current_record();
        record.mark_successful();
        fs::write(&self.path, record.to_string())
    }

    /// Load a previous checkpoint, if the file exists and matches this
    /// target's path. Returns `None` for a fresh start.
    pub fn load_resume_offset(path: &Path, target_path: &str) -> io::Result<Option<u64>> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let record: RestartRecord = text
            .parse()
            .map_err(|e: String| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if record.target_path != target_path || record.successful {
            Ok(None)
        } else {
            Ok(Some(record.last_committed_offset))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_then_resume_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("restart.txt");
        let state = RestartState::new(&path, "/data/target0");
        state.advance(4096, 1024);
        state.checkpoint().unwrap();

        let resume = RestartState::load_resume_offset(&path, "/data/target0").unwrap();
        assert_eq!(resume, Some(4096));
    }

    #[test]
    fn successful_run_has_no_resume_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("restart.txt");
        let state = RestartState::new(&path, "/data/target0");
        state.advance(4096, 1024);
        state.mark_successful().unwrap();

        let resume = RestartState::load_resume_offset(&path, "/data/target0").unwrap();
        assert_eq!(resume, None);
    }
}
