//! Persistent run history.
//!
//! Reports are appended to a JSON file so past runs stay inspectable
//! across restarts (`mlpipe history`).

use std::fs;
use std::path::PathBuf;

use crate::error::Result;
use crate::mlog_debug;
use crate::runner::executor::RunReport;

/// Append-only log of run reports, persisted as pretty-printed JSON.
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    records: Vec<RunReport>,
}

impl RunLog {
    /// Open (or create) the log at the given path.
    pub fn open(path: PathBuf) -> Result<Self> {
        let records = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            Vec::new()
        };
        mlog_debug!(
            "RunLog::open path={} records={}",
            path.display(),
            records.len()
        );
        Ok(Self { path, records })
    }

    /// Append a report and persist immediately.
    pub fn append(&mut self, report: RunReport) -> Result<()> {
        self.records.push(report);
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.records)?)?;
        Ok(())
    }

    /// All recorded runs, oldest first.
    pub fn records(&self) -> &[RunReport] {
        &self.records
    }

    /// The most recent `n` runs, oldest first.
    pub fn recent(&self, n: usize) -> &[RunReport] {
        &self.records[self.records.len().saturating_sub(n)..]
    }
}
