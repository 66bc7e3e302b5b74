//! One-way reconciliation of a local directory into an object-store prefix.
//!
//! Files missing remotely or whose size differs are uploaded; files already
//! present with a matching size are skipped, so re-running a sync
//! reconciles rather than duplicates. All failures propagate to the
//! caller; a failed upload fails the sync task.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::pipeline::store::ObjectStore;
use crate::workflow::TaskHandler;
use crate::{mlog, mlog_trace};

/// A local directory and the bucket/prefix it reconciles into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTarget {
    pub local_dir: PathBuf,
    pub bucket: String,
    pub prefix: String,
}

impl SyncTarget {
    pub fn new(local_dir: PathBuf, bucket: &str, prefix: &str) -> Self {
        Self {
            local_dir,
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        }
    }
}

impl std::fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> s3://{}/{}",
            self.local_dir.display(),
            self.bucket,
            self.prefix
        )
    }
}

/// Outcome of a single directory sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub uploaded: usize,
    pub skipped: usize,
    pub bytes: u64,
}

/// Reconcile `target.local_dir` into `s3://bucket/prefix`.
///
/// # Errors
/// Returns an error if the local directory is missing (a successful
/// upstream run is expected to have produced it), if it cannot be walked,
/// or if a listing/upload fails.
pub async fn sync_dir(store: &dyn ObjectStore, target: &SyncTarget) -> Result<SyncReport> {
    if !target.local_dir.is_dir() {
        return Err(Error::Validation(format!(
            "sync source {} is not a directory",
            target.local_dir.display()
        )));
    }

    let remote: HashMap<String, u64> = store
        .list(&target.bucket, &target.prefix)
        .await?
        .into_iter()
        .map(|o| (o.key, o.size))
        .collect();

    let mut report = SyncReport::default();
    for entry in WalkDir::new(&target.local_dir) {
        let entry = entry.map_err(|e| {
            Error::Validation(format!("walk {}: {}", target.local_dir.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry.path().strip_prefix(&target.local_dir).map_err(|e| {
            Error::Validation(format!("relativize {}: {}", entry.path().display(), e))
        })?;
        let key = object_key(&target.prefix, rel);
        let size = entry
            .metadata()
            .map_err(|e| Error::Validation(format!("stat {}: {}", entry.path().display(), e)))?
            .len();

        if remote.get(&key) == Some(&size) {
            mlog_trace!("sync skip {} (unchanged, {} bytes)", key, size);
            report.skipped += 1;
            continue;
        }

        let body = tokio::fs::read(entry.path()).await?;
        store.put(&target.bucket, &key, body).await?;
        mlog_trace!("sync put {} ({} bytes)", key, size);
        report.uploaded += 1;
        report.bytes += size;
    }

    mlog!(
        "sync {}: {} uploaded, {} skipped, {} bytes",
        target,
        report.uploaded,
        report.skipped,
        report.bytes
    );
    Ok(report)
}

/// Object key for a file path relative to the sync root.
fn object_key(prefix: &str, rel: &Path) -> String {
    let rel: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let rel = rel.join("/");
    if prefix.is_empty() {
        rel
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), rel)
    }
}

/// Task handler that syncs each configured target in order.
pub struct SyncTask {
    store: Arc<dyn ObjectStore>,
    targets: Vec<SyncTarget>,
}

impl SyncTask {
    pub fn new(store: Arc<dyn ObjectStore>, targets: Vec<SyncTarget>) -> Self {
        Self { store, targets }
    }
}

#[async_trait]
impl TaskHandler for SyncTask {
    async fn execute(&self) -> Result<()> {
        for target in &self.targets {
            sync_dir(self.store.as_ref(), target).await?;
        }
        Ok(())
    }
}
