//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - An in-memory object store (and one that always fails)
//! - Scripted training fakes (flaky, artifact-writing)
//! - A temporary workspace with a config pointing into it

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use mlpipe::config::Config;
use mlpipe::error::{Error, Result};
use mlpipe::pipeline::{training_workflow, ObjectStore, RemoteObject, TrainingPipeline};
use mlpipe::workflow::Workflow;

/// In-memory object store keyed by (bucket, key).
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted keys stored under a bucket.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<RemoteObject>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((_, k), v)| RemoteObject {
                key: k.clone(),
                size: v.len() as u64,
            })
            .collect())
    }
}

/// Object store whose uploads always fail.
pub struct FailingStore;

#[async_trait]
impl ObjectStore for FailingStore {
    async fn put(&self, _bucket: &str, key: &str, _body: Vec<u8>) -> Result<()> {
        Err(Error::Store(format!("injected put failure for {}", key)))
    }

    async fn list(&self, _bucket: &str, _prefix: &str) -> Result<Vec<RemoteObject>> {
        Ok(Vec::new())
    }
}

/// Training fake that fails a fixed number of times, then succeeds.
pub struct FlakyTraining {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyTraining {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    /// A training fake that never succeeds.
    pub fn always_failing() -> Self {
        Self::new(u32::MAX)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrainingPipeline for FlakyTraining {
    async fn run(&self) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            Err(Error::Training(format!("injected failure {}", call)))
        } else {
            Ok(())
        }
    }
}

/// Training fake that writes artifacts the way a real run would.
pub struct ArtifactWritingTraining {
    app_root: PathBuf,
}

impl ArtifactWritingTraining {
    pub fn new(app_root: PathBuf) -> Self {
        Self { app_root }
    }
}

#[async_trait]
impl TrainingPipeline for ArtifactWritingTraining {
    async fn run(&self) -> Result<()> {
        let artifacts = self.app_root.join("Artifacts");
        std::fs::create_dir_all(artifacts.join("metrics"))?;
        std::fs::write(artifacts.join("report.json"), b"{\"auc\": 0.97}")?;
        std::fs::write(artifacts.join("metrics/scores.csv"), b"epoch,loss\n1,0.3\n")?;

        let model = self.app_root.join("final_model");
        std::fs::create_dir_all(&model)?;
        std::fs::write(model.join("model.pkl"), b"weights")?;
        Ok(())
    }
}

/// A temporary app root plus a config pointing at it.
pub struct TestWorkspace {
    pub temp: TempDir,
    pub config: Config,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("temp dir");
        let mut config = Config::default();
        config.app_root = temp.path().to_path_buf();
        config.bucket = "test-bucket".to_string();
        Self { temp, config }
    }

    /// An artifact-writing training fake rooted in this workspace.
    pub fn artifact_training(&self) -> Arc<ArtifactWritingTraining> {
        Arc::new(ArtifactWritingTraining::new(self.temp.path().to_path_buf()))
    }

    /// Build the canonical workflow with injected fakes.
    pub fn workflow(
        &self,
        training: Arc<dyn TrainingPipeline>,
        store: Arc<dyn ObjectStore>,
    ) -> Workflow {
        training_workflow(&self.config, training, store).expect("workflow builds")
    }
}
