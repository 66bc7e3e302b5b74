//! Training entry point seam.
//!
//! The training procedure itself is external to this crate; it is injected
//! as a `TrainingPipeline` implementation at workflow construction time.
//! `ProcessTraining` is the production implementation, spawning whatever
//! command the configuration names.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::mlog_debug;
use crate::workflow::TaskHandler;

/// A training procedure exposing a single zero-argument run operation.
///
/// Success or failure is whatever the implementation reports; callers do
/// not interpret it beyond the retry policy.
#[async_trait]
pub trait TrainingPipeline: Send + Sync {
    async fn run(&self) -> Result<()>;
}

/// Training pipeline backed by an external command.
pub struct ProcessTraining {
    command: String,
    workdir: Option<PathBuf>,
}

impl ProcessTraining {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            workdir: None,
        }
    }

    pub fn with_workdir(mut self, dir: PathBuf) -> Self {
        self.workdir = Some(dir);
        self
    }
}

#[async_trait]
impl TrainingPipeline for ProcessTraining {
    async fn run(&self) -> Result<()> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::Validation("training command is empty".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(parts);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        mlog_debug!("ProcessTraining: spawning {:?}", self.command);
        let status = cmd.status().await?;
        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(Error::Training(format!(
                "command {:?} exited with {}",
                self.command, code
            )));
        }
        Ok(())
    }
}

/// Task handler adapter for the training task.
pub struct TrainTask {
    pipeline: Arc<dyn TrainingPipeline>,
}

impl TrainTask {
    pub fn new(pipeline: Arc<dyn TrainingPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl TaskHandler for TrainTask {
    async fn execute(&self) -> Result<()> {
        self.pipeline.run().await
    }
}
