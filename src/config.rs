//! Process configuration, constructed once at startup.
//!
//! Configuration lives in `~/.mlpipe/mlpipe.toml` with defaults matching
//! the canonical deployment; a handful of environment variables override
//! the file, applied once at load time. Task handlers receive what they
//! need from this struct by reference rather than reading the ambient
//! environment themselves.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::mlog_debug;
use crate::pipeline::sync::SyncTarget;
use crate::workflow::schedule::{Interval, Schedule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root under which the training run writes its outputs.
    pub app_root: PathBuf,
    /// Destination bucket for artifact sync.
    pub bucket: String,
    /// Key prefix for the artifacts directory.
    pub artifact_prefix: String,
    /// Key prefix for the trained model directory.
    pub model_prefix: String,
    /// Command that runs the training pipeline.
    pub training_command: Option<String>,
    /// Per-task retry budget.
    pub retries: u32,
    /// Schedule preset (`@hourly`, `@daily`, `@weekly`).
    pub schedule: String,
    /// First schedule boundary, UTC.
    pub start_date: DateTime<Utc>,
    /// Whether boundaries elapsed before startup are run.
    pub catchup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_root: PathBuf::from("/app"),
            bucket: "networksecurity3".to_string(),
            artifact_prefix: "artifact".to_string(),
            model_prefix: "final_model".to_string(),
            training_command: None,
            retries: 2,
            schedule: "@weekly".to_string(),
            start_date: Utc.with_ymd_and_hms(2024, 12, 24, 0, 0, 0).unwrap(),
            catchup: false,
        }
    }
}

impl Config {
    pub fn mlpipe_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".mlpipe"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::mlpipe_dir()?.join("mlpipe.toml"))
    }

    pub fn history_path() -> Result<PathBuf> {
        Ok(Self::mlpipe_dir()?.join("history.json"))
    }

    /// Load from the config file, falling back to defaults, then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        mlog_debug!("Config::load path={}", path.display());
        let mut config = if path.exists() {
            toml::from_str(&fs::read_to_string(&path)?)?
        } else {
            mlog_debug!("Config file not found, using defaults");
            Self::default()
        };
        config.apply_env();
        mlog_debug!(
            "Config loaded: bucket={}, app_root={}, schedule={}, retries={}",
            config.bucket,
            config.app_root.display(),
            config.schedule,
            config.retries
        );
        Ok(config)
    }

    /// Apply environment-variable overrides. Called once during `load`.
    fn apply_env(&mut self) {
        if let Ok(root) = std::env::var("MLPIPE_APP_ROOT") {
            self.app_root = PathBuf::from(root);
        }
        if let Ok(bucket) = std::env::var("MLPIPE_BUCKET") {
            self.bucket = bucket;
        }
        if let Ok(command) = std::env::var("MLPIPE_TRAINING_COMMAND") {
            self.training_command = Some(command);
        }
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::mlpipe_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        mlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    /// Directory the training run writes working artifacts into.
    pub fn artifacts_dir(&self) -> PathBuf {
        self.app_root.join("Artifacts")
    }

    /// Directory the training run writes the final model into.
    pub fn model_dir(&self) -> PathBuf {
        self.app_root.join("final_model")
    }

    /// The two sync targets: artifacts and final model.
    pub fn sync_targets(&self) -> Vec<SyncTarget> {
        vec![
            SyncTarget::new(self.artifacts_dir(), &self.bucket, &self.artifact_prefix),
            SyncTarget::new(self.model_dir(), &self.bucket, &self.model_prefix),
        ]
    }

    /// Parse the schedule fields into a `Schedule`.
    pub fn schedule(&self) -> Result<Schedule> {
        Ok(
            Schedule::new(Interval::from_preset(&self.schedule)?, self.start_date)
                .with_catchup(self.catchup),
        )
    }
}
