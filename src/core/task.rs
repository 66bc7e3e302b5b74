//! Task data model for the workflow graph.
//!
//! Tasks are the named units of work a workflow executes. Each task tracks
//! its status, attempt count, and timing; the action itself lives behind
//! the workflow's handler map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier for a task, unique within a workflow.
///
/// Task ids are caller-chosen names (`train_pipeline`, `sync_data_to_s3`),
/// restricted to lowercase alphanumerics and underscores so they are safe
/// in log lines, object keys, and reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Create a task identifier, validating the name.
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::Validation("task id must not be empty".to_string()));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(Error::Validation(format!(
                "task id {:?} may only contain [a-z0-9_]",
                name
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Task status in its lifecycle.
///
/// Tasks progress through these states as a run attempts, retries, and
/// finishes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TaskStatus {
    /// Task created but not yet attempted in this run.
    Pending,
    /// Task is currently being executed.
    Running,
    /// Task completed successfully.
    Completed,
    /// Task failed after exhausting its retry budget.
    Failed {
        /// Error message describing the final failure.
        error: String,
    },
    /// Task cannot run because an upstream task did not succeed.
    Blocked {
        /// Reason why the task is blocked.
        reason: String,
    },
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed { error } => write!(f, "failed: {}", error),
            TaskStatus::Blocked { reason } => write!(f, "blocked: {}", reason),
        }
    }
}

/// A single task in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// Detailed description of what the task does.
    pub description: String,
    /// Per-task retry override; falls back to the workflow default.
    pub retries: Option<u32>,
    /// Current execution status.
    pub status: TaskStatus,
    /// Number of attempts made so far (0 until first attempt).
    pub attempts: u32,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the first attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(id: TaskId, description: &str) -> Self {
        Self {
            id,
            description: description.to_string(),
            retries: None,
            status: TaskStatus::Pending,
            attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Set a per-task retry budget, overriding the workflow default.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Retry budget for this task given the workflow default.
    pub fn effective_retries(&self, default: u32) -> u32 {
        self.retries.unwrap_or(default)
    }

    /// Record the start of an attempt.
    ///
    /// Increments the attempt counter, transitions to Running, and stamps
    /// the start time on the first attempt.
    pub fn begin_attempt(&mut self) {
        self.attempts += 1;
        self.status = TaskStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    /// Mark the task as successfully completed.
    pub fn complete(&mut self) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the task as failed with the final error message.
    pub fn fail(&mut self, error: &str) {
        self.status = TaskStatus::Failed {
            error: error.to_string(),
        };
        self.completed_at = Some(Utc::now());
    }

    /// Mark the task as blocked by an upstream failure.
    pub fn block(&mut self, reason: &str) {
        self.status = TaskStatus::Blocked {
            reason: reason.to_string(),
        };
        self.completed_at = Some(Utc::now());
    }

    /// Check if the task is in a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Completed | TaskStatus::Failed { .. } | TaskStatus::Blocked { .. }
        )
    }

    /// Check if the task finished successfully.
    pub fn succeeded(&self) -> bool {
        matches!(self.status, TaskStatus::Completed)
    }
}
