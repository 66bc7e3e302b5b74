//! Single-run executor.
//!
//! The runner walks the workflow's tasks in dependency order, attempts
//! each up to `1 + retries` times, blocks tasks whose upstream did not
//! succeed, and emits lifecycle events over a channel. Each run operates
//! on a cloned task graph; the workflow definition carries no state
//! between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::task::{TaskId, TaskStatus};
use crate::error::{Error, Result};
use crate::runner::RunId;
use crate::workflow::Workflow;
use crate::{mlog, mlog_warn};

/// Events emitted while a run progresses.
///
/// These let the CLI (or any other observer) follow task state changes
/// without polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A run has started.
    RunStarted {
        run_id: RunId,
        workflow: String,
    },
    /// An attempt of a task has started (attempt is 1-based).
    TaskStarted {
        task: TaskId,
        attempt: u32,
    },
    /// An attempt failed and the task will be retried.
    TaskRetrying {
        task: TaskId,
        attempt: u32,
        error: String,
    },
    /// A task completed successfully.
    TaskCompleted {
        task: TaskId,
        attempts: u32,
    },
    /// A task failed after exhausting its retry budget.
    TaskFailed {
        task: TaskId,
        error: String,
    },
    /// A task was blocked by an upstream failure and never ran.
    TaskBlocked {
        task: TaskId,
        reason: String,
    },
    /// All tasks succeeded.
    RunCompleted {
        run_id: RunId,
    },
    /// At least one task failed or was blocked.
    RunFailed {
        run_id: RunId,
    },
}

/// Final state of one task within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task: TaskId,
    pub status: TaskStatus,
    pub attempts: u32,
}

/// Structured record of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub workflow: String,
    /// The schedule boundary this run was fired for, if any.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: bool,
    /// Per-task outcomes in dependency order.
    pub tasks: Vec<TaskOutcome>,
}

/// Executes workflow runs and emits their events.
pub struct Runner {
    event_tx: mpsc::Sender<RunEvent>,
}

impl Runner {
    pub fn new(event_tx: mpsc::Sender<RunEvent>) -> Self {
        Self { event_tx }
    }

    /// Execute one run immediately.
    pub async fn execute(&self, workflow: &Workflow) -> Result<RunReport> {
        self.execute_scheduled(workflow, None).await
    }

    /// Execute one run for a specific schedule boundary.
    ///
    /// Tasks run sequentially in dependency order. A task whose upstream
    /// did not succeed is blocked without being attempted. Returns the run
    /// report whether or not the run succeeded; `Err` is reserved for a
    /// broken definition (e.g. a task with no handler).
    pub async fn execute_scheduled(
        &self,
        workflow: &Workflow,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<RunReport> {
        let run_id = RunId::new();
        let started_at = Utc::now();

        // Per-run task state; the definition stays pristine.
        let mut dag = workflow.dag().clone();
        let order = dag.topological_order()?;

        let _ = self
            .event_tx
            .send(RunEvent::RunStarted {
                run_id,
                workflow: workflow.name().to_string(),
            })
            .await;
        mlog!(
            "run {} started for {} ({} tasks)",
            run_id.short(),
            workflow.name(),
            order.len()
        );

        for task_id in &order {
            let failed_upstream: Option<TaskId> = dag
                .upstream_of(task_id)
                .into_iter()
                .find(|t| !t.succeeded())
                .map(|t| t.id.clone());

            if let Some(upstream) = failed_upstream {
                let reason = format!("upstream task {} did not succeed", upstream);
                if let Some(task) = dag.get_task_mut(task_id) {
                    task.block(&reason);
                }
                mlog_warn!("run {}: task {} blocked: {}", run_id.short(), task_id, reason);
                let _ = self
                    .event_tx
                    .send(RunEvent::TaskBlocked {
                        task: task_id.clone(),
                        reason,
                    })
                    .await;
                continue;
            }

            let handler = workflow
                .handler(task_id)
                .ok_or_else(|| Error::Validation(format!("no handler for task {}", task_id)))?;
            let retries = dag
                .get_task(task_id)
                .map(|t| t.effective_retries(workflow.default_retries()))
                .unwrap_or(workflow.default_retries());

            let mut attempt = 0u32;
            loop {
                attempt += 1;
                if let Some(task) = dag.get_task_mut(task_id) {
                    task.begin_attempt();
                }
                let _ = self
                    .event_tx
                    .send(RunEvent::TaskStarted {
                        task: task_id.clone(),
                        attempt,
                    })
                    .await;

                match handler.execute().await {
                    Ok(()) => {
                        if let Some(task) = dag.get_task_mut(task_id) {
                            task.complete();
                        }
                        mlog!(
                            "run {}: task {} completed after {} attempt(s)",
                            run_id.short(),
                            task_id,
                            attempt
                        );
                        let _ = self
                            .event_tx
                            .send(RunEvent::TaskCompleted {
                                task: task_id.clone(),
                                attempts: attempt,
                            })
                            .await;
                        break;
                    }
                    Err(e) if attempt <= retries => {
                        let error = e.to_string();
                        mlog_warn!(
                            "run {}: task {} attempt {} failed, retrying: {}",
                            run_id.short(),
                            task_id,
                            attempt,
                            error
                        );
                        let _ = self
                            .event_tx
                            .send(RunEvent::TaskRetrying {
                                task: task_id.clone(),
                                attempt,
                                error,
                            })
                            .await;
                    }
                    Err(e) => {
                        let error = Error::RetriesExhausted {
                            task: task_id.to_string(),
                            attempts: attempt,
                            error: e.to_string(),
                        }
                        .to_string();
                        if let Some(task) = dag.get_task_mut(task_id) {
                            task.fail(&error);
                        }
                        mlog_warn!("run {}: {}", run_id.short(), error);
                        let _ = self
                            .event_tx
                            .send(RunEvent::TaskFailed {
                                task: task_id.clone(),
                                error,
                            })
                            .await;
                        break;
                    }
                }
            }
        }

        let tasks: Vec<TaskOutcome> = order
            .iter()
            .filter_map(|id| dag.get_task(id))
            .map(|t| TaskOutcome {
                task: t.id.clone(),
                status: t.status.clone(),
                attempts: t.attempts,
            })
            .collect();
        let succeeded = tasks.iter().all(|t| matches!(t.status, TaskStatus::Completed));

        let event = if succeeded {
            RunEvent::RunCompleted { run_id }
        } else {
            RunEvent::RunFailed { run_id }
        };
        let _ = self.event_tx.send(event).await;
        mlog!(
            "run {} {}",
            run_id.short(),
            if succeeded { "completed" } else { "failed" }
        );

        Ok(RunReport {
            run_id,
            workflow: workflow.name().to_string(),
            scheduled_for,
            started_at,
            finished_at: Utc::now(),
            succeeded,
            tasks,
        })
    }
}
