//! Schedule loop: fire runs at schedule boundaries until cancelled.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::mlog;
use crate::runner::executor::{RunEvent, Runner};
use crate::runner::history::RunLog;
use crate::workflow::Workflow;

/// Drives a workflow on its schedule until the token is cancelled.
pub struct ScheduleLoop {
    runner: Runner,
    cancel: CancellationToken,
}

impl ScheduleLoop {
    pub fn new(event_tx: mpsc::Sender<RunEvent>, cancel: CancellationToken) -> Self {
        Self {
            runner: Runner::new(event_tx),
            cancel,
        }
    }

    /// Run the loop. Each fired run is appended to `log`.
    ///
    /// At startup, boundaries that elapsed before first evaluation follow
    /// the workflow's catchup setting: skipped when catchup is off, fired
    /// in order when it is on. Afterwards the loop sleeps until the next
    /// boundary, fires, and repeats.
    pub async fn run(&self, workflow: &Workflow, log: &mut RunLog) -> Result<()> {
        let schedule = *workflow.schedule();
        let mut last_fired: Option<DateTime<Utc>> = None;

        for due in schedule.due_runs(None, Utc::now()) {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            mlog!("catchup run for boundary {}", due);
            let report = self.runner.execute_scheduled(workflow, Some(due)).await?;
            log.append(report)?;
            last_fired = Some(due);
        }

        loop {
            let next = match last_fired {
                // With catchup on, never skip a boundary, even if a run
                // overran the interval.
                Some(t) if schedule.catchup => schedule.next_after(t),
                _ => schedule.next_after(Utc::now()),
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            mlog!(
                "next run for {} at {} (in {:?})",
                workflow.name(),
                next,
                wait
            );

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    mlog!("schedule loop for {} cancelled", workflow.name());
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {}
            }

            let report = self.runner.execute_scheduled(workflow, Some(next)).await?;
            log.append(report)?;
            last_fired = Some(next);
        }
    }
}
