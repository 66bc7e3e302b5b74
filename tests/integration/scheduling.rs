//! Schedule boundary and loop shutdown tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use mlpipe::runner::{RunLog, ScheduleLoop};

use crate::fixtures::{FlakyTraining, MemoryStore, TestWorkspace};

#[tokio::test]
async fn test_no_runs_for_boundaries_elapsed_before_startup() {
    // The default start date is fixed in the past; with catchup disabled,
    // none of the elapsed weekly boundaries are due at first evaluation.
    let ws = TestWorkspace::new();
    let workflow = ws.workflow(Arc::new(FlakyTraining::new(0)), Arc::new(MemoryStore::new()));

    let schedule = *workflow.schedule();
    assert!(!schedule.catchup);
    assert!(schedule.start < Utc::now());
    assert!(schedule.due_runs(None, Utc::now()).is_empty());
}

#[tokio::test]
async fn test_next_boundary_is_on_the_weekly_grid() {
    let ws = TestWorkspace::new();
    let workflow = ws.workflow(Arc::new(FlakyTraining::new(0)), Arc::new(MemoryStore::new()));

    let schedule = *workflow.schedule();
    let now = Utc::now();
    let next = schedule.next_after(now);

    assert!(next > now);
    assert!(next <= now + ChronoDuration::weeks(1));
    assert_eq!(
        (next - schedule.start).num_seconds() % ChronoDuration::weeks(1).num_seconds(),
        0
    );
}

#[tokio::test]
async fn test_catchup_enabled_backfills_elapsed_boundaries() {
    let mut ws = TestWorkspace::new();
    ws.config.catchup = true;
    let workflow = ws.workflow(Arc::new(FlakyTraining::new(0)), Arc::new(MemoryStore::new()));

    let schedule = *workflow.schedule();
    let now = schedule.start + ChronoDuration::weeks(3) + ChronoDuration::days(1);
    let due = schedule.due_runs(None, now);

    assert_eq!(due.len(), 4);
    assert_eq!(due[0], schedule.start);
    assert_eq!(due[3], schedule.start + ChronoDuration::weeks(3));
}

#[tokio::test]
async fn test_schedule_loop_stops_on_cancellation() {
    let ws = TestWorkspace::new();
    let workflow = ws.workflow(Arc::new(FlakyTraining::new(0)), Arc::new(MemoryStore::new()));
    let mut log = RunLog::open(ws.temp.path().join("history.json")).unwrap();

    let (tx, _rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    cancel.cancel();

    // With the token already cancelled and no catchup work, the loop must
    // return without waiting for the next weekly boundary.
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        ScheduleLoop::new(tx, cancel).run(&workflow, &mut log),
    )
    .await;

    assert!(result.is_ok(), "loop did not stop after cancellation");
    assert!(result.unwrap().is_ok());
    assert!(log.records().is_empty());
}
