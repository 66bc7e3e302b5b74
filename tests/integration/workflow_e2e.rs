//! End-to-end run execution tests for the training workflow.

use std::sync::Arc;

use tokio::sync::mpsc;

use mlpipe::core::task::{TaskId, TaskStatus};
use mlpipe::pipeline::{SYNC_TASK_ID, TRAIN_TASK_ID};
use mlpipe::runner::{RunEvent, RunReport, Runner};
use mlpipe::workflow::Workflow;

use crate::fixtures::{FailingStore, FlakyTraining, MemoryStore, TestWorkspace};

/// Execute a run and drain its events.
async fn execute(workflow: &Workflow) -> (RunReport, Vec<RunEvent>) {
    let (tx, mut rx) = mpsc::channel(256);
    let runner = Runner::new(tx);
    let report = runner.execute(workflow).await.expect("runner executes");

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    (report, events)
}

fn started_order(events: &[RunEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::TaskStarted { task, attempt } if *attempt == 1 => Some(task.to_string()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_exactly_two_tasks_registered() {
    let ws = TestWorkspace::new();
    let workflow = ws.workflow(Arc::new(FlakyTraining::new(0)), Arc::new(MemoryStore::new()));

    let ids: Vec<String> = workflow
        .task_ids()
        .unwrap()
        .iter()
        .map(|t| t.as_str().to_string())
        .collect();

    assert_eq!(ids, vec![TRAIN_TASK_ID, SYNC_TASK_ID]);
    assert_eq!(workflow.task_count(), 2);
}

#[tokio::test]
async fn test_train_starts_strictly_before_sync() {
    let ws = TestWorkspace::new();
    let workflow = ws.workflow(ws.artifact_training(), Arc::new(MemoryStore::new()));

    let (report, events) = execute(&workflow).await;

    assert!(report.succeeded);
    assert_eq!(
        started_order(&events),
        vec![TRAIN_TASK_ID.to_string(), SYNC_TASK_ID.to_string()]
    );
}

#[tokio::test]
async fn test_training_succeeds_after_two_retries() {
    // Fails on the first two invocations, succeeds on the third; the
    // default retry budget of 2 absorbs both failures.
    let ws = TestWorkspace::new();
    let training = Arc::new(FlakyTraining::new(2));
    let store = Arc::new(MemoryStore::new());
    let workflow = ws.workflow(training.clone(), store);

    // The flaky fake writes nothing, so pre-create the directories the
    // sync task expects.
    std::fs::create_dir_all(ws.config.artifacts_dir()).unwrap();
    std::fs::create_dir_all(ws.config.model_dir()).unwrap();

    let (report, events) = execute(&workflow).await;

    assert!(report.succeeded);
    assert_eq!(training.calls(), 3);

    let train = TaskId::new(TRAIN_TASK_ID).unwrap();
    let outcome = report.tasks.iter().find(|t| t.task == train).unwrap();
    assert_eq!(outcome.attempts, 3);
    assert!(matches!(outcome.status, TaskStatus::Completed));

    let retries = events
        .iter()
        .filter(|e| matches!(e, RunEvent::TaskRetrying { task, .. } if *task == train))
        .count();
    assert_eq!(retries, 2);
}

#[tokio::test]
async fn test_exhausted_retries_fail_run_and_block_sync() {
    let ws = TestWorkspace::new();
    let training = Arc::new(FlakyTraining::always_failing());
    let store = Arc::new(MemoryStore::new());
    let workflow = ws.workflow(training.clone(), store.clone());

    let (report, events) = execute(&workflow).await;

    assert!(!report.succeeded);
    // 1 initial attempt + 2 retries.
    assert_eq!(training.calls(), 3);

    let train = TaskId::new(TRAIN_TASK_ID).unwrap();
    let sync = TaskId::new(SYNC_TASK_ID).unwrap();
    let train_outcome = report.tasks.iter().find(|t| t.task == train).unwrap();
    let sync_outcome = report.tasks.iter().find(|t| t.task == sync).unwrap();

    assert!(matches!(train_outcome.status, TaskStatus::Failed { .. }));
    assert!(matches!(sync_outcome.status, TaskStatus::Blocked { .. }));
    assert_eq!(sync_outcome.attempts, 0);

    // The sync task never touched the store.
    assert_eq!(store.object_count(), 0);
    assert!(events
        .iter()
        .any(|e| matches!(e, RunEvent::TaskBlocked { task, .. } if *task == sync)));
    assert!(matches!(events.last(), Some(RunEvent::RunFailed { .. })));
}

#[tokio::test]
async fn test_sync_failure_fails_the_run() {
    // Upload errors propagate: a failed sync fails the task and the run
    // instead of being silently treated as success.
    let ws = TestWorkspace::new();
    let workflow = ws.workflow(ws.artifact_training(), Arc::new(FailingStore));

    let (report, _) = execute(&workflow).await;

    assert!(!report.succeeded);

    let sync = TaskId::new(SYNC_TASK_ID).unwrap();
    let outcome = report.tasks.iter().find(|t| t.task == sync).unwrap();
    assert!(matches!(outcome.status, TaskStatus::Failed { .. }));
    // The retry budget applies to the sync task too.
    assert_eq!(outcome.attempts, 3);
}

#[tokio::test]
async fn test_artifacts_uploaded_under_both_prefixes() {
    let ws = TestWorkspace::new();
    let store = Arc::new(MemoryStore::new());
    let workflow = ws.workflow(ws.artifact_training(), store.clone());

    let (report, _) = execute(&workflow).await;

    assert!(report.succeeded);
    assert_eq!(
        store.keys("test-bucket"),
        vec![
            "artifact/metrics/scores.csv".to_string(),
            "artifact/report.json".to_string(),
            "final_model/model.pkl".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_second_run_reconciles_without_duplicates() {
    let ws = TestWorkspace::new();
    let store = Arc::new(MemoryStore::new());
    let workflow = ws.workflow(ws.artifact_training(), store.clone());

    let (first, _) = execute(&workflow).await;
    let (second, _) = execute(&workflow).await;

    assert!(first.succeeded);
    assert!(second.succeeded);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(store.object_count(), 3);
}
