//! The training/sync pipeline: task handlers and the canonical workflow.

pub mod store;
pub mod sync;
pub mod training;

pub use store::{ObjectStore, RemoteObject, S3Store};
pub use sync::{sync_dir, SyncReport, SyncTarget, SyncTask};
pub use training::{ProcessTraining, TrainTask, TrainingPipeline};

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::workflow::Workflow;

/// Id of the training task.
pub const TRAIN_TASK_ID: &str = "train_pipeline";
/// Id of the artifact sync task.
pub const SYNC_TASK_ID: &str = "sync_data_to_s3";

/// Build the training workflow: run the training pipeline, then sync its
/// artifacts and the final model into the configured bucket.
///
/// The sync task never starts before the training task has completed
/// successfully.
pub fn training_workflow(
    config: &Config,
    training: Arc<dyn TrainingPipeline>,
    store: Arc<dyn ObjectStore>,
) -> Result<Workflow> {
    Workflow::builder("network_training_pipeline")
        .description("Network security pipeline for training and syncing to S3")
        .tag("mlops")
        .schedule(config.schedule()?)
        .default_retries(config.retries)
        .task(
            TRAIN_TASK_ID,
            "Run the training pipeline end to end",
            Arc::new(TrainTask::new(training)),
        )
        .task(
            SYNC_TASK_ID,
            "Sync training artifacts and the final model to S3",
            Arc::new(SyncTask::new(store, config.sync_targets())),
        )
        .dependency(TRAIN_TASK_ID, SYNC_TASK_ID)
        .build()
}
