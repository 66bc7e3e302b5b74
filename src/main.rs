use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use mlpipe::config::Config;
use mlpipe::pipeline::{training_workflow, ObjectStore, ProcessTraining, S3Store};
use mlpipe::runner::{RunEvent, RunLog, Runner, ScheduleLoop};
use mlpipe::workflow::Workflow;
use mlpipe::{mlog, Error, Result};

/// mlpipe - scheduled training pipeline runner with S3 artifact sync
#[derive(Parser, Debug)]
#[command(name = "mlpipe")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    MLPIPE_DEBUG=1    Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.mlpipe/mlpipe.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Execute one workflow run immediately
    Run,

    /// Run the schedule loop until interrupted
    Schedule,

    /// Print the workflow's tasks, ordering, and schedule
    Describe,

    /// Show recent run reports
    History {
        /// Number of runs to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    mlpipe::log::init_with_debug(cli.debug);
    let config = Config::load()?;

    match cli.command {
        Command::Run => run_once(&config).await,
        Command::Schedule => run_schedule(&config).await,
        Command::Describe => describe(&config).await,
        Command::History { limit } => show_history(limit),
    }
}

/// Wire the configured training command and the S3 client into the
/// canonical workflow.
async fn build_workflow(config: &Config) -> Result<Workflow> {
    let command = config.training_command.as_deref().ok_or_else(|| {
        Error::Validation(
            "training_command is not configured (set it in mlpipe.toml or MLPIPE_TRAINING_COMMAND)"
                .to_string(),
        )
    })?;
    let training = Arc::new(ProcessTraining::new(command).with_workdir(config.app_root.clone()));
    let store: Arc<dyn ObjectStore> = Arc::new(S3Store::from_env().await);
    training_workflow(config, training, store)
}

/// Print run events as they arrive.
fn spawn_event_printer(mut rx: mpsc::Receiver<RunEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::RunStarted { run_id, workflow } => {
                    println!("run {} started for {}", run_id.short(), workflow);
                }
                RunEvent::TaskStarted { task, attempt } => {
                    println!("  task {} attempt {}", task, attempt);
                }
                RunEvent::TaskRetrying {
                    task,
                    attempt,
                    error,
                } => {
                    println!("  task {} attempt {} failed, retrying: {}", task, attempt, error);
                }
                RunEvent::TaskCompleted { task, attempts } => {
                    println!("  task {} completed after {} attempt(s)", task, attempts);
                }
                RunEvent::TaskFailed { task, error } => {
                    println!("  task {} failed: {}", task, error);
                }
                RunEvent::TaskBlocked { task, reason } => {
                    println!("  task {} blocked: {}", task, reason);
                }
                RunEvent::RunCompleted { run_id } => {
                    println!("run {} completed", run_id.short());
                }
                RunEvent::RunFailed { run_id } => {
                    println!("run {} failed", run_id.short());
                }
            }
        }
    })
}

async fn run_once(config: &Config) -> Result<()> {
    let workflow = build_workflow(config).await?;
    let (tx, rx) = mpsc::channel(100);
    let printer = spawn_event_printer(rx);

    let runner = Runner::new(tx);
    let report = runner.execute(&workflow).await?;
    drop(runner); // close the channel so the printer drains and exits
    let _ = printer.await;

    let mut log = RunLog::open(Config::history_path()?)?;
    log.append(report.clone())?;

    if report.succeeded {
        Ok(())
    } else {
        Err(Error::RunFailed(format!(
            "run {} did not complete successfully",
            report.run_id
        )))
    }
}

async fn run_schedule(config: &Config) -> Result<()> {
    let workflow = build_workflow(config).await?;
    let (tx, rx) = mpsc::channel(100);
    let printer = spawn_event_printer(rx);
    let mut log = RunLog::open(Config::history_path()?)?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        mlog!("interrupt received, shutting down");
        signal_cancel.cancel();
    });

    println!(
        "scheduling {} ({}); press ctrl-c to stop",
        workflow.name(),
        workflow.schedule()
    );
    let result = ScheduleLoop::new(tx, cancel).run(&workflow, &mut log).await;
    let _ = printer.await;
    result
}

async fn describe(config: &Config) -> Result<()> {
    let workflow = build_workflow(config).await?;

    println!("workflow: {}", workflow.name());
    println!("  {}", workflow.description());
    println!("  tags: {}", workflow.tags().join(", "));
    println!("  schedule: {}", workflow.schedule());
    println!("  default retries: {}", workflow.default_retries());
    println!("tasks:");
    for id in workflow.task_ids()? {
        if let Some(task) = workflow.dag().get_task(&id) {
            println!("  {} - {}", task.id, task.description);
        }
    }
    println!("ordering:");
    for (from, to) in workflow.dag().edges() {
        println!("  {} -> {}", from, to);
    }
    Ok(())
}

fn show_history(limit: usize) -> Result<()> {
    let log = RunLog::open(Config::history_path()?)?;
    if log.records().is_empty() {
        println!("no runs recorded");
        return Ok(());
    }

    for report in log.recent(limit) {
        let attempts: u32 = report.tasks.iter().map(|t| t.attempts).sum();
        println!(
            "{}  {}  {}  {} task(s), {} attempt(s)",
            report.run_id.short(),
            report.started_at.format("%Y-%m-%d %H:%M:%S"),
            if report.succeeded { "ok" } else { "failed" },
            report.tasks.len(),
            attempts
        );
    }
    Ok(())
}
