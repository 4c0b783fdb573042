//! Stage-by-stage execution of a [`Plan`].
//!
//! Tasks of one stage run on the rayon pool and join before the next stage
//! starts. A failing fatal task (`clean`, `sftp`, `sync`) stops the run
//! after its stage; any other failure is logged, recorded and the run goes
//! on.
//!
//! Progress is reported as [`RunEvent`]s over an optional channel so the
//! CLI can print while the build runs.

use crate::bundler::Bundler;
use crate::config::BuildConfig;
use crate::graph::{GraphError, Plan, Target, Task, TaskGraph};
use crate::reload::{NoReload, Reloader};
use crate::tasks::deploy::{SftpClient, Transport};
use crate::tasks::{self, TaskError, TaskSummary};
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Task '{task}' failed: {message}")]
    Fatal { task: Task, message: String },
}

/// Everything a task may touch.
///
/// Cheap to clone: the bundler cache, reloader and transport are shared.
#[derive(Clone)]
pub struct BuildContext {
    pub config: BuildConfig,
    pub bundler: Bundler,
    pub reloader: Arc<dyn Reloader>,
    pub transport: Arc<dyn Transport>,
}

impl BuildContext {
    /// Context with no live reload and the configured sftp client.
    pub fn new(config: BuildConfig) -> Self {
        let bundler = Bundler::new(config.path(&config.project.scripts.node_modules));
        let transport = Arc::new(SftpClient::new(config.project.remote.client.clone()));
        Self {
            config,
            bundler,
            reloader: Arc::new(NoReload),
            transport,
        }
    }

    pub fn with_reloader(mut self, reloader: Arc<dyn Reloader>) -> Self {
        self.reloader = reloader;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }
}

/// Result of one task.
#[derive(Debug)]
pub struct TaskOutcome {
    pub task: Task,
    pub result: Result<TaskSummary, TaskError>,
    pub elapsed: Duration,
}

impl TaskOutcome {
    pub fn failed(&self) -> bool {
        self.result.is_err()
    }
}

#[derive(Debug, Default)]
pub struct StageReport {
    pub outcomes: Vec<TaskOutcome>,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub stages: Vec<StageReport>,
    /// Set when a fatal task failed; later stages did not run.
    pub aborted: Option<Task>,
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn outcomes(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.stages.iter().flat_map(|s| &s.outcomes)
    }

    pub fn outcome(&self, task: Task) -> Option<&TaskOutcome> {
        self.outcomes().find(|o| o.task == task)
    }

    /// Error for the first failed fatal task, if any.
    pub fn into_result(self) -> Result<BuildReport, RunError> {
        let fatal = self
            .outcomes()
            .find(|o| o.task.is_fatal() && o.failed())
            .map(|o| (o.task, o.result.as_ref().err().map(|e| e.to_string())));
        match fatal {
            Some((task, message)) => Err(RunError::Fatal {
                task,
                message: message.unwrap_or_default(),
            }),
            None => Ok(self),
        }
    }
}

#[derive(Debug)]
pub enum RunEvent {
    StageStarted { index: usize, tasks: Vec<Task> },
    TaskFinished {
        task: Task,
        elapsed: Duration,
        ok: bool,
    },
}

/// Run one task, timing and logging it.
pub fn run_task(ctx: &BuildContext, task: Task) -> TaskOutcome {
    tracing::info!(task = %task, "Starting");
    let start = Instant::now();
    let result = tasks::run(task, ctx);
    let elapsed = start.elapsed();
    match &result {
        Ok(summary) => tracing::info!(
            task = %task,
            elapsed_ms = elapsed.as_millis() as u64,
            errors = summary.errors().count(),
            "Finished"
        ),
        Err(e) => tracing::error!(task = %task, elapsed_ms = elapsed.as_millis() as u64, "Failed: {e}"),
    }
    TaskOutcome {
        task,
        result,
        elapsed,
    }
}

/// Run every stage of `plan`.
pub fn run_plan(ctx: &BuildContext, plan: &Plan, events: Option<&Sender<RunEvent>>) -> BuildReport {
    let start = Instant::now();
    let mut report = BuildReport::default();

    for (index, stage) in plan.stages.iter().enumerate() {
        if let Some(tx) = events {
            let _ = tx.send(RunEvent::StageStarted {
                index,
                tasks: stage.clone(),
            });
        }
        let outcomes: Vec<TaskOutcome> = stage
            .par_iter()
            .map(|&task| {
                let outcome = run_task(ctx, task);
                if let Some(tx) = events {
                    let _ = tx.send(RunEvent::TaskFinished {
                        task,
                        elapsed: outcome.elapsed,
                        ok: !outcome.failed(),
                    });
                }
                outcome
            })
            .collect();

        let fatal = outcomes
            .iter()
            .find(|o| o.task.is_fatal() && o.failed())
            .map(|o| o.task);
        report.stages.push(StageReport { outcomes });
        if let Some(task) = fatal {
            tracing::error!(task = %task, "Fatal task failed, stopping");
            report.aborted = Some(task);
            break;
        }
    }

    report.elapsed = start.elapsed();
    report
}

/// Plan and run `target`. Serving is the caller's job.
pub fn run_target(
    ctx: &BuildContext,
    graph: &TaskGraph,
    target: Target,
    events: Option<&Sender<RunEvent>>,
) -> Result<BuildReport, RunError> {
    let plan = graph.plan(&target.roots())?;
    run_plan(ctx, &plan, events).into_result()
}
