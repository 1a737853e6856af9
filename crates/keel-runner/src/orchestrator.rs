//! Parallel Orchestrator
//!
//! Fans an action out over every target at once. Log files are opened before
//! anything is dispatched, so an unwritable log directory aborts the run up
//! front. After that, each job's failure (or panic) is recorded against that
//! job only and never cancels its siblings.

use crate::actions::TargetAction;
use crate::error::{Result, RunnerError};
use crate::job::JobLog;
use camino::{Utf8Path, Utf8PathBuf};
use futures::future::join_all;
use futures::FutureExt;
use keel_core::types::BuildTarget;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// One target paired with its dedicated log
#[derive(Debug)]
pub struct Job {
    pub target: BuildTarget,
    pub log: JobLog,
}

impl Job {
    pub fn label(&self) -> String {
        self.target.label()
    }
}

/// Recorded result of one job
#[derive(Debug)]
pub struct JobOutcome {
    pub label: String,
    pub log_path: Utf8PathBuf,
    pub duration: Duration,
    pub result: Result<()>,
}

impl JobOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Results of every job in dispatch order
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<JobOutcome>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Runs one action over many targets concurrently
#[derive(Debug, Clone)]
pub struct Orchestrator {
    log_dir: Utf8PathBuf,
    verbose: bool,
}

impl Orchestrator {
    pub fn new(log_dir: impl Into<Utf8PathBuf>, verbose: bool) -> Self {
        Self {
            log_dir: log_dir.into(),
            verbose,
        }
    }

    pub fn log_dir(&self) -> &Utf8Path {
        &self.log_dir
    }

    /// Open `<log_dir>/<action>/<label>.log` for every target
    ///
    /// Any failure here is fatal: no job has started yet.
    pub fn prepare(&self, action: &str, targets: Vec<BuildTarget>) -> Result<Vec<Job>> {
        let dir = self.log_dir.join(action);
        targets
            .into_iter()
            .map(|target| {
                let log = JobLog::create(&dir, &target.label(), self.verbose)?;
                Ok(Job { target, log })
            })
            .collect()
    }

    /// Run `action` for every job and wait for all of them
    pub async fn run(&self, action: Arc<dyn TargetAction>, jobs: Vec<Job>) -> RunSummary {
        info!("Running {} for {} targets", action.name(), jobs.len());

        let futures: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let action = action.clone();
                async move { run_job(action.as_ref(), job).await }
            })
            .collect();

        let summary = RunSummary {
            outcomes: join_all(futures).await,
        };

        info!(
            "{}: {} of {} targets succeeded",
            action.name(),
            summary.succeeded(),
            summary.total()
        );
        summary
    }

    /// [`prepare`](Self::prepare) then [`run`](Self::run)
    pub async fn run_targets(
        &self,
        action: Arc<dyn TargetAction>,
        targets: Vec<BuildTarget>,
    ) -> Result<RunSummary> {
        let jobs = self.prepare(action.name(), targets)?;
        Ok(self.run(action, jobs).await)
    }
}

async fn run_job(action: &dyn TargetAction, job: Job) -> JobOutcome {
    let label = job.label();
    let started = Instant::now();

    let result = match AssertUnwindSafe(action.run(&job.target, &job.log))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(_) => Err(RunnerError::job_failure(action.name(), "job panicked")),
    };
    let duration = started.elapsed();

    match &result {
        Ok(()) => {
            let _ = job.log.line(&format!("# {} succeeded in {:.1}s", label, duration.as_secs_f64()));
            info!("{}: {} succeeded", label, action.name());
        }
        Err(e) => {
            let _ = job.log.line(&format!("# {} failed: {}", label, e));
            error!("{}: {} failed: {}", label, action.name(), e);
        }
    }

    JobOutcome {
        label,
        log_path: job.log.path().to_path_buf(),
        duration,
        result,
    }
}
