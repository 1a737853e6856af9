//! Per-target actions run by the orchestrator

mod build;

pub use build::{build_command, render_context, BuildAction, BuildMode};
pub use test::{run_assertion, select_assertions, TestAction};

use crate::error::Result;
use crate::job::JobLog;
use async_trait::async_trait;
use keel_core::types::BuildTarget;

/// Something done to one build target
#[async_trait]
pub trait TargetAction: Send + Sync {
    /// Short name, used for the log sub-directory (`build`, `test`, `publish`)
    fn name(&self) -> &'static str;

    /// Act on `target`, writing all output to `log`
    ///
    /// An `Err` fails this job only; sibling jobs keep running.
    async fn run(&self, target: &BuildTarget, log: &JobLog) -> Result<()>;
}
