//! Scripted target actions

use async_trait::async_trait;
use keel_core::types::BuildTarget;
use keel_runner::{JobLog, Result, RunnerError, TargetAction};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Writes a few lines, then fails for one version
pub struct ScriptedAction {
    pub fail_version: Option<String>,
    pub panic_version: Option<String>,
    pub runs: AtomicUsize,
}

impl ScriptedAction {
    pub fn failing_on(version: &str) -> Self {
        Self {
            fail_version: Some(version.to_string()),
            panic_version: None,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn panicking_on(version: &str) -> Self {
        Self {
            fail_version: None,
            panic_version: Some(version.to_string()),
            runs: AtomicUsize::new(0),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetAction for ScriptedAction {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn run(&self, target: &BuildTarget, log: &JobLog) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let version = target.version.to_string();

        log.line(&format!("step 1 for {}", version))?;
        // Let the failing job finish first so siblings are still mid-flight
        if Some(&version) != self.fail_version.as_ref() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        if Some(&version) == self.panic_version.as_ref() {
            panic!("scripted panic for {}", version);
        }
        if Some(&version) == self.fail_version.as_ref() {
            return Err(RunnerError::job_failure("scripted", "exit code 2"));
        }
        log.line(&format!("step 2 for {}", version))?;
        Ok(())
    }
}
