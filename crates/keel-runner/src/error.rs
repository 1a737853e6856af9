//! Error types for job execution

use thiserror::Error;

/// Result type alias for keel-runner
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Errors raised while running jobs and container sessions
///
/// `LogFile` and `RuntimeUnavailable` are infrastructure failures that stop a
/// run before any job is dispatched. Everything else is recorded against the
/// job that raised it.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Container runtime binary not found
    #[error("Container runtime '{0}' not found in PATH")]
    RuntimeUnavailable(String),

    /// Job log could not be created or written
    #[error("Cannot write job log {path}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Runtime refused to start the container
    #[error("Failed to start container from {image}: {reason}")]
    ContainerStart { image: String, reason: String },

    /// Port never became reachable, or the container exited first
    #[error("Container {container} not ready after {waited_secs}s: {reason}")]
    ReadinessTimeout {
        container: String,
        waited_secs: u64,
        reason: String,
        /// Container output captured for diagnosis
        logs: String,
    },

    /// A named assertion failed
    #[error("Assertion '{assertion}' failed: {reason}")]
    Verification { assertion: String, reason: String },

    /// Container could not be stopped or removed
    #[error("Failed to tear down container {container}: {reason}")]
    Teardown { container: String, reason: String },

    /// Build/test subprocess failed
    #[error("{step} failed: {reason}")]
    JobFailure { step: String, reason: String },

    /// Runtime command failed outside a build step
    #[error("{command} failed: {reason}")]
    Runtime { command: String, reason: String },

    /// Test filter names no configured assertion
    #[error("No assertions match {filter}")]
    NoAssertions { filter: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    pub fn log_file(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::LogFile {
            path: path.into(),
            source,
        }
    }

    pub fn container_start(image: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ContainerStart {
            image: image.into(),
            reason: reason.into(),
        }
    }

    pub fn verification(assertion: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Verification {
            assertion: assertion.into(),
            reason: reason.into(),
        }
    }

    pub fn teardown(container: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Teardown {
            container: container.into(),
            reason: reason.into(),
        }
    }

    pub fn job_failure(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::JobFailure {
            step: step.into(),
            reason: reason.into(),
        }
    }

    pub fn runtime(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Runtime {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Name of the failing assertion, if this is a verification failure
    pub fn failed_assertion(&self) -> Option<&str> {
        match self {
            RunnerError::Verification { assertion, .. } => Some(assertion),
            _ => None,
        }
    }
}
