//! # keel-runner
//!
//! Job execution for Keel:
//! - [`Orchestrator`]: runs one [`TargetAction`] over every target concurrently
//! - [`ContainerLifecycle`]: start, readiness polling, verification, teardown
//! - [`DockerCli`]: the `docker` backed [`ContainerRuntime`]
//! - [`actions`]: build, publish and test actions

pub mod actions;
pub mod container;
pub mod docker;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod runtime;

pub use actions::{BuildAction, BuildMode, TargetAction, TestAction};
pub use container::{ContainerHandle, ContainerLifecycle, LifecycleSettings, SessionReport, SessionState};
pub use docker::DockerCli;
pub use error::{Result, RunnerError};
pub use job::JobLog;
pub use orchestrator::{Job, JobOutcome, Orchestrator, RunSummary};
pub use runtime::{ContainerRuntime, ContainerSpec, ExecOutput};
