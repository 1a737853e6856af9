//! Container runtime abstraction
//!
//! The lifecycle manager and actions talk to containers only through
//! [`ContainerRuntime`], so tests can substitute an in-process fake.

use crate::error::Result;
use crate::job::JobLog;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;

/// Parameters of a detached container run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Image reference (`repo:tag`)
    pub image: String,

    /// Container name, unique per session
    pub name: String,

    /// Port the service listens on inside the container
    pub port: u16,

    /// Path mounted as tmpfs so no data outlives the session
    pub ephemeral_mount: Option<String>,

    /// Extra runtime arguments placed before the image
    pub args: Vec<String>,
}

impl ContainerSpec {
    pub fn new(image: impl Into<String>, name: impl Into<String>, port: u16) -> Self {
        Self {
            image: image.into(),
            name: name.into(),
            port,
            ephemeral_mount: None,
            args: Vec::new(),
        }
    }

    pub fn with_ephemeral_mount(mut self, path: impl Into<String>) -> Self {
        self.ephemeral_mount = Some(path.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

/// Output of a command run inside a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Operations Keel needs from a container engine
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Start a detached container and return its identifier
    async fn run_detached(&self, spec: &ContainerSpec) -> Result<String>;

    /// Host address published for `port`, once the runtime has assigned one
    async fn published_addr(&self, id: &str, port: u16) -> Result<Option<SocketAddr>>;

    /// Whether the container process is still running
    async fn is_running(&self, id: &str) -> Result<bool>;

    /// Combined stdout/stderr of the container so far
    async fn logs(&self, id: &str) -> Result<String>;

    /// Run a command inside the container
    async fn exec(&self, id: &str, command: &[String]) -> Result<ExecOutput>;

    /// Stop the container, killing it after `grace`
    async fn stop(&self, id: &str, grace: Duration) -> Result<()>;

    /// Force-remove the container and its anonymous volumes
    async fn remove(&self, id: &str) -> Result<()>;

    /// Run an image build with `args`, streaming output to `log`
    async fn build(&self, args: &[String], log: &JobLog) -> Result<()>;
}
