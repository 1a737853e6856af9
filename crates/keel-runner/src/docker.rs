//! Docker CLI runtime
//!
//! Shells out to the `docker` binary. Host ports are ephemeral: the container
//! port is published on `127.0.0.1` with no fixed host port and looked up with
//! `docker port`, so parallel test sessions never collide. The userland proxy
//! accepts on that port before the service inside is up, which is why the
//! lifecycle manager probes the connection rather than trusting `connect`.

use crate::error::{Result, RunnerError};
use crate::job::JobLog;
use crate::runtime::{ContainerRuntime, ContainerSpec, ExecOutput};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runtime backed by the `docker` CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    /// Locate `docker` on PATH
    pub fn detect() -> Result<Self> {
        let path = which::which("docker")
            .map_err(|_| RunnerError::RuntimeUnavailable("docker".to_string()))?;
        debug!("Using docker at {}", path.display());
        Ok(Self {
            binary: path.to_string_lossy().into_owned(),
        })
    }

    /// Use an explicit binary (e.g. a docker-compatible CLI)
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn output(&self, args: &[String]) -> Result<Output> {
        debug!("Running: {} {}", self.binary, args.join(" "));
        Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| RunnerError::runtime(self.describe(args), e.to_string()))
    }

    /// Run and require success; returns trimmed stdout
    async fn checked(&self, args: &[String]) -> Result<String> {
        let output = self.output(args).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(RunnerError::runtime(
                self.describe(args),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    fn describe(&self, args: &[String]) -> String {
        match args.first() {
            Some(sub) => format!("docker {}", sub),
            None => "docker".to_string(),
        }
    }
}

/// Arguments of `docker run` for a detached session
pub fn run_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--detach".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--publish".to_string(),
        format!("127.0.0.1::{}", spec.port),
    ];
    if let Some(mount) = &spec.ephemeral_mount {
        args.push("--tmpfs".to_string());
        args.push(mount.clone());
    }
    args.extend(spec.args.iter().cloned());
    args.push(spec.image.clone());
    args
}

/// First address in `docker port` output that parses
fn parse_port_output(stdout: &str) -> Option<SocketAddr> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<SocketAddr>().ok())
        .next()
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn run_detached(&self, spec: &ContainerSpec) -> Result<String> {
        let output = self.output(&run_args(spec)).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RunnerError::container_start(&spec.image, stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn published_addr(&self, id: &str, port: u16) -> Result<Option<SocketAddr>> {
        let args = vec!["port".to_string(), id.to_string(), format!("{}/tcp", port)];
        let output = self.output(&args).await?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(parse_port_output(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn is_running(&self, id: &str) -> Result<bool> {
        let args = vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{.State.Running}}".to_string(),
            id.to_string(),
        ];
        let output = self.output(&args).await?;
        Ok(output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    async fn logs(&self, id: &str) -> Result<String> {
        let args = vec!["logs".to_string(), id.to_string()];
        let output = self.output(&args).await?;
        if !output.status.success() {
            return Err(RunnerError::runtime(
                "docker logs",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let mut logs = String::from_utf8_lossy(&output.stdout).into_owned();
        logs.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(logs)
    }

    async fn exec(&self, id: &str, command: &[String]) -> Result<ExecOutput> {
        let mut args = vec!["exec".to_string(), id.to_string()];
        args.extend(command.iter().cloned());
        let output = self.output(&args).await?;
        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn stop(&self, id: &str, grace: Duration) -> Result<()> {
        let args = vec![
            "stop".to_string(),
            "--time".to_string(),
            grace.as_secs().to_string(),
            id.to_string(),
        ];
        self.checked(&args).await.map(|_| ())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let args = vec![
            "rm".to_string(),
            "--force".to_string(),
            "--volumes".to_string(),
            id.to_string(),
        ];
        if let Err(e) = self.checked(&args).await {
            warn!("Failed to remove container {}: {}", id, e);
            return Err(e);
        }
        Ok(())
    }

    async fn build(&self, args: &[String], log: &JobLog) -> Result<()> {
        log.run("build", &self.binary, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_publish_ephemeral_port() {
        let spec = ContainerSpec::new("acme/db:5.0.2", "keel-test-abc", 5000)
            .with_ephemeral_mount("/var/lib/db")
            .with_args(vec!["--env".to_string(), "DB_MODE=test".to_string()]);

        assert_eq!(
            run_args(&spec),
            [
                "run",
                "--detach",
                "--name",
                "keel-test-abc",
                "--publish",
                "127.0.0.1::5000",
                "--tmpfs",
                "/var/lib/db",
                "--env",
                "DB_MODE=test",
                "acme/db:5.0.2",
            ]
        );
    }

    #[test]
    fn test_parse_port_output() {
        assert_eq!(
            parse_port_output("127.0.0.1:49153\n"),
            Some("127.0.0.1:49153".parse().unwrap())
        );
        assert_eq!(
            parse_port_output("[::1]:49154\n0.0.0.0:49154\n"),
            Some("[::1]:49154".parse().unwrap())
        );
        assert_eq!(parse_port_output(""), None);
    }
}
