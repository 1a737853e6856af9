//! Container Lifecycle Manager
//!
//! One session per test job:
//!
//! ```text
//! Starting → AwaitingPort → Ready → Running ─┐
//!                        └→ TimedOut ────────┴→ TearingDown → Closed
//! ```
//!
//! Teardown (stop, then force-remove) runs on every path once a container
//! exists, including when the verification block fails or panics.

use crate::error::{Result, RunnerError};
use crate::job::JobLog;
use crate::runtime::{ContainerRuntime, ContainerSpec};
use futures::FutureExt;
use keel_core::types::TestConfig;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// How long a fresh connection must stay open before the port counts as served
const SETTLE_WINDOW: Duration = Duration::from_millis(200);

/// Session states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    AwaitingPort,
    Ready,
    Running,
    TimedOut,
    TearingDown,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Starting => "starting",
            SessionState::AwaitingPort => "awaiting-port",
            SessionState::Ready => "ready",
            SessionState::Running => "running",
            SessionState::TimedOut => "timed-out",
            SessionState::TearingDown => "tearing-down",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Readiness and teardown timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSettings {
    pub readiness_timeout: Duration,
    pub poll_interval: Duration,
    pub stop_grace: Duration,
}

impl From<&TestConfig> for LifecycleSettings {
    fn from(config: &TestConfig) -> Self {
        Self {
            readiness_timeout: Duration::from_secs(config.readiness_timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            stop_grace: Duration::from_secs(config.stop_grace_secs),
        }
    }
}

/// What the verification block gets to work with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub addr: SocketAddr,
}

/// Result of one session
#[derive(Debug)]
pub struct SessionReport {
    pub container_id: Option<String>,
    /// Every state entered, in order
    pub states: Vec<SessionState>,
    /// Job outcome: start, readiness or verification failure
    pub outcome: Result<()>,
    /// Teardown problem; reported, never turns a passing job into a failure
    pub teardown: Option<RunnerError>,
}

impl SessionReport {
    pub fn final_state(&self) -> Option<SessionState> {
        self.states.last().copied()
    }

    pub fn into_result(self) -> Result<()> {
        self.outcome
    }
}

enum Readiness {
    Ready(SocketAddr),
    TimedOut { exited: bool },
}

/// Runs container sessions against a runtime
#[derive(Clone)]
pub struct ContainerLifecycle {
    runtime: Arc<dyn ContainerRuntime>,
    settings: LifecycleSettings,
}

impl ContainerLifecycle {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, settings: LifecycleSettings) -> Self {
        Self { runtime, settings }
    }

    pub fn settings(&self) -> LifecycleSettings {
        self.settings
    }

    /// Start `spec`, wait for its port, run `verify`, then tear down
    pub async fn run_session<F, Fut>(
        &self,
        spec: &ContainerSpec,
        log: &JobLog,
        verify: F,
    ) -> SessionReport
    where
        F: FnOnce(ContainerHandle) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut states = Vec::new();

        enter(log, &mut states, SessionState::Starting);
        let id = match self.runtime.run_detached(spec).await {
            Ok(id) => id,
            Err(e) => {
                // A failed `run` can still leave a created container behind
                if let Err(cleanup) = self.runtime.remove(&spec.name).await {
                    debug!("No container {} to clean up: {}", spec.name, cleanup);
                }
                enter(log, &mut states, SessionState::Closed);
                return SessionReport {
                    container_id: None,
                    states,
                    outcome: Err(e),
                    teardown: None,
                };
            }
        };
        info!("{}: started container {} from {}", log.label(), short_id(&id), spec.image);

        enter(log, &mut states, SessionState::AwaitingPort);
        let outcome = match self.await_port(&id, spec.port).await {
            Readiness::Ready(addr) => {
                enter(log, &mut states, SessionState::Ready);
                enter(log, &mut states, SessionState::Running);
                let handle = ContainerHandle {
                    id: id.clone(),
                    addr,
                };
                match AssertUnwindSafe(async move { verify(handle).await })
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(panic) => Err(RunnerError::verification(
                        "verification",
                        format!("panicked: {}", panic_message(panic.as_ref())),
                    )),
                }
            }
            Readiness::TimedOut { exited } => {
                enter(log, &mut states, SessionState::TimedOut);
                Err(self.timeout_error(&id, exited, log).await)
            }
        };

        enter(log, &mut states, SessionState::TearingDown);
        let teardown = self.teardown(&id).await.err();
        if let Some(e) = &teardown {
            warn!("{}: {}", log.label(), e);
            let _ = log.line(&format!("# warning: {}", e));
        }
        enter(log, &mut states, SessionState::Closed);

        SessionReport {
            container_id: Some(id),
            states,
            outcome,
            teardown,
        }
    }

    /// Poll until the published port accepts a connection, the container
    /// exits, or the readiness timeout elapses
    async fn await_port(&self, id: &str, port: u16) -> Readiness {
        let deadline = Instant::now() + self.settings.readiness_timeout;
        let interval = self.settings.poll_interval;

        loop {
            match self.runtime.published_addr(id, port).await {
                Ok(Some(addr)) => {
                    if probe(addr, interval).await {
                        debug!("Container {} accepting connections on {}", short_id(id), addr);
                        return Readiness::Ready(addr);
                    }
                }
                Ok(None) => {}
                Err(e) => debug!("Port lookup for {} failed: {}", short_id(id), e),
            }

            match self.runtime.is_running(id).await {
                Ok(false) => {
                    warn!("Container {} exited before becoming ready", short_id(id));
                    return Readiness::TimedOut { exited: true };
                }
                Ok(true) => {}
                Err(e) => debug!("State lookup for {} failed: {}", short_id(id), e),
            }

            if Instant::now() >= deadline {
                return Readiness::TimedOut { exited: false };
            }
            sleep(interval).await;
        }
    }

    async fn timeout_error(&self, id: &str, exited: bool, log: &JobLog) -> RunnerError {
        let logs = match self.runtime.logs(id).await {
            Ok(logs) => logs,
            Err(e) => format!("<container logs unavailable: {}>", e),
        };
        let _ = log.line("# container output:");
        let _ = log.block(&logs);

        RunnerError::ReadinessTimeout {
            container: short_id(id).to_string(),
            waited_secs: self.settings.readiness_timeout.as_secs(),
            reason: if exited {
                "container exited".to_string()
            } else {
                "port never accepted a connection".to_string()
            },
            logs,
        }
    }

    /// Stop then force-remove; removal is attempted even if stop fails
    async fn teardown(&self, id: &str) -> Result<()> {
        let stopped = self.runtime.stop(id, self.settings.stop_grace).await;
        let removed = self.runtime.remove(id).await;

        match (stopped, removed) {
            (_, Err(e)) => Err(RunnerError::teardown(short_id(id), e.to_string())),
            (Err(e), Ok(())) => {
                debug!("Stop of {} failed but removal succeeded: {}", short_id(id), e);
                Ok(())
            }
            (Ok(()), Ok(())) => Ok(()),
        }
    }
}

/// Connect to `addr` and check something is serving behind it
///
/// Docker's userland proxy accepts on a published port even while nothing
/// listens inside the container, then closes the connection at once. A
/// connection that stays open for [`SETTLE_WINDOW`], or sends a greeting,
/// counts as served.
async fn probe(addr: SocketAddr, connect_timeout: Duration) -> bool {
    let mut stream = match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        _ => return false,
    };

    let mut buf = [0u8; 1];
    match timeout(SETTLE_WINDOW, stream.read(&mut buf)).await {
        // still open, the server waits for the client to speak first
        Err(_) => true,
        Ok(Ok(read)) => read > 0,
        Ok(Err(e)) => {
            debug!("Connection to {} dropped: {}", addr, e);
            false
        }
    }
}

fn enter(log: &JobLog, states: &mut Vec<SessionState>, state: SessionState) {
    debug!("{}: session {}", log.label(), state);
    let _ = log.line(&format!("# container {}", state));
    states.push(state);
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_settings_from_config() {
        let config = TestConfig {
            port: 5000,
            data_dir: "/data".to_string(),
            run_args: Vec::new(),
            readiness_timeout_secs: 30,
            poll_interval_ms: 250,
            stop_grace_secs: 5,
            assertions: Vec::new(),
        };
        let settings = LifecycleSettings::from(&config);
        assert_eq!(settings.readiness_timeout, Duration::from_secs(30));
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.stop_grace, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_probe_accepts_open_connection() {
        // bound but never accepted: the kernel completes the handshake and the
        // connection stays open, like a server waiting for its client
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(probe(addr, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_probe_accepts_greeting() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            std::io::Write::write_all(&mut stream, b"ready\n").unwrap();
            std::thread::sleep(Duration::from_millis(500));
        });

        assert!(probe(addr, Duration::from_secs(1)).await);
        server.join().unwrap();
    }

    #[tokio::test]
    async fn test_probe_rejects_immediate_close() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        assert!(!probe(addr, Duration::from_secs(1)).await);
        server.join().unwrap();
    }

    #[tokio::test]
    async fn test_probe_rejects_closed_port() {
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        assert!(!probe(addr, Duration::from_secs(1)).await);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
    }
}
