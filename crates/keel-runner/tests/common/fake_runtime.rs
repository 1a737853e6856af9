//! Scripted container runtime

use async_trait::async_trait;
use keel_runner::{ContainerRuntime, ContainerSpec, ExecOutput, JobLog, Result, RunnerError};
use std::collections::{BTreeSet, HashMap};
use std::net::{SocketAddr, TcpListener};
use std::sync::Mutex;
use std::time::Duration;

/// How a started container behaves while being polled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    /// Port accepts connections right away
    Listening,
    /// Keeps running, port never published
    NeverReady,
    /// Port is published but every connection is closed at once, like a
    /// userland proxy with nothing listening behind it
    ProxyOnly,
    /// Process exits immediately
    Exits,
}

/// In-process runtime recording every call
pub struct FakeRuntime {
    startup: Startup,
    start_error: Option<String>,
    logs: String,
    exec: HashMap<String, ExecOutput>,
    fail_stop: bool,
    fail_remove: bool,
    fail_build_for: Option<String>,
    listener: TcpListener,
    live: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<String>>,
    builds: Mutex<Vec<Vec<String>>>,
    counter: Mutex<u32>,
}

impl FakeRuntime {
    pub fn new(startup: Startup) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        if startup == Startup::ProxyOnly {
            let proxy = listener.try_clone().expect("clone test listener");
            std::thread::spawn(move || {
                for stream in proxy.incoming() {
                    drop(stream);
                }
            });
        }

        Self {
            startup,
            start_error: None,
            logs: String::new(),
            exec: HashMap::new(),
            fail_stop: false,
            fail_remove: false,
            fail_build_for: None,
            listener,
            live: Mutex::new(BTreeSet::new()),
            calls: Mutex::new(Vec::new()),
            builds: Mutex::new(Vec::new()),
            counter: Mutex::new(0),
        }
    }

    pub fn with_start_error(mut self, reason: &str) -> Self {
        self.start_error = Some(reason.to_string());
        self
    }

    pub fn with_logs(mut self, logs: &str) -> Self {
        self.logs = logs.to_string();
        self
    }

    /// Scripted result for a command (arguments joined by spaces)
    pub fn with_exec(mut self, command: &str, exit_code: i32, stdout: &str) -> Self {
        self.exec.insert(
            command.to_string(),
            ExecOutput {
                exit_code,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    /// Builds whose arguments mention `needle` fail
    pub fn failing_build_for(mut self, needle: &str) -> Self {
        self.fail_build_for = Some(needle.to_string());
        self
    }

    /// Containers started and not yet removed
    pub fn live_containers(&self) -> BTreeSet<String> {
        self.live.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn builds(&self) -> Vec<Vec<String>> {
        self.builds.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn addr(&self) -> SocketAddr {
        self.listener.local_addr().expect("listener addr")
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn run_detached(&self, spec: &ContainerSpec) -> Result<String> {
        self.record(format!("run {}", spec.image));
        if let Some(reason) = &self.start_error {
            return Err(RunnerError::container_start(&spec.image, reason.clone()));
        }
        let id = {
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            format!("container-{:04}", *counter)
        };
        self.live.lock().unwrap().insert(id.clone());
        Ok(id)
    }

    async fn published_addr(&self, _id: &str, _port: u16) -> Result<Option<SocketAddr>> {
        Ok(match self.startup {
            Startup::Listening | Startup::ProxyOnly => Some(self.addr()),
            Startup::NeverReady | Startup::Exits => None,
        })
    }

    async fn is_running(&self, id: &str) -> Result<bool> {
        Ok(self.startup != Startup::Exits && self.live.lock().unwrap().contains(id))
    }

    async fn logs(&self, id: &str) -> Result<String> {
        self.record(format!("logs {}", id));
        Ok(self.logs.clone())
    }

    async fn exec(&self, id: &str, command: &[String]) -> Result<ExecOutput> {
        let joined = command.join(" ");
        self.record(format!("exec {} {}", id, joined));
        Ok(self.exec.get(&joined).cloned().unwrap_or_default())
    }

    async fn stop(&self, id: &str, _grace: Duration) -> Result<()> {
        self.record(format!("stop {}", id));
        if self.fail_stop {
            return Err(RunnerError::runtime("docker stop", "daemon timeout"));
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.record(format!("remove {}", id));
        if self.fail_remove {
            return Err(RunnerError::runtime("docker rm", "device busy"));
        }
        self.live.lock().unwrap().remove(id);
        Ok(())
    }

    async fn build(&self, args: &[String], log: &JobLog) -> Result<()> {
        self.builds.lock().unwrap().push(args.to_vec());
        log.line(&format!("building {}", args.join(" ")))?;
        match &self.fail_build_for {
            Some(needle) if args.iter().any(|a| a.contains(needle.as_str())) => Err(
                RunnerError::job_failure("build", "docker exited with 1"),
            ),
            _ => Ok(()),
        }
    }
}
