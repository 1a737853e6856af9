//! Per-job log destinations
//!
//! Every job writes to its own file so concurrent jobs never interleave. With
//! `verbose` each line is also echoed to the terminal, prefixed by the job
//! label.

use crate::error::{Result, RunnerError};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io::Write;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Log file owned by a single job
#[derive(Debug)]
pub struct JobLog {
    label: String,
    path: Utf8PathBuf,
    file: Mutex<File>,
    echo: bool,
}

impl JobLog {
    /// Create (truncate) `<dir>/<label>.log`, creating `dir` as needed
    pub fn create(dir: &Utf8Path, label: &str, echo: bool) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| RunnerError::log_file(dir.as_str(), e))?;

        let path = dir.join(format!("{}.log", file_stem(label)));
        let file = File::create(&path).map_err(|e| RunnerError::log_file(path.as_str(), e))?;

        let log = Self {
            label: label.to_string(),
            path,
            file: Mutex::new(file),
            echo,
        };
        log.write_raw(&format!(
            "# {} started {}\n",
            label,
            chrono::Utc::now().to_rfc3339()
        ))?;
        Ok(log)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Append one line
    pub fn line(&self, line: &str) -> Result<()> {
        if self.echo {
            println!("[{}] {}", self.label, line);
        }
        self.write_raw(&format!("{}\n", line))
    }

    /// Append a multi-line block line by line
    pub fn block(&self, text: &str) -> Result<()> {
        text.lines().try_for_each(|l| self.line(l))
    }

    fn write_raw(&self, text: &str) -> Result<()> {
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        file.write_all(text.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| RunnerError::log_file(self.path.as_str(), e))
    }

    /// Run `program args...`, streaming stdout and stderr into the log
    ///
    /// A non-zero exit is a [`RunnerError::JobFailure`] for `step`.
    pub async fn run(&self, step: &str, program: &str, args: &[String]) -> Result<()> {
        debug!("{}: {} {}", self.label, program, args.join(" "));
        self.line(&format!("$ {} {}", program, args.join(" ")))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunnerError::job_failure(step, format!("cannot run {}: {}", program, e)))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (out, err) = tokio::join!(self.pump(stdout), self.pump(stderr));

        // The exit status decides the outcome; log trouble only matters after a clean exit
        let status = child.wait().await?;
        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let _ = self.line(&format!("# {} exited with {}", program, code));
            return Err(RunnerError::job_failure(
                step,
                format!("{} exited with {} (see {})", program, code, self.path),
            ));
        }
        out?;
        err?;
        Ok(())
    }

    /// Copy `stream` into the log line by line until EOF
    ///
    /// Output is raw bytes; invalid UTF-8 is replaced rather than rejected.
    /// The stream is always read to the end so the child never blocks on a
    /// full pipe. Returns the first log write error, if any.
    async fn pump<R: AsyncRead + Unpin>(&self, stream: Option<R>) -> Result<()> {
        let Some(stream) = stream else {
            return Ok(());
        };
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        let mut written = Ok(());

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if written.is_ok() {
                        let text = String::from_utf8_lossy(&buf);
                        written = self.line(text.trim_end_matches(['\n', '\r']));
                    }
                }
                Err(e) => {
                    warn!("{}: output stream failed: {}", self.label, e);
                    let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                    break;
                }
            }
        }

        written
    }
}

/// `5.0.2/bookworm` → `5.0.2-bookworm`
fn file_stem(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | ' ' => '-',
            c => c,
        })
        .collect()
}
