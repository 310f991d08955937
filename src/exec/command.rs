// src/exec/command.rs

//! Shell-command task runner.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::chain::{TaskRun, TaskRunner};
use crate::errors::Result;

/// Runs one shell command, writing its stdout and stderr to a log file.
///
/// - Non-zero exit becomes a failed [`TaskRun`] carrying the exit code.
/// - With a timeout set, an overrunning process is killed and reported as
///   failed. The scheduler itself never cancels tasks.
/// - The child is killed if the runner future is dropped.
#[derive(Debug, Clone)]
pub struct CommandTask {
    cmd: String,
    log_path: PathBuf,
    workdir: Option<PathBuf>,
    env: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl CommandTask {
    pub fn new(cmd: impl Into<String>, log_path: impl Into<PathBuf>) -> Self {
        Self {
            cmd: cmd.into(),
            log_path: log_path.into(),
            workdir: None,
            env: Vec::new(),
            timeout: None,
        }
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run_inner(&mut self) -> Result<TaskRun> {
        let mut run = TaskRun {
            passed: false,
            pid: None,
            log_path: Some(self.log_path.clone()),
            command_line: Some(self.cmd.clone()),
            error_messages: Vec::new(),
        };

        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating log dir {:?}", parent))?;
            }
        }
        let stdout_log = std::fs::File::create(&self.log_path)
            .with_context(|| format!("creating log file {:?}", self.log_path))?;
        let stderr_log = stdout_log
            .try_clone()
            .with_context(|| format!("duplicating log handle {:?}", self.log_path))?;

        let mut cmd = shell_command(&self.cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout_log))
            .stderr(Stdio::from(stderr_log))
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                run.error_messages
                    .push(format!("could not start `{}`: {e}", self.cmd));
                return Ok(run);
            }
        };
        run.pid = child.id();

        info!(cmd = %self.cmd, pid = ?run.pid, log = ?self.log_path, "started task process");

        let status = match self.timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => Some(status.context("waiting for task process")?),
                    Err(_) => {
                        warn!(cmd = %self.cmd, pid = ?run.pid, ?limit, "task process timed out; killing it");
                        if let Err(e) = child.kill().await {
                            warn!(cmd = %self.cmd, error = %e, "failed to kill timed out process");
                        }
                        None
                    }
                }
            }
            None => Some(child.wait().await.context("waiting for task process")?),
        };

        match status {
            Some(status) if status.success() => run.passed = true,
            Some(status) => {
                let message = match status.code() {
                    Some(code) => format!("`{}` exited with code {code}", self.cmd),
                    None => format!("`{}` was terminated by a signal", self.cmd),
                };
                run.error_messages.push(message);
            }
            None => {
                let limit = self.timeout.unwrap_or_default();
                run.error_messages
                    .push(format!("`{}` timed out after {limit:?}", self.cmd));
            }
        }

        debug!(cmd = %self.cmd, passed = run.passed, "task process finished");
        Ok(run)
    }
}

impl TaskRunner for CommandTask {
    fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<TaskRun>> + Send + '_>> {
        Box::pin(self.run_inner())
    }
}

/// Build a shell command appropriate for the platform.
fn shell_command(line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(line);
        c
    }
}
