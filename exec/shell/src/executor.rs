//! Foreground command execution with timeout enforcement.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::command::CommandResult;
use crate::command::ExecParams;
use crate::process::ChildGuard;
use crate::process::set_new_session;

/// Default command timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Shell command executor.
///
/// Commands run through the user's shell (`$SHELL`, falling back to
/// `/bin/sh`) in their own process group, so a timeout can terminate the
/// entire tree rather than just the immediate child.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    cwd: PathBuf,
    shell: String,
    default_timeout: Duration,
}

impl ShellExecutor {
    pub fn new(cwd: PathBuf) -> Self {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        Self {
            cwd,
            shell,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn cwd(&self) -> &PathBuf {
        &self.cwd
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Execute a command and capture its output.
    ///
    /// On timeout the process group is killed and the partial output captured
    /// so far is returned with `timed_out = true` and exit code -1.
    pub async fn execute(&self, params: ExecParams) -> std::io::Result<CommandResult> {
        let start = Instant::now();
        let timeout = params.timeout.unwrap_or(self.default_timeout);
        let cwd = params.cwd.clone().unwrap_or_else(|| self.cwd.clone());

        let mut cmd = tokio::process::Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&params.command)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &params.env {
            cmd.env(key, value);
        }
        set_new_session(&mut cmd);

        let mut child = cmd.spawn()?;
        let stdout_task = spawn_reader(child.stdout.take());
        let stderr_task = spawn_reader(child.stderr.take());
        let mut guard = ChildGuard::new(child);

        match tokio::time::timeout(timeout, guard.inner().wait()).await {
            Ok(Ok(status)) => {
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                let _ = guard.disarm();
                Ok(CommandResult {
                    exit_code: status.code().unwrap_or(-1),
                    stdout,
                    stderr,
                    duration: start.elapsed(),
                    timed_out: false,
                })
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                debug!(
                    command = %params.command,
                    timeout_secs = timeout.as_secs(),
                    "command timed out, killing process group"
                );
                guard.kill_group();
                let _ = guard.inner().wait().await;
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                let _ = guard.disarm();
                Ok(CommandResult {
                    exit_code: -1,
                    stdout,
                    stderr,
                    duration: start.elapsed(),
                    timed_out: true,
                })
            }
        }
    }
}

/// Drain a child stream into a lossily decoded string.
fn spawn_reader<R>(stream: Option<R>) -> tokio::task::JoinHandle<String>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut buf).await;
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(test)]
#[path = "executor.test.rs"]
mod tests;
