//! Parameter and result types for command execution.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Parameters for one foreground execution.
#[derive(Debug, Clone)]
pub struct ExecParams {
    /// Full shell command line.
    pub command: String,
    /// Working directory; falls back to the executor default.
    pub cwd: Option<PathBuf>,
    /// Environment overrides merged over the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Timeout; falls back to the executor default.
    pub timeout: Option<Duration>,
}

impl ExecParams {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result of a completed (or timed-out) foreground execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

impl CommandResult {
    /// Combined stdout+stderr, the form handed to the output formatter.
    pub fn combined_output(&self) -> String {
        let mut combined = self.stdout.clone();
        combined.push_str(&self.stderr);
        combined
    }
}
