//! Execution policy gates.
//!
//! Handlers consult the policy before any side effect: command gating under
//! the sandbox level, write-path containment, approval requirements, and the
//! timeout cap.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use cradle_protocol::config::ApprovalPolicy;
use cradle_protocol::config::ExecutionConfig;
use cradle_protocol::config::SandboxPolicy;

use crate::error::Result;
use crate::error::ToolError;

/// Command basenames permitted under the strict sandbox.
const STRICT_SAFE_COMMANDS: &[&str] = &["ls", "cat", "echo", "pwd", "grep"];

/// System path prefixes that are never writable.
const PROTECTED_PREFIXES: &[&str] = &["/etc", "/sys", "/proc", "/dev"];

/// Immutable per-turn policy derived from the execution config.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPolicy {
    config: ExecutionConfig,
}

impl ExecutionPolicy {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    pub fn approval(&self) -> ApprovalPolicy {
        self.config.approval
    }

    pub fn sandbox(&self) -> SandboxPolicy {
        self.config.sandbox
    }

    /// Gate a command line under the sandbox rules.
    ///
    /// Violations are sandbox errors, which abort the turn.
    pub fn check_command(&self, command: &str) -> Result<()> {
        let text = command.trim();
        if text.is_empty() {
            return Err(ToolError::validation("command must not be empty"));
        }

        for blocked in &self.config.blocked_commands {
            if !blocked.is_empty() && text.contains(blocked.as_str()) {
                return Err(ToolError::sandbox(format!(
                    "command contains blocked pattern: {blocked}"
                )));
            }
        }

        if self.config.sandbox == SandboxPolicy::Strict {
            let first = text.split_whitespace().next().unwrap_or("");
            let basename = Path::new(first)
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(first);
            if !STRICT_SAFE_COMMANDS.contains(&basename) {
                return Err(ToolError::sandbox(format!(
                    "command '{basename}' not allowed in strict mode"
                )));
            }
        }

        Ok(())
    }

    /// Gate a filesystem write target.
    pub fn check_write_path(&self, path: &Path, cwd: &Path) -> Result<()> {
        let target = normalize(path, cwd);

        for prefix in PROTECTED_PREFIXES {
            if target.starts_with(prefix) {
                return Err(ToolError::sandbox(format!(
                    "cannot write to system path {prefix}"
                )));
            }
        }

        if !self.config.allowed_paths.is_empty() {
            let allowed = self
                .config
                .allowed_paths
                .iter()
                .any(|candidate| target.starts_with(normalize(candidate, cwd)));
            if !allowed {
                return Err(ToolError::sandbox(format!(
                    "path {} not under allowed paths",
                    target.display()
                )));
            }
        }

        Ok(())
    }

    /// Whether this invocation must go through the approval requester.
    pub fn approval_needed(&self, is_write: bool, escalated: bool) -> bool {
        match self.config.approval {
            ApprovalPolicy::Always => true,
            ApprovalPolicy::OnWrite => is_write,
            ApprovalPolicy::OnRequest => escalated,
            ApprovalPolicy::Never => false,
        }
    }

    /// Whether escalation requests are categorically refused.
    pub fn refuses_escalation(&self) -> bool {
        self.config.approval == ApprovalPolicy::Never
    }

    /// Coerce the configured cap onto a handler-supplied timeout.
    pub fn cap_timeout(&self, requested: Option<Duration>) -> Option<Duration> {
        let cap = self
            .config
            .timeout_seconds
            .map(Duration::from_secs_f64);
        match (requested, cap) {
            (Some(requested), Some(cap)) => Some(requested.min(cap)),
            (Some(requested), None) => Some(requested),
            (None, cap) => cap,
        }
    }
}

/// Absolutize against `cwd` and resolve `.`/`..` lexically.
///
/// Canonicalization is deliberately lexical: write targets often do not
/// exist yet.
fn normalize(path: &Path, cwd: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
#[path = "policy.test.rs"]
mod tests;
