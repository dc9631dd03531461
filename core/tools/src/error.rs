//! Error taxonomy for tool execution.
//!
//! Every error carries a kind that decides how the registry reacts: most
//! kinds become an error tool-result the model can see and recover from;
//! `Sandbox`, `System`, and `Protocol` abort the turn.

use thiserror::Error;

/// How the registry handles an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Convert into a tool-result with `is_error = true`; the turn continues.
    RespondToModel,
    /// Abort the turn and run the cleanup pass.
    Fatal,
}

/// Tool execution errors.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Malformed or rejected tool input.
    #[error("invalid input: {message}")]
    Validation { message: String },

    /// Missing tool, file, or resource.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Operation denied by policy or by the user.
    #[error("permission denied: {message}")]
    Permission { message: String },

    /// Pre-image disagreement on a tracked file.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Writer-intent lock contention: another operation holds the path.
    #[error("already locked: {message}")]
    AlreadyLocked { message: String },

    /// Transient failure; the owning handler may retry once.
    #[error("transient failure: {message}")]
    Transient { message: String },

    /// Execution exceeded its cap.
    #[error("timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Interrupt fired while the call was in flight.
    #[error("cancelled")]
    Cancelled,

    /// Sandbox violation.
    #[error("sandbox violation: {message}")]
    Sandbox { message: String },

    /// Failure in core logic (I/O on core state, OOM, poisoned lock).
    #[error("system error: {message}")]
    System { message: String },

    /// Wire-protocol violation (e.g. missing call id).
    #[error("protocol error: {message}")]
    Protocol { message: String },
}

impl ToolError {
    pub fn validation(message: impl Into<String>) -> Self {
        ToolError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ToolError::NotFound {
            message: message.into(),
        }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        ToolError::Permission {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ToolError::Conflict {
            message: message.into(),
        }
    }

    pub fn already_locked(message: impl Into<String>) -> Self {
        ToolError::AlreadyLocked {
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        ToolError::Transient {
            message: message.into(),
        }
    }

    pub fn sandbox(message: impl Into<String>) -> Self {
        ToolError::Sandbox {
            message: message.into(),
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        ToolError::System {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        ToolError::Protocol {
            message: message.into(),
        }
    }

    /// Stable kind label for telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Validation { .. } => "validation",
            ToolError::NotFound { .. } => "not_found",
            ToolError::Permission { .. } => "permission",
            ToolError::Conflict { .. } => "conflict",
            ToolError::AlreadyLocked { .. } => "already_locked",
            ToolError::Transient { .. } => "transient",
            ToolError::Timeout { .. } => "timeout",
            ToolError::Cancelled => "cancelled",
            ToolError::Sandbox { .. } => "sandbox",
            ToolError::System { .. } => "system",
            ToolError::Protocol { .. } => "protocol",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ToolError::Sandbox { .. } | ToolError::System { .. } | ToolError::Protocol { .. } => {
                Severity::Fatal
            }
            _ => Severity::RespondToModel,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ToolError::Cancelled)
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::Validation {
            message: format!("bad JSON arguments: {err}"),
        }
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ToolError::NotFound {
                message: err.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => ToolError::Permission {
                message: err.to_string(),
            },
            _ => ToolError::System {
                message: err.to_string(),
            },
        }
    }
}

/// Result type for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;

#[cfg(test)]
#[path = "error.test.rs"]
mod tests;
