//! Tool handler contract and invocation context.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use cradle_mcp::McpPool;
use cradle_protocol::ToolKind;
use cradle_protocol::ToolOutput;
use cradle_protocol::ToolPayload;
use cradle_shell::BackgroundRegistry;
use cradle_shell::ShellExecutor;

use crate::error::Result;
use crate::policy::ExecutionPolicy;
use crate::tracker::TurnDiffTracker;

/// Host-supplied approval surface.
///
/// Consulted by handlers before side-effecting operations when the policy
/// requires it; never consulted under `approval = never`.
#[async_trait]
pub trait ApprovalRequester: Send + Sync {
    async fn request_approval(&self, tool_name: &str, description: &str) -> bool;
}

/// Requester that approves everything. Useful for tests and trusted runs.
#[derive(Debug, Default)]
pub struct ApproveAll;

#[async_trait]
impl ApprovalRequester for ApproveAll {
    async fn request_approval(&self, _tool_name: &str, _description: &str) -> bool {
        true
    }
}

/// Requester that denies everything, for headless runs without a user.
#[derive(Debug, Default)]
pub struct DenyAll;

#[async_trait]
impl ApprovalRequester for DenyAll {
    async fn request_approval(&self, _tool_name: &str, _description: &str) -> bool {
        false
    }
}

/// Per-turn context shared by every invocation in the batch.
pub struct TurnContext {
    pub turn_id: u64,
    pub cwd: PathBuf,
    pub policy: ExecutionPolicy,
    pub approvals: Arc<dyn ApprovalRequester>,
    pub mcp_pool: Arc<McpPool>,
    pub shell: ShellExecutor,
    pub background: BackgroundRegistry,
    /// Directory for background-job sidecar logs.
    pub log_dir: PathBuf,
}

impl TurnContext {
    /// Resolve a handler-supplied path against the turn's cwd.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.cwd.join(path)
        }
    }
}

impl std::fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnContext")
            .field("turn_id", &self.turn_id)
            .field("cwd", &self.cwd)
            .finish_non_exhaustive()
    }
}

/// Context for one handler call. Short-lived: does not outlive the call.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub turn: Arc<TurnContext>,
    pub tracker: Arc<TurnDiffTracker>,
    /// Stream/subscription tag assigned by the host.
    pub sub_id: String,
    pub call_id: String,
    pub tool_name: String,
    pub payload: ToolPayload,
    pub cancel: CancellationToken,
}

impl ToolInvocation {
    /// Decode raw JSON arguments from the payload variants that carry them.
    pub fn raw_arguments(&self) -> Option<&str> {
        match &self.payload {
            ToolPayload::Function { raw_arguments }
            | ToolPayload::UnifiedExec { raw_arguments }
            | ToolPayload::Mcp { raw_arguments, .. } => Some(raw_arguments),
            ToolPayload::Custom { raw_input, .. } => Some(raw_input),
            ToolPayload::LocalShell { .. } => None,
        }
    }
}

/// A tool family implementation.
///
/// Handlers are stateless and reentrant; per-call state lives in the
/// invocation. Long-running work must observe `invocation.cancel` at
/// reasonable granularity and release tracker locks before returning
/// [`ToolError::Cancelled`](crate::error::ToolError::Cancelled).
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// Whether this handler accepts the payload variant.
    fn matches_kind(&self, payload: &ToolPayload) -> bool {
        payload.kind() == self.kind()
    }

    async fn handle(&self, invocation: ToolInvocation) -> Result<ToolOutput>;
}

#[cfg(test)]
#[path = "handler.test.rs"]
mod tests;
