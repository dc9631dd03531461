//! Shared fixtures for the crate's test modules.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use cradle_mcp::McpPool;
use cradle_protocol::ToolPayload;
use cradle_protocol::config::ExecutionConfig;
use cradle_shell::BackgroundRegistry;
use cradle_shell::ShellExecutor;

use crate::handler::ApprovalRequester;
use crate::handler::ApproveAll;
use crate::handler::ToolInvocation;
use crate::handler::TurnContext;
use crate::policy::ExecutionPolicy;
use crate::tracker::TurnDiffTracker;

pub(crate) struct TestHarness {
    /// Owns the temp dir backing `turn.cwd`.
    pub dir: tempfile::TempDir,
    pub turn: Arc<TurnContext>,
    pub tracker: Arc<TurnDiffTracker>,
}

pub(crate) fn harness() -> TestHarness {
    harness_with(ExecutionConfig::default(), Arc::new(ApproveAll))
}

pub(crate) fn harness_with(
    config: ExecutionConfig,
    approvals: Arc<dyn ApprovalRequester>,
) -> TestHarness {
    let dir = tempfile::tempdir().expect("create temp dir");
    let cwd = dir.path().to_path_buf();
    let turn = Arc::new(TurnContext {
        turn_id: 1,
        cwd: cwd.clone(),
        policy: ExecutionPolicy::new(config),
        approvals,
        mcp_pool: Arc::new(McpPool::new(vec![])),
        shell: ShellExecutor::new(cwd.clone()),
        background: BackgroundRegistry::new(),
        log_dir: cwd.join("run_logs"),
    });
    TestHarness {
        dir,
        turn,
        tracker: Arc::new(TurnDiffTracker::new(1)),
    }
}

pub(crate) fn invocation(
    harness: &TestHarness,
    tool_name: &str,
    payload: ToolPayload,
) -> ToolInvocation {
    ToolInvocation {
        turn: harness.turn.clone(),
        tracker: harness.tracker.clone(),
        sub_id: "sub-1".to_string(),
        call_id: "call-1".to_string(),
        tool_name: tool_name.to_string(),
        payload,
        cancel: CancellationToken::new(),
    }
}

pub(crate) fn function_payload(arguments: serde_json::Value) -> ToolPayload {
    ToolPayload::Function {
        raw_arguments: arguments.to_string(),
    }
}
