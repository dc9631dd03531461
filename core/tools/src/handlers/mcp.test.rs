use std::sync::Arc;

use serde_json::json;

use cradle_mcp::McpPool;
use cradle_protocol::McpServerConfig;
use cradle_protocol::config::ExecutionConfig;
use cradle_shell::BackgroundRegistry;
use cradle_shell::ShellExecutor;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::handler::ApproveAll;
use crate::handler::TurnContext;
use crate::policy::ExecutionPolicy;
use crate::tracker::TurnDiffTracker;

/// Canned server: handshake, then one tools/call answer (id 2).
fn answering_server(name: &str, response: &str) -> McpServerConfig {
    let script = format!(
        concat!(
            r#"read line; printf '%s\n' '{{"jsonrpc":"2.0","id":1,"result":{{"protocolVersion":"2024-11-05"}}}}'; "#,
            r#"read line; read line; printf '%s\n' '{response}'; "#,
        ),
        response = response
    );
    McpServerConfig {
        name: name.to_string(),
        command: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), script],
        env: Default::default(),
        ttl_seconds: None,
    }
}

/// Server that exits right after the handshake; every call hits EOF.
fn dying_server(name: &str) -> McpServerConfig {
    let script = concat!(
        r#"read line; printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05"}}'; "#,
        r#"read line"#,
    );
    McpServerConfig {
        name: name.to_string(),
        command: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        env: Default::default(),
        ttl_seconds: None,
    }
}

fn invocation_for(pool: Arc<McpPool>, server: &str, tool: &str) -> ToolInvocation {
    let dir = std::env::temp_dir();
    let turn = Arc::new(TurnContext {
        turn_id: 1,
        cwd: dir.clone(),
        policy: ExecutionPolicy::new(ExecutionConfig::default()),
        approvals: Arc::new(ApproveAll),
        mcp_pool: pool,
        shell: ShellExecutor::new(dir.clone()),
        background: BackgroundRegistry::new(),
        log_dir: dir.join("run_logs"),
    });
    ToolInvocation {
        turn,
        tracker: Arc::new(TurnDiffTracker::new(1)),
        sub_id: "sub-1".to_string(),
        call_id: "call-1".to_string(),
        tool_name: format!("{server}/{tool}"),
        payload: ToolPayload::Mcp {
            server: server.to_string(),
            tool: tool.to_string(),
            raw_arguments: json!({"q": "hi"}).to_string(),
        },
        cancel: CancellationToken::new(),
    }
}

#[tokio::test]
async fn forwards_call_and_maps_result() {
    let response =
        r#"{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"from-server"}],"isError":false}}"#;
    let pool = Arc::new(McpPool::new(vec![answering_server("fs", response)]));
    let invocation = invocation_for(pool.clone(), "fs", "lookup");

    let output = McpHandler.handle(invocation).await.unwrap();
    assert!(output.is_success());
    assert_eq!(output.content_text(), "from-server");
    pool.close_all().await;
}

#[tokio::test]
async fn server_side_tool_error_is_preserved() {
    let response =
        r#"{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"tool blew up"}],"isError":true}}"#;
    let pool = Arc::new(McpPool::new(vec![answering_server("fs", response)]));
    let invocation = invocation_for(pool.clone(), "fs", "lookup");

    let output = McpHandler.handle(invocation).await.unwrap();
    assert!(!output.is_success());
    pool.close_all().await;
}

#[tokio::test]
async fn unknown_server_is_not_found() {
    let pool = Arc::new(McpPool::new(vec![]));
    let invocation = invocation_for(pool, "ghost", "tool");
    let err = McpHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn transient_failure_retries_once_then_reports() {
    // Both the first client and its replacement die after the handshake, so
    // the retry also fails and the error goes back to the model.
    let pool = Arc::new(McpPool::new(vec![dying_server("fs")]));
    let invocation = invocation_for(pool.clone(), "fs", "lookup");

    let err = McpHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), "transient");
    assert!(!err.is_fatal());
    pool.close_all().await;
}

#[test]
fn spec_for_mcp_tool_sanitizes_schema() {
    let descriptor = cradle_mcp::ToolDescriptor {
        name: "lookup".to_string(),
        description: Some("Look things up".to_string()),
        input_schema: Some(json!({
            "type": "object",
            "properties": {
                "count": {"type": "integer"},
                "tags": {"type": "array"}
            },
            "required": ["count"]
        })),
    };
    let spec = spec_for_mcp_tool("fs", &descriptor).unwrap();
    assert_eq!(spec.name, "fs/lookup");
    assert_eq!(spec.description, "Look things up");
    assert!(!spec.supports_parallel);

    // Sanitization realized the schema: integer became number, the bare
    // array gained items.
    let wire = spec.to_wire();
    assert_eq!(wire["input_schema"]["properties"]["count"]["type"], "number");
    assert_eq!(
        wire["input_schema"]["properties"]["tags"]["items"]["type"],
        "string"
    );
}

#[test]
fn spec_for_mcp_tool_defaults_missing_schema() {
    let descriptor = cradle_mcp::ToolDescriptor {
        name: "ping".to_string(),
        description: None,
        input_schema: None,
    };
    let spec = spec_for_mcp_tool("fs", &descriptor).unwrap();
    assert_eq!(spec.name, "fs/ping");
    assert!(spec.description.contains("fs"));
    assert_eq!(spec.to_wire()["input_schema"]["type"], "object");
}

#[test]
fn spec_for_mcp_tool_rejects_unbounded_schema() {
    let mut schema = json!({"type": "string"});
    for _ in 0..100 {
        schema = json!({"type": "object", "properties": {"inner": schema}});
    }
    let descriptor = cradle_mcp::ToolDescriptor {
        name: "deep".to_string(),
        description: None,
        input_schema: Some(schema),
    };
    let err = spec_for_mcp_tool("fs", &descriptor).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.kind(), "protocol");
}

#[tokio::test]
async fn malformed_arguments_are_validation() {
    let pool = Arc::new(McpPool::new(vec![]));
    let mut invocation = invocation_for(pool, "fs", "lookup");
    invocation.payload = ToolPayload::Mcp {
        server: "fs".to_string(),
        tool: "lookup".to_string(),
        raw_arguments: "{broken".to_string(),
    };
    let err = McpHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), "validation");
}
