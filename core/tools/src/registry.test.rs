use std::sync::Arc;

use async_trait::async_trait;

use cradle_protocol::JsonSchema;
use cradle_protocol::ToolKind;
use cradle_protocol::ToolOutput;
use cradle_protocol::ToolSpec;

use super::*;
use crate::testutil;

struct EchoHandler;

#[async_trait]
impl ToolHandler for EchoHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        let raw = invocation.raw_arguments().unwrap_or("{}");
        Ok(ToolOutput::text(format!("echo:{raw}")))
    }
}

struct FailingHandler {
    error: fn() -> ToolError,
}

#[async_trait]
impl ToolHandler for FailingHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, _invocation: ToolInvocation) -> Result<ToolOutput> {
        Err((self.error)())
    }
}

fn echo_spec(name: &str) -> ToolSpec {
    ToolSpec::new(
        name,
        "echo",
        JsonSchema::Object {
            properties: Default::default(),
            required: None,
            additional_properties: None,
        },
    )
}

#[tokio::test]
async fn dispatch_success_carries_call_id() {
    let registry = ToolRegistry::builder()
        .register(echo_spec("echo"), Arc::new(EchoHandler))
        .build();
    let harness = testutil::harness();
    let invocation = testutil::invocation(
        &harness,
        "echo",
        testutil::function_payload(serde_json::json!({"x": 1})),
    );

    let block = registry.dispatch(invocation).await.unwrap();
    assert_eq!(block.tool_use_id, "call-1");
    assert_eq!(block.content, r#"echo:{"x":1}"#);
    assert!(!block.is_error);

    let events = registry.telemetry().events();
    assert_eq!(events.len(), 1);
    assert!(events[0].success);
    assert_eq!(events[0].tool_name, "echo");
    assert_eq!(events[0].call_id, "call-1");
}

#[tokio::test]
async fn unknown_tool_responds_to_model() {
    let registry = ToolRegistry::builder().build();
    let harness = testutil::harness();
    let invocation = testutil::invocation(
        &harness,
        "ghost",
        testutil::function_payload(serde_json::json!({})),
    );

    let block = registry.dispatch(invocation).await.unwrap();
    assert!(block.is_error);
    assert!(block.content.contains("tool 'ghost' not found"));

    let events = registry.telemetry().events();
    assert_eq!(events[0].error_kind.as_deref(), Some("not_found"));
}

#[tokio::test]
async fn incompatible_payload_responds_to_model() {
    let registry = ToolRegistry::builder()
        .register(echo_spec("echo"), Arc::new(EchoHandler))
        .build();
    let harness = testutil::harness();
    let invocation = testutil::invocation(
        &harness,
        "echo",
        cradle_protocol::ToolPayload::Custom {
            name: "echo".to_string(),
            raw_input: String::new(),
        },
    );

    let block = registry.dispatch(invocation).await.unwrap();
    assert!(block.is_error);
    assert!(block.content.contains("incompatible payload"));
}

#[tokio::test]
async fn respond_to_model_errors_become_blocks() {
    let registry = ToolRegistry::builder()
        .register(
            echo_spec("flaky"),
            Arc::new(FailingHandler {
                error: || ToolError::not_found("missing file"),
            }),
        )
        .build();
    let harness = testutil::harness();
    let invocation = testutil::invocation(
        &harness,
        "flaky",
        testutil::function_payload(serde_json::json!({})),
    );

    let block = registry.dispatch(invocation).await.unwrap();
    assert!(block.is_error);
    assert!(block.content.contains("missing file"));
}

#[tokio::test]
async fn fatal_errors_propagate() {
    let registry = ToolRegistry::builder()
        .register(
            echo_spec("boom"),
            Arc::new(FailingHandler {
                error: || ToolError::sandbox("blocked command"),
            }),
        )
        .build();
    let harness = testutil::harness();
    let invocation = testutil::invocation(
        &harness,
        "boom",
        testutil::function_payload(serde_json::json!({})),
    );

    let err = registry.dispatch(invocation).await.unwrap_err();
    assert!(err.is_fatal());
    let events = registry.telemetry().events();
    assert_eq!(events[0].error_kind.as_deref(), Some("sandbox"));
}

#[tokio::test]
async fn duplicate_registration_last_wins() {
    let registry = ToolRegistry::builder()
        .register(
            echo_spec("dup").with_parallel(false),
            Arc::new(FailingHandler {
                error: || ToolError::validation("old handler"),
            }),
        )
        .register(echo_spec("dup").with_parallel(true), Arc::new(EchoHandler))
        .build();

    // Spec table keeps one entry, the newest.
    assert_eq!(registry.specs().len(), 1);
    assert!(registry.supports_parallel("dup"));

    let harness = testutil::harness();
    let invocation = testutil::invocation(
        &harness,
        "dup",
        testutil::function_payload(serde_json::json!({})),
    );
    let block = registry.dispatch(invocation).await.unwrap();
    assert!(!block.is_error);
}

#[test]
fn unknown_names_are_serial() {
    let registry = ToolRegistry::builder().build();
    assert!(!registry.supports_parallel("whatever"));
}
