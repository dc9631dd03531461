use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use serde_json::json;

use cradle_protocol::config::ApprovalPolicy;
use cradle_protocol::config::ExecutionConfig;

use super::*;
use crate::handler::DenyAll;
use crate::testutil;

fn output_json(output: &ToolOutput) -> Value {
    match output {
        ToolOutput::Function { content, .. } => serde_json::from_str(content).unwrap(),
        other => panic!("expected function output, got {other:?}"),
    }
}

#[tokio::test]
async fn echo_string_command() {
    let harness = testutil::harness();
    let invocation = testutil::invocation(
        &harness,
        "run_terminal_cmd",
        testutil::function_payload(json!({"command": "echo tool harness"})),
    );
    let output = ShellHandler.handle(invocation).await.unwrap();
    let value = output_json(&output);
    assert_eq!(value["metadata"]["exit_code"], 0);
    assert_eq!(value["output"], "tool harness\n");
    assert_eq!(value["metadata"]["truncated"], false);
}

#[tokio::test]
async fn echo_argv_command() {
    let harness = testutil::harness();
    let invocation = testutil::invocation(
        &harness,
        "run_terminal_cmd",
        testutil::function_payload(json!({"command": ["/bin/echo", "tool harness"]})),
    );
    let output = ShellHandler.handle(invocation).await.unwrap();
    let value = output_json(&output);
    assert_eq!(value["metadata"]["exit_code"], 0);
    assert_eq!(value["output"], "tool harness\n");
}

#[tokio::test]
async fn local_shell_payload_accepted() {
    let harness = testutil::harness();
    let payload = ToolPayload::LocalShell {
        action: LocalShellAction::Exec {
            command: vec!["/bin/echo".to_string(), "legacy".to_string()],
            working_directory: None,
            timeout_ms: None,
        },
    };
    assert!(ShellHandler.matches_kind(&payload));
    let invocation = testutil::invocation(&harness, "run_terminal_cmd", payload);
    let output = ShellHandler.handle(invocation).await.unwrap();
    let value = output_json(&output);
    assert_eq!(value["output"], "legacy\n");
}

#[tokio::test]
async fn escalation_rejected_under_never() {
    let harness = testutil::harness_with(
        ExecutionConfig {
            approval: ApprovalPolicy::Never,
            ..Default::default()
        },
        Arc::new(DenyAll),
    );
    let invocation = testutil::invocation(
        &harness,
        "run_terminal_cmd",
        testutil::function_payload(
            json!({"command": "echo hi", "with_escalated_permissions": true}),
        ),
    );
    let err = ShellHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), "permission");
    assert!(err.to_string().contains("reject"));
}

#[tokio::test]
async fn second_attempt_without_escalation_succeeds() {
    let harness = testutil::harness_with(
        ExecutionConfig {
            approval: ApprovalPolicy::Never,
            ..Default::default()
        },
        Arc::new(DenyAll),
    );
    let invocation = testutil::invocation(
        &harness,
        "run_terminal_cmd",
        testutil::function_payload(json!({"command": "echo hi"})),
    );
    let output = ShellHandler.handle(invocation).await.unwrap();
    let value = output_json(&output);
    assert_eq!(value["metadata"]["exit_code"], 0);
}

#[tokio::test]
async fn blocked_command_is_fatal() {
    let harness = testutil::harness_with(
        ExecutionConfig {
            blocked_commands: vec!["rm -rf".to_string()],
            ..Default::default()
        },
        Arc::new(crate::handler::ApproveAll),
    );
    let invocation = testutil::invocation(
        &harness,
        "run_terminal_cmd",
        testutil::function_payload(json!({"command": "rm -rf /"})),
    );
    let err = ShellHandler.handle(invocation).await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.kind(), "sandbox");
}

#[tokio::test]
async fn approval_denied_responds_to_model() {
    let harness = testutil::harness_with(
        ExecutionConfig {
            approval: ApprovalPolicy::Always,
            ..Default::default()
        },
        Arc::new(DenyAll),
    );
    let invocation = testutil::invocation(
        &harness,
        "run_terminal_cmd",
        testutil::function_payload(json!({"command": "echo hi"})),
    );
    let err = ShellHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), "permission");
    assert!(err.to_string().contains("denied by user"));
}

#[tokio::test]
async fn timeout_marks_timed_out() {
    let harness = testutil::harness();
    let invocation = testutil::invocation(
        &harness,
        "run_terminal_cmd",
        testutil::function_payload(json!({"command": "sleep 5", "timeout_ms": 100})),
    );
    let output = ShellHandler.handle(invocation).await.unwrap();
    let value = output_json(&output);
    assert_eq!(value["metadata"]["timed_out"], true);
    assert_eq!(value["metadata"]["exit_code"], -1);
    assert!(value["output"]
        .as_str()
        .unwrap()
        .starts_with("command timed out after"));
}

#[tokio::test]
async fn policy_cap_overrides_requested_timeout() {
    let harness = testutil::harness_with(
        ExecutionConfig {
            timeout_seconds: Some(0.1),
            ..Default::default()
        },
        Arc::new(crate::handler::ApproveAll),
    );
    let invocation = testutil::invocation(
        &harness,
        "run_terminal_cmd",
        testutil::function_payload(json!({"command": "sleep 5", "timeout_ms": 60000})),
    );
    let start = std::time::Instant::now();
    let output = ShellHandler.handle(invocation).await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(3));
    let value = output_json(&output);
    assert_eq!(value["metadata"]["timed_out"], true);
}

#[tokio::test]
async fn background_returns_descriptor() {
    let harness = testutil::harness();
    let invocation = testutil::invocation(
        &harness,
        "run_terminal_cmd",
        testutil::function_payload(json!({"command": "echo bg", "is_background": true})),
    );
    let output = ShellHandler.handle(invocation).await.unwrap();
    let value = output_json(&output);
    let body = value["output"].as_str().unwrap();
    assert!(body.contains("background command dispatched"));
    assert!(body.contains("job_id:"));
    assert!(harness.turn.log_dir.exists());
}

#[tokio::test]
async fn malformed_arguments_are_validation_errors() {
    let harness = testutil::harness();
    let invocation = testutil::invocation(
        &harness,
        "run_terminal_cmd",
        testutil::function_payload(json!({"not_a_command": true})),
    );
    let err = ShellHandler.handle(invocation).await.unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[test]
fn shell_quote_preserves_words() {
    assert_eq!(shell_quote("simple"), "simple");
    assert_eq!(shell_quote("with space"), "'with space'");
    assert_eq!(shell_quote("it's"), r"'it'\''s'");
    assert_eq!(shell_quote(""), "''");
}
