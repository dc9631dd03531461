use super::*;
use crate::testutil;

use cradle_protocol::ToolPayload;

#[tokio::test]
async fn approve_all_and_deny_all() {
    assert!(ApproveAll.request_approval("run_terminal_cmd", "ls").await);
    assert!(!DenyAll.request_approval("run_terminal_cmd", "ls").await);
}

#[test]
fn resolve_path_against_cwd() {
    let harness = testutil::harness();
    let relative = harness.turn.resolve_path("src/main.rs");
    assert!(relative.starts_with(&harness.turn.cwd));

    let absolute = harness.turn.resolve_path("/etc/hosts");
    assert_eq!(absolute, std::path::PathBuf::from("/etc/hosts"));
}

#[test]
fn raw_arguments_by_payload() {
    let harness = testutil::harness();
    let function = testutil::invocation(
        &harness,
        "read_file",
        testutil::function_payload(serde_json::json!({"path": "a"})),
    );
    assert_eq!(function.raw_arguments(), Some(r#"{"path":"a"}"#));

    let local_shell = testutil::invocation(
        &harness,
        "run_terminal_cmd",
        ToolPayload::LocalShell {
            action: cradle_protocol::LocalShellAction::Exec {
                command: vec!["ls".to_string()],
                working_directory: None,
                timeout_ms: None,
            },
        },
    );
    assert_eq!(local_shell.raw_arguments(), None);
}
