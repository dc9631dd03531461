use clap::Parser;
use serde_json::json;

use cradle_protocol::McpServerConfig;
use cradle_protocol::config::ApprovalPolicy;

use super::*;

fn args_for(dir: &tempfile::TempDir, extra: &[&str]) -> Args {
    let mut argv = vec![
        "cradle".to_string(),
        "--prompt".to_string(),
        "do the thing".to_string(),
        "--cwd".to_string(),
        dir.path().display().to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    Args::parse_from(argv)
}

fn script(lines: &[serde_json::Value]) -> Box<dyn ModelSource> {
    let text = lines
        .iter()
        .map(|line| line.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    Box::new(ScriptedModelSource::from_lines(&text).unwrap())
}

#[tokio::test]
async fn shell_echo_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let args = args_for(
        &dir,
        &["--audit-log", audit_path.to_str().unwrap()],
    );

    let model = script(&[
        json!([
            {"type": "text", "text": "running echo"},
            {"type": "tool_use", "id": "c1", "name": "run_terminal_cmd",
             "input": {"command": ["/bin/echo", "tool harness"]}}
        ]),
        json!([{"type": "text", "text": "all done"}]),
    ]);

    let report = run(&args, Config::default(), model).await.unwrap();
    assert_eq!(report.exit_code, exit_codes::OK);
    assert_eq!(report.turns_executed, 2);

    let audit = std::fs::read_to_string(&audit_path).unwrap();
    assert_eq!(audit.lines().count(), 1);
    let record: serde_json::Value = serde_json::from_str(audit.lines().next().unwrap()).unwrap();
    assert_eq!(record["tool_name"], "run_terminal_cmd");
    assert_eq!(record["call_id"], "c1");
    assert_eq!(record["success"], true);
}

#[tokio::test]
async fn rejected_escalation_then_success() {
    let dir = tempfile::tempdir().unwrap();
    let transcript_path = dir.path().join("transcript.log");
    let args = args_for(
        &dir,
        &["--transcript", transcript_path.to_str().unwrap()],
    );

    let mut config = Config::default();
    config.execution.approval = ApprovalPolicy::Never;

    let model = script(&[
        json!([
            {"type": "tool_use", "id": "c1", "name": "run_terminal_cmd",
             "input": {"command": "echo first", "with_escalated_permissions": true}}
        ]),
        json!([
            {"type": "tool_use", "id": "c2", "name": "run_terminal_cmd",
             "input": {"command": "echo second"}}
        ]),
        json!([{"type": "text", "text": "finished"}]),
    ]);

    let report = run(&args, config, model).await.unwrap();
    assert_eq!(report.exit_code, exit_codes::OK);

    let transcript = std::fs::read_to_string(&transcript_path).unwrap();
    assert!(transcript.contains("reject"));
    assert!(transcript.contains(r#""exit_code":0"#));
}

#[tokio::test]
async fn blocked_command_exits_with_policy_denial() {
    let dir = tempfile::tempdir().unwrap();
    let args = args_for(&dir, &[]);

    let mut config = Config::default();
    config.execution.blocked_commands = vec!["rm -rf".to_string()];

    let model = script(&[json!([
        {"type": "tool_use", "id": "c1", "name": "run_terminal_cmd",
         "input": {"command": "rm -rf /tmp/whatever"}}
    ])]);

    let report = run(&args, config, model).await.unwrap();
    assert_eq!(report.exit_code, exit_codes::POLICY_DENIAL);
}

#[tokio::test]
async fn apply_patch_writes_file_and_changes_log() {
    let dir = tempfile::tempdir().unwrap();
    let changes_path = dir.path().join("changes.jsonl");
    let args = args_for(
        &dir,
        &["--changes-log", changes_path.to_str().unwrap()],
    );

    let patch = "*** Begin Patch\n*** Add File: hello.txt\n+hi there\n*** End Patch";
    let model = script(&[
        json!([
            {"type": "tool_use", "id": "c1", "name": "apply_patch",
             "input": {"patch": patch}}
        ]),
        json!([{"type": "text", "text": "done"}]),
    ]);

    let report = run(&args, Config::default(), model).await.unwrap();
    assert_eq!(report.exit_code, exit_codes::OK);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("hello.txt")).unwrap(),
        "hi there\n"
    );
    let changes = std::fs::read_to_string(&changes_path).unwrap();
    assert!(changes.contains("hello.txt"));
}

#[tokio::test]
async fn blocked_tools_are_not_offered() {
    let dir = tempfile::tempdir().unwrap();
    let args = args_for(&dir, &["--blocked-tools", "run_terminal_cmd"]);

    let model = script(&[
        json!([
            {"type": "tool_use", "id": "c1", "name": "run_terminal_cmd",
             "input": {"command": "echo hi"}}
        ]),
        json!([{"type": "text", "text": "done"}]),
    ]);

    let report = run(&args, Config::default(), model).await.unwrap();
    assert_eq!(report.exit_code, exit_codes::OK);
    // The call routed nowhere: it produced an error result, not an execution.
    assert!(!dir.path().join("run_logs").exists());
}

#[tokio::test]
async fn exit_on_tool_error_stops_early() {
    let dir = tempfile::tempdir().unwrap();
    let args = args_for(&dir, &["--exit-on-tool-error"]);

    let model = script(&[
        json!([
            {"type": "tool_use", "id": "c1", "name": "read_file",
             "input": {"path": "does-not-exist.txt"}}
        ]),
        json!([{"type": "text", "text": "should never run"}]),
    ]);

    let report = run(&args, Config::default(), model).await.unwrap();
    assert_eq!(report.exit_code, exit_codes::FATAL_TOOL_ERROR);
    assert_eq!(report.turns_executed, 1);
}

#[tokio::test]
async fn dry_run_executes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let args = args_for(&dir, &["--dry-run"]);

    let patch = "*** Begin Patch\n*** Add File: hello.txt\n+hi\n*** End Patch";
    let model = script(&[json!([
        {"type": "tool_use", "id": "c1", "name": "apply_patch",
         "input": {"patch": patch}}
    ])]);

    let report = run(&args, Config::default(), model).await.unwrap();
    assert_eq!(report.exit_code, exit_codes::OK);
    assert!(!dir.path().join("hello.txt").exists());
}

#[tokio::test]
async fn mcp_tools_are_discovered_and_callable() {
    // Canned stdio server: handshake, then tools/list (id 2) during
    // discovery, then tools/call (id 3) when the model invokes the tool.
    let server_script = concat!(
        r#"read line; printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05"}}'; "#,
        r#"read line; "#,
        r#"read line; printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","description":"Echo text","inputSchema":{"type":"object","properties":{"text":{"type":"string"}}}}]}}'; "#,
        r#"read line; printf '%s\n' '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"echoed back"}],"isError":false}}'; "#,
    );
    let mut config = Config::default();
    config.mcp.definitions.push(McpServerConfig {
        name: "fs".to_string(),
        command: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), server_script.to_string()],
        env: Default::default(),
        ttl_seconds: None,
    });

    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let args = args_for(&dir, &["--audit-log", audit_path.to_str().unwrap()]);

    let model = script(&[
        json!([
            {"type": "tool_use", "id": "c1", "name": "fs/echo",
             "input": {"text": "hi"}}
        ]),
        json!([{"type": "text", "text": "done"}]),
    ]);

    let report = run(&args, config, model).await.unwrap();
    assert_eq!(report.exit_code, exit_codes::OK);

    let audit = std::fs::read_to_string(&audit_path).unwrap();
    let record: serde_json::Value = serde_json::from_str(audit.lines().next().unwrap()).unwrap();
    assert_eq!(record["tool_name"], "fs/echo");
    assert_eq!(record["success"], true);
}

#[tokio::test]
async fn missing_prompt_is_an_error() {
    let args = Args::parse_from(["cradle"]);
    let model = script(&[]);
    assert!(run(&args, Config::default(), model).await.is_err());
}

#[test]
fn script_parsing_skips_comments_and_blanks() {
    let text = "# comment\n\n[{\"type\":\"text\",\"text\":\"hi\"}]\n";
    let source = ScriptedModelSource::from_lines(text).unwrap();
    assert_eq!(source.messages.len(), 1);
}
