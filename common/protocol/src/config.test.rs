use super::*;
use pretty_assertions::assert_eq;

#[test]
fn defaults() {
    let config = Config::default();
    assert_eq!(config.model.context_tokens, 200_000);
    assert_eq!(config.model.window_tokens(), 180_000);
    assert!(config.compaction.auto);
    assert_eq!(config.compaction.keep_last_turns, 4);
    assert_eq!(config.compaction.target_tokens, 110_000);
    assert_eq!(config.tools.limits.max_lines, 800);
    assert_eq!(config.execution.sandbox, SandboxPolicy::Restricted);
    assert_eq!(config.execution.approval, ApprovalPolicy::OnRequest);
    assert!(config.validate().is_ok());
}

#[test]
fn toml_sections() {
    let text = r#"
        [model]
        name = "claude-sonnet-4-5"
        context_tokens = 100000

        [compaction]
        auto = false
        keep_last_turns = 2
        target_tokens = 50000

        [execution]
        sandbox = "strict"
        approval = "never"
        blocked_commands = ["rm -rf"]
        timeout_seconds = 30.0

        [tools.limits]
        max_tool_tokens = 1000

        [[mcp.definitions]]
        name = "fs"
        command = "mcp-fs"
        args = ["--root", "/tmp"]
        ttl_seconds = 120.0
    "#;
    let config: Config = toml::from_str(text).unwrap();
    assert_eq!(config.model.context_tokens, 100_000);
    assert!(!config.compaction.auto);
    assert_eq!(config.execution.sandbox, SandboxPolicy::Strict);
    assert_eq!(config.execution.approval, ApprovalPolicy::Never);
    assert_eq!(config.execution.blocked_commands, vec!["rm -rf"]);
    assert_eq!(config.tools.limits.max_tool_tokens, 1_000);
    // Unspecified limits keep their defaults.
    assert_eq!(config.tools.limits.max_lines, 800);
    assert_eq!(config.mcp.definitions.len(), 1);
    assert_eq!(config.mcp.definitions[0].args, vec!["--root", "/tmp"]);
    assert!(config.validate().is_ok());
}

#[test]
fn validate_rejects_bad_timeout() {
    let mut config = Config::default();
    config.execution.timeout_seconds = Some(0.0);
    assert!(config.validate().is_err());

    config.execution.timeout_seconds = Some(f64::NAN);
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_zero_window() {
    let mut config = Config::default();
    config.model.context_tokens = 0;
    assert!(config.validate().is_err());
}
