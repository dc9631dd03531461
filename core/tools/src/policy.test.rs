use std::path::Path;
use std::time::Duration;

use cradle_protocol::config::ApprovalPolicy;
use cradle_protocol::config::ExecutionConfig;
use cradle_protocol::config::SandboxPolicy;

use super::*;

fn policy(config: ExecutionConfig) -> ExecutionPolicy {
    ExecutionPolicy::new(config)
}

#[test]
fn blocked_commands_are_sandbox_violations() {
    let policy = policy(ExecutionConfig {
        blocked_commands: vec!["rm -rf".to_string()],
        ..Default::default()
    });
    let err = policy.check_command("rm -rf /tmp/x").unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.kind(), "sandbox");
    assert!(policy.check_command("ls -la").is_ok());
}

#[test]
fn strict_mode_safelist() {
    let policy = policy(ExecutionConfig {
        sandbox: SandboxPolicy::Strict,
        ..Default::default()
    });
    assert!(policy.check_command("ls /tmp").is_ok());
    assert!(policy.check_command("cat a.txt").is_ok());
    assert!(policy.check_command("/bin/echo hello").is_ok());
    assert!(policy.check_command("curl http://example.com").is_err());
}

#[test]
fn empty_command_is_validation() {
    let policy = policy(ExecutionConfig::default());
    let err = policy.check_command("   ").unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert!(!err.is_fatal());
}

#[test]
fn system_paths_never_writable() {
    let policy = policy(ExecutionConfig::default());
    let cwd = Path::new("/work");
    for target in ["/etc/passwd", "/sys/x", "/proc/1/mem", "/dev/sda"] {
        let err = policy.check_write_path(Path::new(target), cwd).unwrap_err();
        assert_eq!(err.kind(), "sandbox");
    }
    assert!(policy.check_write_path(Path::new("/work/a.txt"), cwd).is_ok());
}

#[test]
fn allowed_paths_confine_writes() {
    let policy = policy(ExecutionConfig {
        allowed_paths: vec!["/work/project".into()],
        ..Default::default()
    });
    let cwd = Path::new("/work/project");
    assert!(policy
        .check_write_path(Path::new("src/main.rs"), cwd)
        .is_ok());
    assert!(policy
        .check_write_path(Path::new("/work/project/deep/file"), cwd)
        .is_ok());
    assert!(policy
        .check_write_path(Path::new("/work/elsewhere/file"), cwd)
        .is_err());
    // Lexical traversal out of the allowed root is caught.
    assert!(policy
        .check_write_path(Path::new("../elsewhere/file"), cwd)
        .is_err());
}

#[test]
fn approval_matrix() {
    let always = policy(ExecutionConfig {
        approval: ApprovalPolicy::Always,
        ..Default::default()
    });
    assert!(always.approval_needed(false, false));

    let on_write = policy(ExecutionConfig {
        approval: ApprovalPolicy::OnWrite,
        ..Default::default()
    });
    assert!(on_write.approval_needed(true, false));
    assert!(!on_write.approval_needed(false, false));

    let on_request = policy(ExecutionConfig {
        approval: ApprovalPolicy::OnRequest,
        ..Default::default()
    });
    assert!(on_request.approval_needed(true, true));
    assert!(!on_request.approval_needed(true, false));

    let never = policy(ExecutionConfig {
        approval: ApprovalPolicy::Never,
        ..Default::default()
    });
    assert!(!never.approval_needed(true, true));
    assert!(never.refuses_escalation());
    assert!(!on_request.refuses_escalation());
}

#[test]
fn timeout_cap_coerces() {
    let capped = policy(ExecutionConfig {
        timeout_seconds: Some(10.0),
        ..Default::default()
    });
    assert_eq!(
        capped.cap_timeout(Some(Duration::from_secs(60))),
        Some(Duration::from_secs(10))
    );
    assert_eq!(
        capped.cap_timeout(Some(Duration::from_secs(5))),
        Some(Duration::from_secs(5))
    );
    assert_eq!(capped.cap_timeout(None), Some(Duration::from_secs(10)));

    let uncapped = policy(ExecutionConfig::default());
    assert_eq!(
        uncapped.cap_timeout(Some(Duration::from_secs(60))),
        Some(Duration::from_secs(60))
    );
    assert_eq!(uncapped.cap_timeout(None), None);
}
