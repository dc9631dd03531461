use std::time::Duration;

use super::*;

fn executor() -> ShellExecutor {
    ShellExecutor::new(std::env::temp_dir())
}

#[tokio::test]
async fn captures_stdout_and_exit_code() {
    let result = executor()
        .execute(ExecParams::new("echo tool harness"))
        .await
        .unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "tool harness\n");
    assert!(!result.timed_out);
}

#[tokio::test]
async fn captures_stderr() {
    let result = executor()
        .execute(ExecParams::new("echo oops >&2; exit 3"))
        .await
        .unwrap();
    assert_eq!(result.exit_code, 3);
    assert_eq!(result.stderr, "oops\n");
}

#[tokio::test]
async fn env_overrides_apply() {
    let mut params = ExecParams::new("echo $CRADLE_TEST_VAR");
    params
        .env
        .insert("CRADLE_TEST_VAR".to_string(), "present".to_string());
    let result = executor().execute(params).await.unwrap();
    assert_eq!(result.stdout, "present\n");
}

#[tokio::test]
async fn cwd_applies() {
    let dir = tempfile::tempdir().unwrap();
    let result = executor()
        .execute(ExecParams::new("pwd").with_cwd(dir.path()))
        .await
        .unwrap();
    let printed = result.stdout.trim();
    let canonical = std::fs::canonicalize(dir.path()).unwrap();
    assert_eq!(
        std::fs::canonicalize(printed).unwrap(),
        canonical,
        "pwd should print the requested cwd"
    );
}

#[tokio::test]
async fn timeout_kills_and_flags() {
    let result = executor()
        .execute(
            ExecParams::new("sleep 5; echo done").with_timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap();
    assert!(result.timed_out);
    assert_eq!(result.exit_code, -1);
    assert!(!result.stdout.contains("done"));
    assert!(result.duration < Duration::from_secs(4));
}

#[tokio::test]
async fn partial_output_survives_timeout() {
    let result = executor()
        .execute(
            ExecParams::new("echo early; sleep 5").with_timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap();
    assert!(result.timed_out);
    assert_eq!(result.stdout, "early\n");
}
