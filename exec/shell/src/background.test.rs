use std::collections::BTreeMap;
use std::time::Duration;

use super::*;

#[tokio::test]
async fn spawn_writes_sidecar_logs() {
    let dir = tempfile::tempdir().unwrap();
    let registry = BackgroundRegistry::new();
    let job = registry
        .spawn(
            "echo to-the-log",
            "/bin/sh",
            dir.path(),
            &BTreeMap::new(),
            &dir.path().join("run_logs"),
        )
        .unwrap();

    assert!(job.pid > 0);
    assert!(job.describe().contains(&job.job_id));

    // Give the detached process a moment to finish writing.
    for _ in 0..50 {
        let content = std::fs::read_to_string(&job.stdout_path).unwrap_or_default();
        if content.contains("to-the-log") {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("stdout log never received output");
}

#[tokio::test]
async fn kill_removes_job() {
    let dir = tempfile::tempdir().unwrap();
    let registry = BackgroundRegistry::new();
    let job = registry
        .spawn(
            "sleep 30",
            "/bin/sh",
            dir.path(),
            &BTreeMap::new(),
            &dir.path().join("run_logs"),
        )
        .unwrap();

    assert!(registry.active_jobs().contains(&job.job_id));
    assert!(registry.kill(&job.job_id));
    assert!(!registry.kill(&job.job_id));
    assert!(!registry.active_jobs().contains(&job.job_id));
}

#[tokio::test]
async fn kill_all_clears_registry() {
    let dir = tempfile::tempdir().unwrap();
    let registry = BackgroundRegistry::new();
    for _ in 0..2 {
        registry
            .spawn(
                "sleep 30",
                "/bin/sh",
                dir.path(),
                &BTreeMap::new(),
                &dir.path().join("run_logs"),
            )
            .unwrap();
    }
    assert_eq!(registry.active_jobs().len(), 2);
    registry.kill_all();
    assert!(registry.active_jobs().is_empty());
}
