use serde_json::json;

use super::*;
use crate::testutil;

async fn apply(harness: &testutil::TestHarness, patch: &str) -> Result<ToolOutput> {
    let invocation = testutil::invocation(
        harness,
        "apply_patch",
        testutil::function_payload(json!({"patch": patch})),
    );
    ApplyPatchHandler.handle(invocation).await
}

#[tokio::test]
async fn add_file_creates_and_records() {
    let harness = testutil::harness();
    let patch = "*** Begin Patch\n*** Add File: fresh.txt\n+hello\n*** End Patch";
    let output = apply(&harness, patch).await.unwrap();
    assert!(output.content_text().contains("A "));

    let path = harness.dir.path().join("fresh.txt");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    let edits = harness.tracker.get_edits_for(&path);
    assert_eq!(edits[0].action, FileAction::Create);
}

#[tokio::test]
async fn add_nested_file_then_undo_removes_parents() {
    let harness = testutil::harness();
    let patch = "*** Begin Patch\n*** Add File: deep/nest/fresh.txt\n+hi\n*** End Patch";
    apply(&harness, patch).await.unwrap();

    let path = harness.dir.path().join("deep/nest/fresh.txt");
    assert!(path.exists());

    harness.tracker.undo().unwrap();
    assert!(!path.exists());
    assert!(!harness.dir.path().join("deep").exists());
}

#[tokio::test]
async fn update_file_applies_chunks() {
    let harness = testutil::harness();
    let path = harness.dir.path().join("main.rs");
    std::fs::write(&path, "fn main() {\n    old();\n}\n").unwrap();

    let patch = concat!(
        "*** Begin Patch\n",
        "*** Update File: main.rs\n",
        "-    old();\n",
        "+    new();\n",
        "*** End Patch",
    );
    apply(&harness, patch).await.unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "fn main() {\n    new();\n}\n"
    );
    let edits = harness.tracker.get_edits_for(&path);
    assert_eq!(edits[0].action, FileAction::Update);
    assert!(edits[0].old_content.is_some());
    assert!(edits[0].new_content.is_some());
}

#[tokio::test]
async fn preimage_conflict_leaves_file_unchanged() {
    let harness = testutil::harness();
    let path = harness.dir.path().join("data.txt");
    std::fs::write(&path, "first\n").unwrap();

    // The file was read while it still said "first".
    harness.tracker.record_read(
        &path,
        "read_file",
        Some(content_hash("first\n")),
    );
    // An external writer races in between.
    std::fs::write(&path, "external\n").unwrap();

    let patch = concat!(
        "*** Begin Patch\n",
        "*** Update File: data.txt\n",
        "-first\n",
        "+second\n",
        "*** End Patch",
    );
    let err = apply(&harness, patch).await.unwrap_err();
    assert_eq!(err.kind(), "conflict");
    assert!(err.to_string().contains("changed since it was last read"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "external\n");
    // The lock was released on the error path.
    assert!(harness.tracker.lock_file(&path).is_ok());
}

#[tokio::test]
async fn missing_context_is_a_conflict() {
    let harness = testutil::harness();
    let path = harness.dir.path().join("data.txt");
    std::fs::write(&path, "actual\n").unwrap();

    let patch = concat!(
        "*** Begin Patch\n",
        "*** Update File: data.txt\n",
        "-imaginary\n",
        "+other\n",
        "*** End Patch",
    );
    let err = apply(&harness, patch).await.unwrap_err();
    assert_eq!(err.kind(), "conflict");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "actual\n");
}

#[tokio::test]
async fn delete_file_records_old_content() {
    let harness = testutil::harness();
    let path = harness.dir.path().join("doomed.txt");
    std::fs::write(&path, "bye\n").unwrap();

    let patch = "*** Begin Patch\n*** Delete File: doomed.txt\n*** End Patch";
    apply(&harness, patch).await.unwrap();
    assert!(!path.exists());

    // Undo restores it.
    harness.tracker.undo().unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "bye\n");
}

#[tokio::test]
async fn move_updates_and_renames() {
    let harness = testutil::harness();
    let from = harness.dir.path().join("old_name.txt");
    std::fs::write(&from, "content\n").unwrap();

    let patch = concat!(
        "*** Begin Patch\n",
        "*** Update File: old_name.txt\n",
        "*** Move to: new_name.txt\n",
        "-content\n",
        "+content v2\n",
        "*** End Patch",
    );
    apply(&harness, patch).await.unwrap();

    let to = harness.dir.path().join("new_name.txt");
    assert!(!from.exists());
    assert_eq!(std::fs::read_to_string(&to).unwrap(), "content v2\n");
}

#[tokio::test]
async fn locked_path_fails_fast() {
    let harness = testutil::harness();
    let path = harness.dir.path().join("busy.txt");
    std::fs::write(&path, "x\n").unwrap();
    harness.tracker.lock_file(&path).unwrap();

    let patch = concat!(
        "*** Begin Patch\n",
        "*** Update File: busy.txt\n",
        "-x\n",
        "+y\n",
        "*** End Patch",
    );
    let err = apply(&harness, patch).await.unwrap_err();
    assert_eq!(err.kind(), "already_locked");
    assert!(err.to_string().contains("already locked"));
}

#[tokio::test]
async fn write_outside_allowed_paths_is_fatal() {
    let allowed = tempfile::tempdir().unwrap();
    let harness = testutil::harness_with(
        cradle_protocol::config::ExecutionConfig {
            allowed_paths: vec![allowed.path().to_path_buf()],
            ..Default::default()
        },
        std::sync::Arc::new(crate::handler::ApproveAll),
    );
    let patch = "*** Begin Patch\n*** Add File: outside.txt\n+x\n*** End Patch";
    let err = apply(&harness, patch).await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.kind(), "sandbox");
}

#[tokio::test]
async fn dry_run_touches_nothing() {
    let harness = testutil::harness();
    let path = harness.dir.path().join("data.txt");
    std::fs::write(&path, "v1\n").unwrap();

    let patch = concat!(
        "*** Begin Patch\n",
        "*** Update File: data.txt\n",
        "-v1\n",
        "+v2\n",
        "*** End Patch",
    );
    let invocation = testutil::invocation(
        &harness,
        "apply_patch",
        testutil::function_payload(json!({"patch": patch, "dry_run": true})),
    );
    let output = ApplyPatchHandler.handle(invocation).await.unwrap();
    assert!(output.content_text().starts_with("Dry run."));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "v1\n");
    assert!(harness.tracker.get_edits_for(&path).is_empty());
}

#[tokio::test]
async fn bad_patch_is_validation() {
    let harness = testutil::harness();
    let err = apply(&harness, "not a patch").await.unwrap_err();
    assert_eq!(err.kind(), "validation");
}
