use serde_json::json;

use super::*;
use crate::testutil;

async fn read(harness: &testutil::TestHarness, args: serde_json::Value) -> Result<ToolOutput> {
    let invocation = testutil::invocation(harness, "read_file", testutil::function_payload(args));
    ReadFileHandler.handle(invocation).await
}

fn text_of(output: &ToolOutput) -> &str {
    match output {
        ToolOutput::Function { content, .. } => content,
        other => panic!("expected function output, got {other:?}"),
    }
}

#[tokio::test]
async fn reads_whole_file() {
    let harness = testutil::harness();
    std::fs::write(harness.dir.path().join("notes.txt"), "alpha\nbeta\n").unwrap();

    let output = read(&harness, json!({"path": "notes.txt"})).await.unwrap();
    assert_eq!(text_of(&output), "alpha\nbeta\n");
    assert!(!output.is_truncated());
}

#[tokio::test]
async fn records_read_with_hash() {
    let harness = testutil::harness();
    let path = harness.dir.path().join("notes.txt");
    std::fs::write(&path, "alpha\n").unwrap();

    read(&harness, json!({"path": "notes.txt"})).await.unwrap();

    let edits = harness.tracker.get_edits_for(&path);
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].action, crate::tracker::FileAction::Read);
    assert_eq!(
        edits[0].old_hash.as_deref(),
        Some(content_hash("alpha\n").as_str())
    );
}

#[tokio::test]
async fn line_window() {
    let harness = testutil::harness();
    std::fs::write(
        harness.dir.path().join("lines.txt"),
        "one\ntwo\nthree\nfour\n",
    )
    .unwrap();

    let output = read(&harness, json!({"path": "lines.txt", "offset": 2, "limit": 2}))
        .await
        .unwrap();
    assert_eq!(text_of(&output), "two\nthree\n");

    let tail = read(&harness, json!({"path": "lines.txt", "offset": 3}))
        .await
        .unwrap();
    assert_eq!(text_of(&tail), "three\nfour\n");
}

#[tokio::test]
async fn zero_offset_rejected() {
    let harness = testutil::harness();
    let err = read(&harness, json!({"path": "x", "offset": 0}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let harness = testutil::harness();
    let err = read(&harness, json!({"path": "ghost.txt"})).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn oversized_file_is_truncated() {
    let harness = testutil::harness();
    let big: String = (0..5_000).map(|i| format!("line-{i}\n")).collect();
    std::fs::write(harness.dir.path().join("big.txt"), &big).unwrap();

    let output = read(&harness, json!({"path": "big.txt"})).await.unwrap();
    assert!(output.is_truncated());
    let text = text_of(&output);
    assert!(text.len() <= crate::format::MAX_BYTES);
    assert!(text.contains("[... omitted"));
}

#[tokio::test]
async fn unknown_fields_rejected() {
    let harness = testutil::harness();
    let err = read(&harness, json!({"path": "x", "bogus": 1}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
}
