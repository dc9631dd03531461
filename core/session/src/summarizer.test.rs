use super::*;
use crate::history::MessageHistory;
use crate::meter::TokenMeter;

fn records_from(texts: &[&str]) -> Vec<MessageRecord> {
    let mut history = MessageHistory::new(TokenMeter::new());
    for text in texts {
        history.register_user(*text);
    }
    history.records().to_vec()
}

#[tokio::test]
async fn buckets_lines_by_keyword() {
    let records = records_from(&[
        "The goal is to ship the parser",
        "We decided to use tokio",
        "Must not exceed 10KB of output",
        "TODO: wire up the telemetry sink",
    ]);
    let summary = RuleBasedSummarizer.summarize(&records, None).await;
    assert!(summary.contains("Goals:"));
    assert!(summary.contains("- The goal is to ship the parser"));
    assert!(summary.contains("Decisions:"));
    assert!(summary.contains("Constraints:"));
    assert!(summary.contains("Open TODOs:"));
}

#[tokio::test]
async fn collects_file_names() {
    let records = records_from(&["edited src/main.rs and docs/design.md today"]);
    let summary = RuleBasedSummarizer.summarize(&records, None).await;
    assert!(summary.contains("Files:"));
    assert!(summary.contains("src/main.rs"));
    assert!(summary.contains("docs/design.md"));
}

#[tokio::test]
async fn focus_is_prepended() {
    let records = records_from(&["the goal is performance"]);
    let summary = RuleBasedSummarizer
        .summarize(&records, Some("compaction behavior"))
        .await;
    assert!(summary.starts_with("Focus: compaction behavior"));
}

#[tokio::test]
async fn freeform_fallback_dedupes() {
    let records = records_from(&["just chatting", "just chatting", "another line"]);
    let summary = RuleBasedSummarizer.summarize(&records, None).await;
    assert!(summary.starts_with("Older conversation summary:"));
    assert_eq!(summary.matches("just chatting").count(), 1);
}

#[tokio::test]
async fn empty_history_has_default_text() {
    let summary = RuleBasedSummarizer.summarize(&[], None).await;
    assert!(summary.contains("older conversation compacted"));
}

#[test]
fn tool_output_digest_keeps_head_and_tail() {
    let text = (0..100)
        .map(|i| format!("line {i}"))
        .collect::<Vec<_>>()
        .join("\n");
    let digest = summarize_tool_output(&text, 10);
    assert!(digest.contains("line 0"));
    assert!(digest.contains("line 99"));
    assert!(digest.contains("(truncated)"));
    assert!(digest.lines().count() <= 12);

    let short = summarize_tool_output("a\nb", 10);
    assert_eq!(short, "a\nb");
}

#[test]
fn path_heuristic() {
    assert!(looks_like_path("src/main.rs"));
    assert!(looks_like_path("design.md"));
    assert!(!looks_like_path("hi"));
    assert!(!looks_like_path("https://example.com/x.html"));
    assert!(!looks_like_path("sentence."));
}
