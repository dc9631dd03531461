use std::time::Duration;

use serde_json::Value;

use super::*;

fn summary(output: &str) -> ExecSummary {
    ExecSummary {
        exit_code: 0,
        duration: Duration::from_millis(123),
        output: output.to_string(),
        timed_out: false,
    }
}

#[test]
fn small_output_passes_through() {
    let formatted = format_exec_output(&summary("hello\n"));
    assert!(!formatted.truncated);
    let value: Value = serde_json::from_str(&formatted.content).unwrap();
    assert_eq!(value["output"], "hello\n");
    assert_eq!(value["metadata"]["exit_code"], 0);
    assert_eq!(value["metadata"]["duration_seconds"], 0.1);
    assert_eq!(value["metadata"]["timed_out"], false);
    assert_eq!(value["metadata"]["truncated"], false);
}

#[test]
fn exactly_at_limits_is_not_truncated() {
    // MAX_LINES one-byte lines stays within both budgets.
    let content = "x\n".repeat(MAX_LINES);
    assert!(content.len() <= MAX_BYTES);
    let formatted = truncate_head_tail(&content);
    assert!(!formatted.truncated);
    assert_eq!(formatted.content, content);
}

#[test]
fn exactly_max_bytes_is_not_truncated() {
    let content = "z".repeat(MAX_BYTES);
    let formatted = truncate_head_tail(&content);
    assert!(!formatted.truncated);
    assert_eq!(formatted.content, content);
}

#[test]
fn one_byte_over_with_multibyte_tail_stays_on_boundary() {
    // One byte over the budget, with a 4-byte scalar straddling the cut.
    let mut content = "z".repeat(MAX_BYTES - 3);
    content.push('\u{1F980}');
    assert_eq!(content.len(), MAX_BYTES + 1);
    let formatted = truncate_head_tail(&content);
    assert!(formatted.truncated);
    assert!(formatted.content.len() <= MAX_BYTES);
    assert!(!formatted.content.contains('\u{FFFD}'));
}

#[test]
fn one_line_over_truncates() {
    let content = "x\n".repeat(MAX_LINES + 1);
    let formatted = truncate_head_tail(&content);
    assert!(formatted.truncated);
    assert!(formatted.content.contains("[... omitted 1 of 257 lines ...]"));
}

#[test]
fn byte_budget_is_respected() {
    let content = "y".repeat(MAX_BYTES * 3);
    let formatted = truncate_head_tail(&content);
    assert!(formatted.truncated);
    assert!(formatted.content.len() <= MAX_BYTES);
    // The marker appears exactly once.
    assert_eq!(formatted.content.matches("[... omitted").count(), 1);
}

#[test]
fn multibyte_boundary_is_never_split() {
    // 4-byte scalars; no newlines, so cuts are purely byte-driven.
    let content = "\u{1F980}".repeat(MAX_BYTES);
    let formatted = truncate_head_tail(&content);
    assert!(formatted.truncated);
    assert!(formatted.content.len() <= MAX_BYTES);
    assert!(!formatted.content.contains('\u{FFFD}'));
    // Every crab survived whole.
    for ch in formatted.content.chars() {
        assert!(ch == '\u{1F980}' || ch.is_ascii());
    }
}

#[test]
fn head_and_tail_both_present() {
    let mut content = String::new();
    for i in 0..1000 {
        content.push_str(&format!("line-{i:04}\n"));
    }
    let formatted = truncate_head_tail(&content);
    assert!(formatted.truncated);
    assert!(formatted.content.starts_with("line-0000\n"));
    assert!(formatted.content.contains("line-0999"));
    assert!(formatted.content.contains("[... omitted 744 of 1000 lines ...]"));
    assert!(formatted.content.len() <= MAX_BYTES);
}

#[test]
fn formatter_is_deterministic() {
    let content = "z".repeat(MAX_BYTES * 2);
    let first = format_exec_output(&summary(&content));
    let second = format_exec_output(&summary(&content));
    assert_eq!(first, second);
}

#[test]
fn timed_out_prefixes_message() {
    let formatted = format_exec_output(&ExecSummary {
        exit_code: -1,
        duration: Duration::from_secs_f64(2.34),
        output: "partial\n".to_string(),
        timed_out: true,
    });
    let value: Value = serde_json::from_str(&formatted.content).unwrap();
    let output = value["output"].as_str().unwrap();
    assert!(output.starts_with("command timed out after 2.3s"));
    assert!(output.contains("partial"));
    assert_eq!(value["metadata"]["timed_out"], true);
}

#[test]
fn truncated_report_includes_total_lines() {
    let content = "a\n".repeat(10_000);
    let formatted = format_exec_output(&summary(&content));
    assert!(formatted.truncated);
    let value: Value = serde_json::from_str(&formatted.content).unwrap();
    assert!(value["output"]
        .as_str()
        .unwrap()
        .starts_with("Total output lines: 10000"));
    assert_eq!(value["metadata"]["truncated"], true);
}
