//! Deterministic head+tail truncation of tool output.
//!
//! Output shown to the model is bounded by both a byte and a line budget;
//! oversized content keeps its first and last lines around an elision marker.
//! All cuts land on UTF-8 scalar boundaries and never introduce U+FFFD. The
//! untruncated form stays available to the transcript.

use std::time::Duration;

use serde_json::json;

/// Byte budget for model-visible output.
pub const MAX_BYTES: usize = 10 * 1024;
/// Line budget for model-visible output.
pub const MAX_LINES: usize = 256;
/// Lines kept from the head on truncation.
pub const HEAD_LINES: usize = 128;
/// Lines kept from the tail on truncation.
pub const TAIL_LINES: usize = 128;
/// Byte budget for the head portion.
pub const HEAD_BYTES: usize = 5 * 1024;

/// Structured summary of one command execution.
#[derive(Debug, Clone)]
pub struct ExecSummary {
    pub exit_code: i32,
    pub duration: Duration,
    pub output: String,
    pub timed_out: bool,
}

/// A formatted result plus its authoritative truncation flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Formatted {
    pub content: String,
    pub truncated: bool,
}

/// Truncate free-form text to the head+tail window when it exceeds the
/// budgets; within-budget text passes through byte-identical.
pub fn truncate_head_tail(content: &str) -> Formatted {
    let lines = split_keepends(content);
    let total = lines.len();
    if within_limits(content, total) {
        return Formatted {
            content: content.to_string(),
            truncated: false,
        };
    }
    Formatted {
        content: head_tail(&lines, total),
        truncated: true,
    }
}

/// Format execution output for model consumption: head+tail truncation plus
/// the structured envelope carrying exit code, duration, and flags.
pub fn format_exec_output(summary: &ExecSummary) -> Formatted {
    let mut content = summary.output.clone();
    if summary.timed_out {
        let mut prefixed = format!(
            "command timed out after {:.1}s\n{content}",
            summary.duration.as_secs_f64()
        );
        while prefixed.ends_with('\n') {
            prefixed.pop();
        }
        prefixed.push('\n');
        content = prefixed;
    }

    let lines = split_keepends(&content);
    let total = lines.len();

    if within_limits(&content, total) {
        return Formatted {
            content: envelope(summary, &content, false),
            truncated: false,
        };
    }

    let truncated = head_tail(&lines, total);
    let body = format!("Total output lines: {total}\n\n{truncated}");
    Formatted {
        content: envelope(summary, &body, true),
        truncated: true,
    }
}

fn within_limits(content: &str, total_lines: usize) -> bool {
    content.len() <= MAX_BYTES && total_lines <= MAX_LINES
}

fn head_tail(lines: &[&str], total: usize) -> String {
    let head_count = HEAD_LINES.min(total);
    let head_text: String = lines[..head_count].concat();
    let tail_text: String = if total > HEAD_LINES {
        lines[total.saturating_sub(TAIL_LINES)..].concat()
    } else {
        String::new()
    };
    let tail_count = if total > HEAD_LINES {
        TAIL_LINES.min(total)
    } else {
        0
    };

    let omitted = total.saturating_sub(head_count + tail_count);
    let marker = format!("\n[... omitted {omitted} of {total} lines ...]\n\n");

    let mut result = trim_head_bytes(&head_text, HEAD_BYTES).to_string();
    result.push_str(&marker);

    let remaining = MAX_BYTES.saturating_sub(result.len());
    if remaining > 0 && !tail_text.is_empty() {
        result.push_str(trim_tail_bytes(&tail_text, remaining));
    }

    if result.len() > MAX_BYTES {
        let cut = floor_char_boundary(&result, MAX_BYTES);
        result.truncate(cut);
    }
    result
}

/// Largest prefix of `text` within `limit` bytes, preferring to end just
/// after a newline.
fn trim_head_bytes(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let cut = floor_char_boundary(text, limit);
    let prefix = &text[..cut];
    match prefix.rfind('\n') {
        Some(newline) => &prefix[..=newline],
        None => prefix,
    }
}

/// Largest suffix of `text` within `limit` bytes, preferring to start just
/// after a newline.
fn trim_tail_bytes(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let start = ceil_char_boundary(text, text.len() - limit);
    let suffix = &text[start..];
    match suffix.find('\n') {
        Some(newline) if newline + 1 < suffix.len() => &suffix[newline + 1..],
        _ => suffix,
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Split preserving line terminators, like Python's `splitlines(keepends)`.
fn split_keepends(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            out.push(&text[start..=i]);
            start = i + 1;
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn envelope(summary: &ExecSummary, content: &str, truncated: bool) -> String {
    let duration = (summary.duration.as_secs_f64() * 10.0).round() / 10.0;
    json!({
        "output": content,
        "metadata": {
            "exit_code": summary.exit_code,
            "duration_seconds": duration,
            "timed_out": summary.timed_out,
            "truncated": truncated,
        },
    })
    .to_string()
}

#[cfg(test)]
#[path = "format.test.rs"]
mod tests;
