//! Conversation summarization for compaction.
//!
//! The session calls an external summarizer through the [`Summarizer`]
//! trait; hosts typically plug in an LLM-backed implementation. The shipped
//! [`RuleBasedSummarizer`] is extractive and zero-cost: it buckets lines by
//! keyword into sections and falls back to a deduplicated digest.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::history::MessageRecord;

/// Sections recognized by the rule-based summarizer, with their trigger
/// keywords.
const KEYWORD_SECTIONS: &[(&str, &[&str])] = &[
    ("Goals", &["goal", "objective", "aim"]),
    ("Decisions", &["decide", "decision", "chose", "selected"]),
    (
        "Constraints",
        &["constraint", "must", "require", "limit", "blocked"],
    ),
    ("Open TODOs", &["todo", "follow up", "pending", "next step"]),
    ("APIs", &["api", "endpoint", "request", "http"]),
];

/// Samples kept per section.
const SECTION_SAMPLE_LIMIT: usize = 5;

/// Lines kept by the freeform fallback.
const FALLBACK_LINE_LIMIT: usize = 8;

/// Produces the summary text that replaces older history.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, records: &[MessageRecord], focus: Option<&str>) -> String;
}

/// Extractive summarizer: no model call, deterministic output.
#[derive(Debug, Default)]
pub struct RuleBasedSummarizer;

#[async_trait]
impl Summarizer for RuleBasedSummarizer {
    async fn summarize(&self, records: &[MessageRecord], focus: Option<&str>) -> String {
        let mut sections: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut files: Vec<String> = Vec::new();
        let mut fallback: Vec<String> = Vec::new();

        for record in records {
            for fragment in record.text_fragments() {
                for line in fragment.lines() {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let lower = line.to_lowercase();
                    let mut matched = false;

                    for (title, keywords) in KEYWORD_SECTIONS.iter().copied() {
                        if keywords.iter().any(|keyword| lower.contains(keyword)) {
                            if seen.insert(format!("{title}:{lower}")) {
                                sections.entry(title).or_default().push(line.to_string());
                            }
                            matched = true;
                            break;
                        }
                    }
                    for token in line.split_whitespace() {
                        if looks_like_path(token) && seen.insert(format!("file:{token}")) {
                            files.push(token.trim_matches(&[',', ';', ')', '('][..]).to_string());
                            matched = true;
                        }
                    }
                    if !matched {
                        fallback.push(line.to_string());
                    }
                }
            }
        }

        let mut parts: Vec<String> = Vec::new();
        if let Some(focus) = focus {
            parts.push(format!("Focus: {focus}"));
        }

        if sections.is_empty() && files.is_empty() {
            parts.push(summarize_freeform(&fallback));
            return parts.join("\n");
        }

        for (title, _) in KEYWORD_SECTIONS.iter().copied() {
            let Some(items) = sections.get(title) else {
                continue;
            };
            parts.push(format!("{title}:"));
            for item in items.iter().take(SECTION_SAMPLE_LIMIT) {
                parts.push(format!("- {item}"));
            }
        }
        if !files.is_empty() {
            parts.push("Files:".to_string());
            for file in files.iter().take(SECTION_SAMPLE_LIMIT) {
                parts.push(format!("- {file}"));
            }
        }
        parts.join("\n")
    }
}

/// Head+tail digest of oversized tool output kept in context.
pub fn summarize_tool_output(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect();
    if lines.len() <= max_lines {
        return lines.join("\n");
    }
    let keep = (max_lines / 2).max(1);
    let mut out: Vec<&str> = Vec::with_capacity(max_lines + 2);
    out.extend(&lines[..keep]);
    out.push("...");
    out.push("(truncated)");
    out.extend(&lines[lines.len() - keep..]);
    out.join("\n")
}

fn summarize_freeform(lines: &[String]) -> String {
    if lines.is_empty() {
        return "No major updates; older conversation compacted.".to_string();
    }
    let mut seen = BTreeSet::new();
    let mut kept = Vec::new();
    for line in lines {
        if seen.insert(line.to_lowercase()) {
            kept.push(format!("- {line}"));
            if kept.len() >= FALLBACK_LINE_LIMIT {
                break;
            }
        }
    }
    format!("Older conversation summary:\n{}", kept.join("\n"))
}

/// Heuristic for filename-shaped tokens.
fn looks_like_path(token: &str) -> bool {
    let token = token.trim_matches(&[',', ';', ')', '(', '"', '\''][..]);
    if token.len() < 3 || token.starts_with("http") {
        return false;
    }
    let has_extension = token
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| {
            !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });
    has_extension && token.chars().all(|c| c.is_ascii_graphic())
}

#[cfg(test)]
#[path = "summarizer.test.rs"]
mod tests;
