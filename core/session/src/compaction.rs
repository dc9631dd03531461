//! Compaction policy: keep recent turns, summarize the rest.

use cradle_protocol::CompactionConfig;
use cradle_protocol::MessageKind;
use cradle_protocol::ModelConfig;
use cradle_protocol::ToolLimits;
use tracing::debug;
use tracing::info;

use crate::history::MessageHistory;
use crate::history::MessageRecord;
use crate::meter::TokenMeter;
use crate::summarizer::Summarizer;
use crate::summarizer::summarize_tool_output;

/// Fraction of the usable window treated as a hard ceiling.
const WINDOW_CEILING_RATIO: f64 = 0.95;

/// What one compaction pass did.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionOutcome {
    pub pre_tokens: u64,
    pub post_tokens: u64,
    pub removed_records: usize,
}

/// Run compaction if the history exceeds its budget (or unconditionally with
/// `force`). Returns `None` when nothing needed to change, which makes a
/// second immediate call a no-op.
pub async fn compact_if_needed(
    history: &mut MessageHistory,
    meter: &TokenMeter,
    summarizer: &dyn Summarizer,
    model: &ModelConfig,
    config: &CompactionConfig,
    limits: &ToolLimits,
    force: bool,
    focus: Option<&str>,
) -> Option<CompactionOutcome> {
    enforce_tool_limits(history, meter, limits);

    let window = model.window_tokens().max(1);
    let ceiling = (window as f64 * WINDOW_CEILING_RATIO) as u64;
    let budget = config.target_tokens.min(ceiling).max(1);
    let pre_tokens = history.total_tokens();

    if !force && pre_tokens <= budget {
        return None;
    }

    let keep_turns = config.keep_last_turns as u64;
    let cutoff = history
        .turn_counter()
        .saturating_sub(keep_turns)
        .saturating_add(1)
        .max(1);

    let candidates: Vec<MessageRecord> = history
        .records()
        .iter()
        .filter(|record| {
            matches!(
                record.kind,
                MessageKind::User | MessageKind::Assistant | MessageKind::ToolResult
            ) && record.turn_id < cutoff
                && !record.message.pinned
        })
        .cloned()
        .collect();
    if candidates.is_empty() {
        debug!(pre_tokens, cutoff, "nothing to compact");
        return None;
    }

    let summary = summarizer.summarize(&candidates, focus).await;
    let removed_records = history.apply_compaction(cutoff, &summary);
    let post_tokens = history.total_tokens();
    info!(pre_tokens, post_tokens, removed_records, "history compaction complete");

    Some(CompactionOutcome {
        pre_tokens,
        post_tokens,
        removed_records,
    })
}

/// Replace oversized tool results with a head/tail digest in context.
///
/// Runs on every pass, so results that shrink back under the limits (after
/// an edit to the limits) get their full content restored.
fn enforce_tool_limits(history: &mut MessageHistory, meter: &TokenMeter, limits: &ToolLimits) {
    for index in 0..history.records().len() {
        let (is_tool_result, text) = {
            let record = &history.records()[index];
            (
                record.kind == MessageKind::ToolResult,
                record.text_fragments().join("\n"),
            )
        };
        if !is_tool_result || text.is_empty() {
            continue;
        }

        let tokens = meter.estimate_text(&text);
        let line_count = text.lines().count() as u64;
        let oversized = tokens > limits.max_tool_tokens
            || text.len() as u64 > limits.max_stdout_bytes
            || line_count > limits.max_lines;

        if oversized {
            let digest = summarize_tool_output(&text, limits.max_lines.min(64) as usize);
            history.set_compact_text(index, digest);
        } else {
            history.clear_compact_text(index);
        }
    }
}

#[cfg(test)]
#[path = "compaction.test.rs"]
mod tests;
