//! Token estimation.
//!
//! When no native tokenizer is available the meter falls back to a
//! bytes-per-token heuristic. The heuristic may overestimate non-ASCII
//! content, which only compacts earlier than strictly necessary.

use cradle_protocol::ContentBlock;
use cradle_protocol::Message;

/// Default heuristic ratio: ~4 bytes per token.
const DEFAULT_BYTES_PER_TOKEN: usize = 4;

/// Per-message framing overhead (role and separators).
const MESSAGE_OVERHEAD: u64 = 4;

/// Per-structured-block overhead (ids and names).
const BLOCK_OVERHEAD: u64 = 6;

/// Estimates token consumption for text and messages.
#[derive(Debug, Clone)]
pub struct TokenMeter {
    bytes_per_token: usize,
}

impl Default for TokenMeter {
    fn default() -> Self {
        Self {
            bytes_per_token: DEFAULT_BYTES_PER_TOKEN,
        }
    }
}

impl TokenMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes_per_token(bytes_per_token: usize) -> Self {
        Self {
            bytes_per_token: bytes_per_token.max(1),
        }
    }

    pub fn estimate_text(&self, text: &str) -> u64 {
        if text.is_empty() {
            return 0;
        }
        text.len().div_ceil(self.bytes_per_token).max(1) as u64
    }

    pub fn estimate_message(&self, message: &Message) -> u64 {
        let mut total = MESSAGE_OVERHEAD + message.role.as_str().len() as u64;
        for block in &message.content {
            total += match block {
                ContentBlock::Text { text } => self.estimate_text(text),
                ContentBlock::ToolUse { input, .. } => {
                    self.estimate_text(&input.to_string()) + BLOCK_OVERHEAD
                }
                ContentBlock::ToolResult { content, .. } => {
                    self.estimate_text(content) + BLOCK_OVERHEAD
                }
            };
        }
        total
    }

    pub fn estimate_messages<'a>(&self, messages: impl IntoIterator<Item = &'a Message>) -> u64 {
        messages
            .into_iter()
            .map(|message| self.estimate_message(message))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use cradle_protocol::Role;

    use super::*;

    #[test]
    fn text_estimate_rounds_up() {
        let meter = TokenMeter::new();
        assert_eq!(meter.estimate_text(""), 0);
        assert_eq!(meter.estimate_text("abc"), 1);
        assert_eq!(meter.estimate_text("abcd"), 1);
        assert_eq!(meter.estimate_text("abcde"), 2);
    }

    #[test]
    fn message_estimate_includes_overhead() {
        let meter = TokenMeter::new();
        let message = Message::text(Role::User, "abcdefgh");
        // 2 tokens of text + 4 overhead + len("user").
        assert_eq!(meter.estimate_message(&message), 2 + 4 + 4);
    }

    #[test]
    fn non_ascii_overestimates_safely() {
        let meter = TokenMeter::new();
        // 3 bytes per char; the heuristic counts bytes, not chars.
        let text = "\u{3042}".repeat(100);
        assert!(meter.estimate_text(&text) >= 75);
    }
}
