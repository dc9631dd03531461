//! Ordered message history with compaction metadata.

use cradle_protocol::ContentBlock;
use cradle_protocol::Message;
use cradle_protocol::MessageKind;
use cradle_protocol::Role;
use cradle_protocol::ToolResultBlock;
use cradle_tools::tracker::content_hash;
use tracing::debug;

use crate::meter::TokenMeter;
use crate::session::SessionError;

/// Marker prefix of the synthetic summary message.
pub const SUMMARY_PREFIX: &str = "Previous conversation summary:\n";

/// One history entry: the wire message plus bookkeeping for compaction.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub message: Message,
    pub kind: MessageKind,
    pub turn_id: u64,
    pub tokens: u64,
    /// Digest standing in for oversized tool output in the model context.
    /// The untruncated message stays available for the transcript.
    compact_text: Option<String>,
    compact_tokens: Option<u64>,
    /// Content hash for tool-result dedup.
    pub tool_hash: Option<String>,
}

impl MessageRecord {
    pub fn effective_tokens(&self) -> u64 {
        self.compact_tokens.unwrap_or(self.tokens)
    }

    /// The message as sent to the model, with compacted tool output
    /// substituted in.
    pub fn effective_message(&self) -> Message {
        match &self.compact_text {
            None => self.message.clone(),
            Some(digest) => {
                let content = self
                    .message
                    .content
                    .iter()
                    .map(|block| match block {
                        ContentBlock::ToolResult {
                            tool_use_id,
                            is_error,
                            ..
                        } => ContentBlock::ToolResult {
                            tool_use_id: tool_use_id.clone(),
                            content: digest.clone(),
                            is_error: *is_error,
                        },
                        other => other.clone(),
                    })
                    .collect();
                Message {
                    role: self.message.role,
                    content,
                    tokens: self.compact_tokens.unwrap_or(self.message.tokens),
                    pinned: self.message.pinned,
                }
            }
        }
    }

    pub fn text_fragments(&self) -> Vec<&str> {
        self.message
            .content
            .iter()
            .filter_map(ContentBlock::text_fragment)
            .collect()
    }

    pub fn is_compacted(&self) -> bool {
        self.compact_text.is_some()
    }
}

/// Append-mostly message store. Mutated only by the host's message-loop
/// task; the scheduler returns results by value.
#[derive(Debug)]
pub struct MessageHistory {
    meter: TokenMeter,
    records: Vec<MessageRecord>,
    turn_counter: u64,
    /// Tool-use ids awaiting their matching result.
    pending_tool_uses: Vec<String>,
}

impl MessageHistory {
    pub fn new(meter: TokenMeter) -> Self {
        Self {
            meter,
            records: Vec::new(),
            turn_counter: 0,
            pending_tool_uses: Vec::new(),
        }
    }

    pub fn turn_counter(&self) -> u64 {
        self.turn_counter
    }

    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    pub fn total_tokens(&self) -> u64 {
        self.records
            .iter()
            .map(MessageRecord::effective_tokens)
            .sum()
    }

    pub fn outstanding_tool_uses(&self) -> &[String] {
        &self.pending_tool_uses
    }

    pub fn register_system(&mut self, text: impl Into<String>) {
        let message = Message::text(Role::System, text);
        let record = self.build_record(message, MessageKind::System, 0);
        // System messages stay at the front, in registration order.
        let insert_at = self
            .records
            .iter()
            .take_while(|record| record.kind == MessageKind::System)
            .count();
        self.records.insert(insert_at, record);
    }

    /// Start a new turn with the user's input. Returns the turn id.
    pub fn register_user(&mut self, text: impl Into<String>) -> u64 {
        self.turn_counter += 1;
        let message = Message::text(Role::User, text);
        let record = self.build_record(message, MessageKind::User, self.turn_counter);
        self.records.push(record);
        self.turn_counter
    }

    /// Append an assistant message and begin tracking its tool-use ids.
    ///
    /// Fails when tool uses from the previous assistant message are still
    /// unmatched: every `tool_use` must be answered before the next
    /// assistant message enters history.
    pub fn register_assistant(&mut self, message: Message) -> Result<(), SessionError> {
        if message.role != Role::Assistant {
            return Err(SessionError::Protocol(
                "register_assistant requires an assistant message".to_string(),
            ));
        }
        if !self.pending_tool_uses.is_empty() {
            return Err(SessionError::Protocol(format!(
                "unmatched tool_use ids from previous message: {}",
                self.pending_tool_uses.join(", ")
            )));
        }
        self.pending_tool_uses = message
            .tool_use_ids()
            .into_iter()
            .map(String::from)
            .collect();
        let record = self.build_record(message, MessageKind::Assistant, self.turn_counter);
        self.records.push(record);
        Ok(())
    }

    /// Append tool results as one user message, enforcing the one-to-one
    /// match with outstanding tool uses.
    pub fn append_tool_results(
        &mut self,
        blocks: Vec<ToolResultBlock>,
    ) -> Result<(), SessionError> {
        if blocks.is_empty() {
            return Ok(());
        }

        let mut seen: Vec<&str> = Vec::with_capacity(blocks.len());
        for block in &blocks {
            if seen.contains(&block.tool_use_id.as_str()) {
                return Err(SessionError::Protocol(format!(
                    "duplicate tool_result for call id {}",
                    block.tool_use_id
                )));
            }
            if !self
                .pending_tool_uses
                .iter()
                .any(|id| id == &block.tool_use_id)
            {
                return Err(SessionError::Protocol(format!(
                    "tool_result for unknown call id {}",
                    block.tool_use_id
                )));
            }
            seen.push(&block.tool_use_id);
        }
        self.pending_tool_uses
            .retain(|id| !seen.contains(&id.as_str()));

        let hash_input: String = blocks
            .iter()
            .map(|block| block.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let content = blocks
            .into_iter()
            .map(|block| ContentBlock::ToolResult {
                tool_use_id: block.tool_use_id,
                content: block.content,
                is_error: block.is_error,
            })
            .collect();

        let message = Message::new(Role::User, content);
        let mut record = self.build_record(message, MessageKind::ToolResult, self.turn_counter);
        record.tool_hash = Some(content_hash(&hash_input));
        self.records.push(record);
        Ok(())
    }

    /// Whether an identical tool-result payload already exists in history.
    pub fn has_tool_hash(&self, content: &str) -> bool {
        let digest = content_hash(content);
        self.records
            .iter()
            .any(|record| record.tool_hash.as_deref() == Some(digest.as_str()))
    }

    /// Mark a record pinned so it survives compaction.
    pub fn pin_record(&mut self, index: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.message.pinned = true;
        }
    }

    /// Discard unmatched tool uses after a fatal abort.
    pub fn clear_pending_tool_uses(&mut self) {
        self.pending_tool_uses.clear();
    }

    /// Remove every record of the current turn (fatal abort recovery).
    pub fn rollback_current_turn(&mut self) {
        if self.turn_counter == 0 {
            return;
        }
        let turn_id = self.turn_counter;
        self.records
            .retain(|record| record.kind == MessageKind::System || record.turn_id != turn_id);
        self.turn_counter -= 1;
        self.pending_tool_uses.clear();
    }

    /// Replace all compactable records older than `cutoff_turn` with one
    /// synthetic summary message positioned after the system prefix.
    ///
    /// System messages, pinned messages, and existing summary blocks are
    /// preserved verbatim; the new summary is appended after them.
    pub fn apply_compaction(&mut self, cutoff_turn: u64, summary: &str) -> usize {
        let before = self.records.len();
        self.records.retain(|record| {
            matches!(record.kind, MessageKind::System | MessageKind::Summary)
                || record.message.pinned
                || record.turn_id >= cutoff_turn
        });
        let removed = before - self.records.len();

        let text = format!("{SUMMARY_PREFIX}{summary}");
        let message = Message::text(Role::User, text);
        let record =
            self.build_record(message, MessageKind::Summary, cutoff_turn.saturating_sub(1));

        // Insert after the system prefix and any earlier summaries.
        let insert_at = self
            .records
            .iter()
            .take_while(|record| {
                matches!(record.kind, MessageKind::System | MessageKind::Summary)
            })
            .count();
        self.records.insert(insert_at, record);
        debug!(removed, cutoff_turn, "history compacted");
        removed
    }

    /// The message list to send to the model, oldest first.
    ///
    /// `pin_block` is inserted as one user message after the system prefix
    /// so pinned content rides along regardless of compaction.
    pub fn snapshot_for_model(&self, pin_block: Option<String>) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.records.len() + 1);
        let system_count = self
            .records
            .iter()
            .take_while(|record| record.kind == MessageKind::System)
            .count();
        for record in &self.records[..system_count] {
            out.push(record.effective_message());
        }
        if let Some(block) = pin_block {
            out.push(Message::text(Role::User, block));
        }
        for record in &self.records[system_count..] {
            out.push(record.effective_message());
        }
        out
    }

    /// Substitute a digest for a record's tool output in the model context.
    pub(crate) fn set_compact_text(&mut self, index: usize, digest: String) {
        let tokens = self.meter.estimate_text(&digest);
        if let Some(record) = self.records.get_mut(index) {
            record.compact_text = Some(digest);
            record.compact_tokens = Some(tokens + 8);
        }
    }

    pub(crate) fn clear_compact_text(&mut self, index: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.compact_text = None;
            record.compact_tokens = None;
        }
    }

    fn build_record(&self, mut message: Message, kind: MessageKind, turn_id: u64) -> MessageRecord {
        let tokens = self.meter.estimate_message(&message);
        message.tokens = tokens;
        MessageRecord {
            message,
            kind,
            turn_id,
            tokens,
            compact_text: None,
            compact_tokens: None,
            tool_hash: None,
        }
    }
}

#[cfg(test)]
#[path = "history.test.rs"]
mod tests;
