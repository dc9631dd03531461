//! Session facade tying history, pins, compaction, and the MCP pool
//! together for the host.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;

use cradle_mcp::McpPool;
use cradle_protocol::Config;
use cradle_protocol::ContentBlock;
use cradle_protocol::Message;
use cradle_protocol::SessionEvent;
use cradle_protocol::ToolResultBlock;
use cradle_tools::TelemetrySink;

use crate::compaction;
use crate::compaction::CompactionOutcome;
use crate::history::MessageHistory;
use crate::meter::TokenMeter;
use crate::pins::PinStore;
use crate::summarizer::RuleBasedSummarizer;
use crate::summarizer::Summarizer;

/// Session-level failures.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Wire-protocol invariant broken (mismatched or duplicated call ids).
    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// One conversation with bounded history.
///
/// Mutated only by the host's message-loop task; tool execution communicates
/// back through values, never by touching the session.
pub struct Session {
    config: Config,
    history: MessageHistory,
    pins: PinStore,
    meter: TokenMeter,
    summarizer: Box<dyn Summarizer>,
    telemetry: Arc<TelemetrySink>,
    mcp_pool: Arc<McpPool>,
    tools_in_flight: u64,
    /// A compaction request that arrived while tools were in flight.
    deferred_compaction: Option<(bool, Option<String>)>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    event_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let meter = TokenMeter::new();
        let mcp_pool = Arc::new(McpPool::new(config.mcp.definitions.clone()));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            history: MessageHistory::new(meter.clone()),
            pins: PinStore::new(),
            meter,
            summarizer: Box::new(RuleBasedSummarizer),
            telemetry: Arc::new(TelemetrySink::new()),
            mcp_pool,
            tools_in_flight: 0,
            deferred_compaction: None,
            event_tx,
            event_rx,
            config,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Box<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    pub fn telemetry(&self) -> Arc<TelemetrySink> {
        self.telemetry.clone()
    }

    pub fn mcp_pool(&self) -> Arc<McpPool> {
        self.mcp_pool.clone()
    }

    pub fn register_system_prompt(&mut self, text: impl Into<String>) {
        self.history.register_system(text);
    }

    /// Begin a turn with the user's input. Returns the turn id.
    pub fn submit_user_turn(&mut self, text: impl Into<String>) -> u64 {
        let turn_id = self.history.register_user(text);
        self.emit(SessionEvent::TaskStarted { turn_id });
        turn_id
    }

    /// Append the model's response and start tracking its tool uses.
    pub fn append_assistant(&mut self, message: Message) -> Result<(), SessionError> {
        let text: Vec<&str> = message
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if !text.is_empty() {
            self.emit(SessionEvent::AssistantMessage {
                text: text.join("\n"),
            });
        }
        self.history.register_assistant(message)
    }

    /// Append one batch of tool results, enforcing the call-id match.
    pub fn append_tool_results(
        &mut self,
        results: Vec<ToolResultBlock>,
    ) -> Result<(), SessionError> {
        self.history.append_tool_results(results)
    }

    pub fn outstanding_tool_uses(&self) -> &[String] {
        self.history.outstanding_tool_uses()
    }

    /// Mark a batch of tool calls as in flight; compaction defers until the
    /// counter drains.
    pub fn begin_tool_batch(&mut self) {
        self.tools_in_flight += 1;
    }

    /// Drain the in-flight counter, running any deferred compaction.
    pub async fn end_tool_batch(&mut self) {
        self.tools_in_flight = self.tools_in_flight.saturating_sub(1);
        if self.tools_in_flight == 0 {
            if let Some((force, focus)) = self.deferred_compaction.take() {
                debug!("running deferred compaction");
                self.compact_if_needed(force, focus.as_deref()).await;
            }
        }
    }

    pub fn tools_in_flight(&self) -> u64 {
        self.tools_in_flight
    }

    /// Compact older history when over budget (or with `force`).
    ///
    /// Deferred while tool calls are in flight; the deferred request runs
    /// when the batch drains.
    pub async fn compact_if_needed(
        &mut self,
        force: bool,
        focus: Option<&str>,
    ) -> Option<CompactionOutcome> {
        if self.tools_in_flight > 0 {
            debug!(in_flight = self.tools_in_flight, "compaction deferred");
            self.deferred_compaction = Some((force, focus.map(String::from)));
            return None;
        }

        let outcome = compaction::compact_if_needed(
            &mut self.history,
            &self.meter,
            self.summarizer.as_ref(),
            &self.config.model,
            &self.config.compaction,
            &self.config.tools.limits,
            force,
            focus,
        )
        .await?;

        self.telemetry.incr("compact_events");
        self.telemetry.incr("summarizer_calls");
        self.emit(SessionEvent::Compaction {
            pre_tokens: outcome.pre_tokens,
            post_tokens: outcome.post_tokens,
        });
        Some(outcome)
    }

    /// The message list for the next model request.
    ///
    /// Auto-compaction may fire here; pinned content within budget rides
    /// along after the system prefix.
    pub async fn snapshot_for_model(&mut self) -> Vec<Message> {
        if self.config.compaction.auto {
            self.compact_if_needed(false, None).await;
        }
        let pins = self
            .pins
            .within_budget(&self.meter, self.config.compaction.pin_budget_tokens);
        self.history.snapshot_for_model(PinStore::render(&pins))
    }

    pub fn add_pin(
        &mut self,
        content: impl Into<String>,
        ttl: Option<std::time::Duration>,
        priority: i32,
    ) -> Result<String, SessionError> {
        self.pins
            .add(content, ttl, priority)
            .map_err(SessionError::Protocol)
    }

    pub fn remove_pin(&mut self, id: &str) -> bool {
        self.pins.remove(id)
    }

    pub fn pin_count(&mut self) -> usize {
        self.pins.clear_expired();
        self.pins.len()
    }

    pub fn total_tokens(&self) -> u64 {
        self.history.total_tokens()
    }

    /// Recover from a fatal tool error: drop unmatched tool uses and report.
    pub fn fail_turn(&mut self, error: impl Into<String>) {
        self.history.clear_pending_tool_uses();
        self.emit(SessionEvent::TaskFailed {
            error: error.into(),
        });
    }

    pub fn complete_turn(&mut self, summary: impl Into<String>) {
        self.emit(SessionEvent::TaskComplete {
            summary: summary.into(),
        });
    }

    pub fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Next queued session event, if any.
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Await the next session event.
    pub async fn await_event(&mut self) -> Option<SessionEvent> {
        self.event_rx.recv().await
    }

    /// Shut down pooled MCP clients gracefully.
    pub async fn close(&self) {
        info!("closing session");
        self.mcp_pool.close_all().await;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("turns", &self.history.turn_counter())
            .field("tokens", &self.history.total_tokens())
            .field("tools_in_flight", &self.tools_in_flight)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "session.test.rs"]
mod tests;
