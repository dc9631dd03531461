//! Headless turn loop: model output in, tool results out.

use std::collections::VecDeque;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as AnyhowContext;
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;
use tracing::warn;

use cradle_protocol::Config;
use cradle_protocol::ContentBlock;
use cradle_protocol::Message;
use cradle_protocol::Role;
use cradle_protocol::SessionEvent;
use cradle_session::Session;
use cradle_tools::ExecutionPolicy;
use cradle_tools::InterruptManager;
use cradle_tools::TelemetrySink;
use cradle_tools::ToolError;
use cradle_tools::ToolRegistry;
use cradle_tools::ToolRouter;
use cradle_tools::TurnContext;
use cradle_tools::TurnDiffTracker;
use cradle_tools::TurnScheduler;
use cradle_tools::handler::DenyAll;
use cradle_tools::handlers;
use cradle_tools::registry::ToolRegistryBuilder;

use crate::args::Args;
use crate::artifacts::AuditLog;
use crate::artifacts::ChangesLog;
use crate::artifacts::Transcript;
use crate::exit_codes;

/// Source of assistant messages.
///
/// The HTTP model client lives outside the core; hosts implement this trait
/// to feed responses in. The bundled [`ScriptedModelSource`] replays canned
/// messages for tests and offline runs.
#[async_trait]
pub trait ModelSource: Send {
    /// Next assistant message given the current context, or `None` when the
    /// conversation is finished.
    async fn next_assistant(&mut self, context: &[Message]) -> Result<Option<Message>>;
}

/// Replays assistant messages from a script: one JSON content-block array
/// per line.
pub struct ScriptedModelSource {
    messages: VecDeque<Message>,
}

impl ScriptedModelSource {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::from_lines(&text)
    }

    pub fn from_lines(text: &str) -> Result<Self> {
        let mut messages = VecDeque::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let content: Vec<ContentBlock> = serde_json::from_str(line)
                .with_context(|| format!("bad script line {}", number + 1))?;
            messages.push_back(Message::new(Role::Assistant, content));
        }
        Ok(Self { messages })
    }
}

#[async_trait]
impl ModelSource for ScriptedModelSource {
    async fn next_assistant(&mut self, _context: &[Message]) -> Result<Option<Message>> {
        Ok(self.messages.pop_front())
    }
}

/// Outcome of one headless run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub exit_code: i32,
    pub turns_executed: u32,
}

/// Execute one prompt to completion through the full pipeline.
pub async fn run(args: &Args, config: Config, mut model: Box<dyn ModelSource>) -> Result<RunReport> {
    let telemetry = Arc::new(TelemetrySink::new());
    let mut session = Session::new(config.clone()).with_telemetry(telemetry.clone());
    let registry = Arc::new(build_registry(args, telemetry.clone(), &session.mcp_pool()).await);
    let router = ToolRouter::new(registry.clone());
    let interrupt = Arc::new(InterruptManager::new());
    let scheduler = TurnScheduler::new(registry.clone(), interrupt.clone());

    let cwd = match &args.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir().context("failed to resolve working directory")?,
    };
    let policy = ExecutionPolicy::new(config.execution.clone());
    let shell = cradle_shell::ShellExecutor::new(cwd.clone());
    let background = cradle_shell::BackgroundRegistry::new();

    let audit = args.audit_log.as_ref().map(AuditLog::new);
    let changes = args.changes_log.as_ref().map(ChangesLog::new);
    let transcript = args.transcript.as_ref().map(Transcript::new);
    let mut audit_cursor = 0usize;

    // Ctrl-C feeds the interrupt latch; the scheduler observes it.
    {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.trigger();
            }
        });
    }

    let prompt = args
        .resolve_prompt()?
        .ok_or_else(|| anyhow::anyhow!("no prompt given; use --prompt or --prompt-file"))?;
    if let Some(transcript) = &transcript {
        transcript.append_line("user", &prompt)?;
    }
    session.submit_user_turn(&prompt);

    let mut exit_code = exit_codes::OK;
    let mut turns_executed = 0u32;

    'turns: for _ in 0..args.max_turns {
        interrupt.arm();
        let context = session.snapshot_for_model().await;
        let Some(assistant) = model.next_assistant(&context).await? else {
            session.complete_turn("model source drained");
            break;
        };
        turns_executed += 1;

        if let Some(transcript) = &transcript {
            for block in &assistant.content {
                if let ContentBlock::Text { text } = block {
                    transcript.append_line("assistant", text)?;
                }
            }
        }

        let calls = router.parse_message(&assistant);
        if let Err(err) = session.append_assistant(assistant) {
            warn!(error = %err, "assistant message rejected");
            session.fail_turn(err.to_string());
            exit_code = exit_codes::FATAL_TOOL_ERROR;
            break;
        }
        if calls.is_empty() {
            session.complete_turn("turn finished without tool calls");
            break;
        }
        if args.dry_run {
            info!(calls = calls.len(), "dry run: skipping execution");
            session.complete_turn("dry run");
            break;
        }

        for call in &calls {
            session.emit(SessionEvent::ToolCallBegin {
                call_id: call.call_id.clone(),
                name: call.tool_name.clone(),
                input_preview: preview(&call.payload),
            });
        }

        let turn_id = session.history().turn_counter();
        let tracker = Arc::new(TurnDiffTracker::new(turn_id));
        let turn_ctx = Arc::new(TurnContext {
            turn_id,
            cwd: cwd.clone(),
            policy: policy.clone(),
            approvals: Arc::new(DenyAll),
            mcp_pool: session.mcp_pool(),
            shell: shell.clone(),
            background: background.clone(),
            log_dir: cwd.join("run_logs"),
        });

        session.begin_tool_batch();
        let sub_id = format!("turn-{turn_id}");
        let outcome = scheduler
            .run_batch(turn_ctx, tracker.clone(), &sub_id, calls)
            .await;
        session.end_tool_batch().await;

        // Flush per-turn artifacts before acting on the outcome.
        let events = telemetry.events();
        for event in &events[audit_cursor..] {
            session.emit(SessionEvent::ToolCallEnd {
                call_id: event.call_id.clone(),
                success: event.success,
                duration_ms: event.duration_ms,
                truncated: event.truncated,
            });
        }
        if let Some(audit) = &audit {
            audit.append(&events[audit_cursor..])?;
        }
        audit_cursor = events.len();
        if let Some(changes) = &changes {
            changes.append_turn(turn_id, &tracker.edits())?;
        }
        if let Some(transcript) = &transcript {
            for block in &outcome.results {
                transcript.append_line(
                    if block.is_error { "tool:error" } else { "tool" },
                    &block.content,
                )?;
            }
        }

        if let Some(fatal) = outcome.fatal {
            session.fail_turn(fatal.to_string());
            exit_code = match fatal {
                ToolError::Sandbox { .. } => exit_codes::POLICY_DENIAL,
                _ => exit_codes::FATAL_TOOL_ERROR,
            };
            break;
        }

        if interrupt.check() {
            session.append_tool_results(outcome.results)?;
            session.fail_turn("interrupted");
            exit_code = exit_codes::INTERRUPTED;
            break 'turns;
        }

        let had_error = outcome.results.iter().any(|block| block.is_error);
        if let Err(err) = session.append_tool_results(outcome.results) {
            session.fail_turn(err.to_string());
            exit_code = exit_codes::FATAL_TOOL_ERROR;
            break;
        }
        if args.exit_on_tool_error && had_error {
            session.fail_turn("tool returned an error result");
            exit_code = exit_codes::FATAL_TOOL_ERROR;
            break 'turns;
        }
    }

    if interrupt.check() {
        exit_code = exit_codes::INTERRUPTED;
    }

    if args.json {
        let summary = serde_json::json!({
            "exit_code": exit_code,
            "turns": turns_executed,
            "tokens": session.total_tokens(),
            "counters": telemetry.counters(),
        });
        println!("{summary}");
    }

    session.close().await;
    Ok(RunReport {
        exit_code,
        turns_executed,
    })
}

/// Build the registry honoring the allow/block tool filters.
///
/// Tools advertised by configured MCP servers are enumerated here and
/// registered under their `server/tool` names with sanitized schemas, so
/// their specs can be offered to the model alongside the builtins.
async fn build_registry(
    args: &Args,
    telemetry: Arc<TelemetrySink>,
    pool: &cradle_mcp::McpPool,
) -> ToolRegistry {
    let mut builder = ToolRegistryBuilder::default().telemetry(telemetry);
    if args.tool_enabled("read_file") {
        builder = builder.register(
            handlers::read::spec(),
            Arc::new(handlers::ReadFileHandler),
        );
    }
    if args.tool_enabled("run_terminal_cmd") {
        builder = builder.register(
            handlers::shell::spec(),
            Arc::new(handlers::ShellHandler),
        );
    }
    if args.tool_enabled("apply_patch") {
        builder = builder.register(
            handlers::edit::spec(),
            Arc::new(handlers::ApplyPatchHandler),
        );
    }

    // Discovery is best effort: an unreachable server or a tool with a
    // rejected schema is skipped, not fatal to the run.
    let mcp_handler: Arc<dyn cradle_tools::ToolHandler> = Arc::new(handlers::McpHandler);
    for server in pool.server_names() {
        let client = match pool.get_client(&server).await {
            Ok(client) => client,
            Err(err) => {
                warn!(server = %server, error = %err, "skipping MCP server");
                continue;
            }
        };
        let tools = match client.list_tools().await {
            Ok(tools) => tools,
            Err(err) => {
                warn!(server = %server, error = %err, "failed to list MCP tools");
                continue;
            }
        };
        for descriptor in tools {
            let full_name = format!("{server}/{}", descriptor.name);
            if !args.tool_enabled(&full_name) {
                continue;
            }
            match handlers::mcp::spec_for_mcp_tool(&server, &descriptor) {
                Ok(spec) => builder = builder.register(spec, mcp_handler.clone()),
                Err(err) => {
                    warn!(server = %server, tool = %descriptor.name, error = %err, "skipping MCP tool");
                }
            }
        }
    }

    builder = builder.mcp_fallback(Arc::new(handlers::McpHandler));
    builder.build()
}

fn preview(payload: &cradle_protocol::ToolPayload) -> String {
    let raw = match payload {
        cradle_protocol::ToolPayload::Function { raw_arguments }
        | cradle_protocol::ToolPayload::UnifiedExec { raw_arguments }
        | cradle_protocol::ToolPayload::Mcp { raw_arguments, .. } => raw_arguments.as_str(),
        cradle_protocol::ToolPayload::Custom { raw_input, .. } => raw_input.as_str(),
        cradle_protocol::ToolPayload::LocalShell { .. } => "<local shell action>",
    };
    let mut preview: String = raw.chars().take(80).collect();
    if preview.len() < raw.len() {
        preview.push('…');
    }
    preview
}

/// Build a model source from the CLI arguments.
pub fn model_source_from_args(args: &Args) -> Result<Box<dyn ModelSource>> {
    match &args.script {
        Some(path) => Ok(Box::new(ScriptedModelSource::from_path(path)?)),
        None => Ok(Box::new(ScriptedModelSource {
            messages: VecDeque::new(),
        })),
    }
}

/// Drain and discard queued session events (headless runs without a UI).
pub fn drain_events(session: &mut Session) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Some(event) = session.try_next_event() {
        events.push(event);
    }
    events
}

#[cfg(test)]
#[path = "driver.test.rs"]
mod tests;
