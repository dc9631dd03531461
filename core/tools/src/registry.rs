//! Name → handler registry with uniform dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;
use tracing::warn;

use cradle_protocol::TelemetryEvent;
use cradle_protocol::ToolKind;
use cradle_protocol::ToolResultBlock;
use cradle_protocol::ToolSpec;

use crate::error::Result;
use crate::error::Severity;
use crate::error::ToolError;
use crate::handler::ToolHandler;
use crate::handler::ToolInvocation;
use crate::telemetry::TelemetrySink;

/// Immutable registry of tool specs and handlers.
///
/// Dispatch runs handler lookup, the payload kind check, a telemetry span,
/// and error classification, in that order. Errors that the model can act on
/// become error tool-results; fatal errors propagate to abort the turn. The
/// registry never retries.
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    specs: Vec<ToolSpec>,
    /// Fallback for namespaced MCP calls whose full name is not registered.
    mcp_fallback: Option<Arc<dyn ToolHandler>>,
    telemetry: Arc<TelemetrySink>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Specs in registration order, for the model request.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn telemetry(&self) -> &Arc<TelemetrySink> {
        &self.telemetry
    }

    /// Parallel-safety lookup; unknown names default to non-parallel.
    pub fn supports_parallel(&self, tool_name: &str) -> bool {
        self.specs
            .iter()
            .find(|spec| spec.name == tool_name)
            .map(|spec| spec.supports_parallel)
            .unwrap_or(false)
    }

    /// Execute one call and produce its wire tool-result.
    ///
    /// `Err` is returned only for fatal errors; everything else becomes an
    /// error block carrying the original `call_id`.
    pub async fn dispatch(&self, invocation: ToolInvocation) -> Result<ToolResultBlock> {
        let call_id = invocation.call_id.clone();
        let tool_name = invocation.tool_name.clone();
        let turn_id = invocation.turn.turn_id;
        let input_bytes = invocation.payload.input_bytes() as u64;
        let start = Instant::now();

        let handler = match self.lookup(&invocation) {
            Some(handler) => handler,
            None => {
                let message = format!("tool '{tool_name}' not found");
                self.record(
                    &tool_name, &call_id, turn_id, start, false,
                    Some("not_found"), input_bytes, message.len() as u64, false,
                );
                return Ok(error_block(call_id, message));
            }
        };

        if !handler.matches_kind(&invocation.payload) {
            let message = format!("tool '{tool_name}' received incompatible payload");
            self.record(
                &tool_name, &call_id, turn_id, start, false,
                Some("validation"), input_bytes, message.len() as u64, false,
            );
            return Ok(error_block(call_id, message));
        }

        debug!(call_id = %call_id, tool = %tool_name, "dispatching tool call");
        match handler.handle(invocation).await {
            Ok(output) => {
                let truncated = output.is_truncated();
                let block = output.into_result_block(call_id.clone());
                self.record(
                    &tool_name, &call_id, turn_id, start, !block.is_error,
                    None, input_bytes, block.content.len() as u64, truncated,
                );
                Ok(block)
            }
            Err(err) if err.severity() == Severity::RespondToModel => {
                let message = err.to_string();
                self.record(
                    &tool_name, &call_id, turn_id, start, false,
                    Some(err.kind()), input_bytes, message.len() as u64, false,
                );
                Ok(error_block(call_id, message))
            }
            Err(err) => {
                warn!(call_id = %call_id, tool = %tool_name, error = %err, "fatal tool error");
                self.record(
                    &tool_name, &call_id, turn_id, start, false,
                    Some(err.kind()), input_bytes, 0, false,
                );
                Err(err)
            }
        }
    }

    fn lookup(&self, invocation: &ToolInvocation) -> Option<Arc<dyn ToolHandler>> {
        if let Some(handler) = self.handlers.get(&invocation.tool_name) {
            return Some(handler.clone());
        }
        if invocation.payload.kind() == ToolKind::Mcp {
            return self.mcp_fallback.clone();
        }
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        tool_name: &str,
        call_id: &str,
        turn_id: u64,
        start: Instant,
        success: bool,
        error_kind: Option<&str>,
        input_bytes: u64,
        output_bytes: u64,
        truncated: bool,
    ) {
        self.telemetry.record(TelemetryEvent {
            timestamp_ms: TelemetryEvent::now_ms(),
            tool_name: tool_name.to_string(),
            call_id: call_id.to_string(),
            turn_id,
            duration_ms: start.elapsed().as_millis() as u64,
            success,
            error_kind: error_kind.map(String::from),
            input_bytes,
            output_bytes,
            truncated,
        });
    }
}

fn error_block(call_id: String, content: String) -> ToolResultBlock {
    ToolResultBlock {
        tool_use_id: call_id,
        content,
        is_error: true,
    }
}

/// Builder collecting specs and handlers before the registry freezes.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    specs: Vec<ToolSpec>,
    mcp_fallback: Option<Arc<dyn ToolHandler>>,
    telemetry: Option<Arc<TelemetrySink>>,
}

impl ToolRegistryBuilder {
    /// Register a spec/handler pair. Duplicates warn; the last wins.
    pub fn register(mut self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) -> Self {
        if self.handlers.insert(spec.name.clone(), handler).is_some() {
            warn!(tool = %spec.name, "overwriting handler for tool");
            self.specs.retain(|existing| existing.name != spec.name);
        }
        self.specs.push(spec);
        self
    }

    /// Install the fallback handler for namespaced MCP calls.
    pub fn mcp_fallback(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.mcp_fallback = Some(handler);
        self
    }

    pub fn telemetry(mut self, sink: Arc<TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            handlers: self.handlers,
            specs: self.specs,
            mcp_fallback: self.mcp_fallback,
            telemetry: self.telemetry.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
#[path = "registry.test.rs"]
mod tests;
