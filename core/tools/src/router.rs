//! Parse model response blocks into typed tool calls.

use std::sync::Arc;

use serde_json::Value;

use cradle_protocol::ContentBlock;
use cradle_protocol::Message;
use cradle_protocol::ToolCall;
use cradle_protocol::ToolPayload;

use crate::error::Result;
use crate::error::ToolError;
use crate::registry::ToolRegistry;

/// Name used when a legacy `local_shell_call` block carries no tool name.
const LOCAL_SHELL_TOOL: &str = "run_terminal_cmd";

/// Translates model output blocks into [`ToolCall`]s.
///
/// The router stays schema-agnostic: raw arguments are re-serialized strings
/// that the owning handler decodes. MCP tools are recognized purely by the
/// exactly-one-`/` rule in the tool name.
pub struct ToolRouter {
    registry: Arc<ToolRegistry>,
}

impl ToolRouter {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Parallel-safety lookup for a parsed call; unknown names are serial.
    pub fn supports_parallel(&self, tool_name: &str) -> bool {
        self.registry.supports_parallel(tool_name)
    }

    /// Extract every tool call from an assistant message, in block order.
    pub fn parse_message(&self, message: &Message) -> Vec<ToolCall> {
        message
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some(build_call(name, id, input))
                }
                _ => None,
            })
            .collect()
    }

    /// Parse one raw wire block. Returns `None` for non-tool blocks.
    pub fn build_tool_call(block: &Value) -> Result<Option<ToolCall>> {
        match block.get("type").and_then(Value::as_str) {
            Some("tool_use") => {
                let name = block
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ToolError::protocol("tool_use block missing name"))?;
                let call_id = block
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ToolError::protocol("tool_use block missing id"))?;
                let input = block.get("input").cloned().unwrap_or(Value::Object(Default::default()));
                Ok(Some(build_call(name, call_id, &input)))
            }
            Some("local_shell_call") => {
                // Legacy blocks carry either `call_id` or `id`.
                let call_id = block
                    .get("call_id")
                    .or_else(|| block.get("id"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ToolError::protocol("local_shell_call block missing call_id and id")
                    })?;
                let action = block
                    .get("action")
                    .cloned()
                    .ok_or_else(|| ToolError::protocol("local_shell_call block missing action"))?;
                let action = serde_json::from_value(action)
                    .map_err(|err| ToolError::protocol(format!("bad local_shell action: {err}")))?;
                let name = block
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or(LOCAL_SHELL_TOOL);
                Ok(Some(ToolCall {
                    tool_name: name.to_string(),
                    call_id: call_id.to_string(),
                    payload: ToolPayload::LocalShell { action },
                }))
            }
            Some("custom_tool_call") => {
                let name = block
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ToolError::protocol("custom_tool_call block missing name"))?;
                let call_id = block
                    .get("call_id")
                    .or_else(|| block.get("id"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ToolError::protocol("custom_tool_call block missing call_id and id")
                    })?;
                let raw_input = match block.get("input") {
                    Some(Value::String(text)) => text.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                Ok(Some(ToolCall {
                    tool_name: name.to_string(),
                    call_id: call_id.to_string(),
                    payload: ToolPayload::Custom {
                        name: name.to_string(),
                        raw_input,
                    },
                }))
            }
            _ => Ok(None),
        }
    }
}

/// Build a call from a `tool_use` triple, applying the MCP name rule.
fn build_call(name: &str, call_id: &str, input: &Value) -> ToolCall {
    let raw_arguments = input.to_string();
    let payload = match split_mcp_name(name) {
        Some((server, tool)) => ToolPayload::Mcp {
            server: server.to_string(),
            tool: tool.to_string(),
            raw_arguments,
        },
        None => ToolPayload::Function { raw_arguments },
    };
    ToolCall {
        tool_name: name.to_string(),
        call_id: call_id.to_string(),
        payload,
    }
}

/// Names with exactly one `/` address an MCP server; zero or several slashes
/// are plain function names.
fn split_mcp_name(name: &str) -> Option<(&str, &str)> {
    let mut parts = name.splitn(2, '/');
    let server = parts.next()?;
    let tool = parts.next()?;
    if server.is_empty() || tool.is_empty() || tool.contains('/') {
        return None;
    }
    Some((server, tool))
}

#[cfg(test)]
#[path = "router.test.rs"]
mod tests;
