//! MCP forwarding handler.

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;
use tracing::debug;

use cradle_mcp::McpError;
use cradle_mcp::ToolDescriptor;
use cradle_protocol::CallToolResult;
use cradle_protocol::JsonSchema;
use cradle_protocol::McpContentBlock;
use cradle_protocol::ToolKind;
use cradle_protocol::ToolOutput;
use cradle_protocol::ToolPayload;
use cradle_protocol::ToolSpec;
use cradle_protocol::sanitize_schema;

use crate::error::Result;
use crate::error::ToolError;
use crate::format::truncate_head_tail;
use crate::handler::ToolHandler;
use crate::handler::ToolInvocation;

/// Build the model-facing spec for a tool advertised by an MCP server.
///
/// The server's raw schema is sanitized into the fully realized form (cycles
/// stubbed by identity) before it is exposed; a schema that fails
/// sanitization rejects the tool.
pub fn spec_for_mcp_tool(server: &str, descriptor: &ToolDescriptor) -> Result<ToolSpec> {
    let raw = descriptor
        .input_schema
        .clone()
        .unwrap_or_else(|| json!({"type": "object"}));
    let sanitized = sanitize_schema(&raw).map_err(|err| {
        ToolError::protocol(format!(
            "schema for '{server}/{}' rejected: {err}",
            descriptor.name
        ))
    })?;
    let parameters: JsonSchema = serde_json::from_value(sanitized).map_err(|err| {
        ToolError::protocol(format!(
            "schema for '{server}/{}' did not sanitize cleanly: {err}",
            descriptor.name
        ))
    })?;
    Ok(ToolSpec::new(
        format!("{server}/{}", descriptor.name),
        descriptor.description.clone().unwrap_or_else(|| {
            format!("Tool '{}' provided by MCP server '{server}'", descriptor.name)
        }),
        parameters,
    ))
}

/// Forwards namespaced calls to their MCP server through the session pool.
///
/// One transient transport failure triggers a single retry with a fresh
/// client; any further failure goes back to the model.
#[derive(Debug, Default)]
pub struct McpHandler;

#[async_trait]
impl ToolHandler for McpHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Mcp
    }

    async fn handle(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        let (server, tool, raw) = match &invocation.payload {
            ToolPayload::Mcp {
                server,
                tool,
                raw_arguments,
            } => (server.clone(), tool.clone(), raw_arguments.clone()),
            _ => {
                return Err(ToolError::validation(
                    "MCP handler received a non-MCP payload",
                ));
            }
        };

        let arguments: Value = if raw.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&raw)?
        };

        let pool = invocation.turn.mcp_pool.clone();
        let first = call_once(&invocation, &pool, &server, &tool, arguments.clone()).await;
        let result = match first {
            Ok(result) => result,
            Err(_) if invocation.cancel.is_cancelled() => return Err(ToolError::Cancelled),
            Err(err) if err.is_transient() => {
                debug!(server = %server, tool = %tool, error = %err, "transient MCP failure, retrying once");
                pool.mark_unhealthy(&server).await;
                let retried = call_once(&invocation, &pool, &server, &tool, arguments).await;
                if invocation.cancel.is_cancelled() {
                    return Err(ToolError::Cancelled);
                }
                retried.map_err(|err| map_error(&server, err))?
            }
            Err(err) => return Err(map_error(&server, err)),
        };

        Ok(ToolOutput::Mcp {
            result: truncate_result(result),
        })
    }
}

async fn call_once(
    invocation: &ToolInvocation,
    pool: &cradle_mcp::McpPool,
    server: &str,
    tool: &str,
    arguments: Value,
) -> std::result::Result<CallToolResult, McpError> {
    tokio::select! {
        biased;
        _ = invocation.cancel.cancelled() => Err(McpError::Closed),
        client = pool.get_client(server) => {
            let client = client?;
            tokio::select! {
                biased;
                _ = invocation.cancel.cancelled() => Err(McpError::Closed),
                result = client.call_tool(tool, arguments) => result,
            }
        }
    }
}

fn map_error(server: &str, err: McpError) -> ToolError {
    match err {
        McpError::UnknownServer(name) => {
            ToolError::not_found(format!("MCP server '{name}' is not configured"))
        }
        McpError::Server { code, message } => {
            ToolError::validation(format!("MCP server '{server}' error {code}: {message}"))
        }
        McpError::Protocol { message } => ToolError::protocol(message),
        other => ToolError::transient(format!("MCP server '{server}': {other}")),
    }
}

/// Bound text blocks before the result reaches the model.
fn truncate_result(mut result: CallToolResult) -> CallToolResult {
    for block in &mut result.content {
        if let McpContentBlock::Text { text } = block {
            let formatted = truncate_head_tail(text);
            if formatted.truncated {
                *text = formatted.content;
            }
        }
    }
    result
}

#[cfg(test)]
#[path = "mcp.test.rs"]
mod tests;
