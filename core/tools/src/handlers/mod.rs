//! Archetype tool handlers: shell, file read, apply-patch, and MCP.

pub mod edit;
pub mod mcp;
pub mod read;
pub mod shell;

use std::sync::Arc;

use crate::registry::ToolRegistryBuilder;
use crate::telemetry::TelemetrySink;

pub use edit::ApplyPatchHandler;
pub use mcp::McpHandler;
pub use read::ReadFileHandler;
pub use shell::ShellHandler;

/// Registry builder pre-loaded with the built-in tool set.
///
/// MCP tools are namespaced `server/tool` and resolved through the fallback
/// handler, so they need no per-tool registration.
pub fn builtin_registry(telemetry: Arc<TelemetrySink>) -> ToolRegistryBuilder {
    ToolRegistryBuilder::default()
        .telemetry(telemetry)
        .register(read::spec(), Arc::new(ReadFileHandler))
        .register(shell::spec(), Arc::new(ShellHandler))
        .register(edit::spec(), Arc::new(ApplyPatchHandler))
        .mcp_fallback(Arc::new(McpHandler))
}
