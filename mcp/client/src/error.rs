//! Error types for MCP transport and protocol failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("failed to spawn MCP server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("MCP transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("MCP connection closed")]
    Closed,

    #[error("MCP request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("MCP protocol error: {message}")]
    Protocol { message: String },

    #[error("MCP server error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("unknown MCP server '{0}'")]
    UnknownServer(String),
}

impl McpError {
    /// Transient failures qualify for the handler's one-shot retry with a
    /// fresh client.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            McpError::Transport(_) | McpError::Closed | McpError::Timeout { .. }
        )
    }
}
