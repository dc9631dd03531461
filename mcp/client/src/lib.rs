//! MCP client and connection pool.
//!
//! An MCP server is a child process speaking line-delimited JSON-RPC 2.0 over
//! stdio. The client serializes requests per server; the pool keys clients by
//! server name and evicts them on TTL expiry or health failure.

mod client;
mod error;
mod pool;

pub use client::McpClient;
pub use client::ToolDescriptor;
pub use error::McpError;
pub use pool::McpPool;
