//! Stdio JSON-RPC client for one MCP server process.

use std::process::Stdio;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::ChildStdin;
use tokio::process::ChildStdout;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::warn;

use cradle_protocol::CallToolResult;
use cradle_protocol::McpServerConfig;

use crate::error::McpError;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// A tool advertised by an MCP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

struct Wire {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Client for one MCP server.
///
/// Requests are serialized: the wire mutex is held for the full
/// request/response round trip, which also satisfies the core's ordering
/// contract for single-server calls.
pub struct McpClient {
    server: String,
    wire: Mutex<Wire>,
    next_id: AtomicU64,
    healthy: AtomicBool,
    request_timeout: Duration,
}

impl McpClient {
    /// Spawn the server process and run the initialize handshake.
    pub async fn connect(config: &McpServerConfig) -> Result<Self, McpError> {
        let mut cmd = tokio::process::Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|source| McpError::Spawn {
            server: config.name.clone(),
            source,
        })?;
        let stdin = child.stdin.take().ok_or(McpError::Closed)?;
        let stdout = child.stdout.take().map(BufReader::new).ok_or(McpError::Closed)?;

        let client = Self {
            server: config.name.clone(),
            wire: Mutex::new(Wire {
                child,
                stdin,
                stdout,
            }),
            next_id: AtomicU64::new(1),
            healthy: AtomicBool::new(true),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        };
        client.initialize().await?;
        Ok(client)
    }

    pub fn server_name(&self) -> &str {
        &self.server
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    async fn initialize(&self) -> Result<(), McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {"name": "cradle", "version": env!("CARGO_PKG_VERSION")},
            "capabilities": {},
        });
        self.request("initialize", params).await?;
        self.notify("notifications/initialized", json!({})).await?;
        debug!(server = %self.server, "MCP handshake complete");
        Ok(())
    }

    /// List the server's advertised tools.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let result = self.request("tools/list", json!({})).await?;
        let tools = result.get("tools").cloned().unwrap_or(Value::Array(vec![]));
        serde_json::from_value(tools).map_err(|err| McpError::Protocol {
            message: format!("malformed tools/list response: {err}"),
        })
    }

    /// Invoke one tool on the server.
    pub async fn call_tool(
        &self,
        tool: &str,
        arguments: Value,
    ) -> Result<CallToolResult, McpError> {
        let params = json!({"name": tool, "arguments": arguments});
        let result = self.request("tools/call", params).await?;
        serde_json::from_value(result).map_err(|err| McpError::Protocol {
            message: format!("malformed tools/call response: {err}"),
        })
    }

    /// Gracefully shut the server down: close stdin, wait up to `grace`,
    /// then kill the process.
    pub async fn shutdown(&self, grace: Duration) {
        let mut wire = self.wire.lock().await;
        let _ = wire.stdin.shutdown().await;
        match tokio::time::timeout(grace, wire.child.wait()).await {
            Ok(_) => debug!(server = %self.server, "MCP server exited"),
            Err(_) => {
                warn!(server = %self.server, "MCP server did not exit in grace period, killing");
                let _ = wire.child.start_kill();
                let _ = wire.child.wait().await;
            }
        }
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), McpError> {
        let mut wire = self.wire.lock().await;
        let message = json!({"jsonrpc": "2.0", "method": method, "params": params});
        write_line(&mut wire.stdin, &message).await
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let message = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});

        let mut wire = self.wire.lock().await;
        let round_trip = async {
            write_line(&mut wire.stdin, &message).await?;
            loop {
                let mut line = String::new();
                let read = wire.stdout.read_line(&mut line).await?;
                if read == 0 {
                    return Err(McpError::Closed);
                }
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let response: Value =
                    serde_json::from_str(trimmed).map_err(|err| McpError::Protocol {
                        message: format!("invalid JSON from server: {err}"),
                    })?;
                // Skip notifications and responses to other requests.
                if response.get("id").and_then(Value::as_u64) != Some(id) {
                    continue;
                }
                if let Some(error) = response.get("error") {
                    return Err(McpError::Server {
                        code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                        message: error
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown error")
                            .to_string(),
                    });
                }
                return Ok(response.get("result").cloned().unwrap_or(Value::Null));
            }
        };

        match tokio::time::timeout(self.request_timeout, round_trip).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => {
                if err.is_transient() {
                    self.healthy.store(false, Ordering::Relaxed);
                }
                Err(err)
            }
            Err(_) => {
                self.healthy.store(false, Ordering::Relaxed);
                Err(McpError::Timeout {
                    timeout_secs: self.request_timeout.as_secs(),
                })
            }
        }
    }
}

async fn write_line(stdin: &mut ChildStdin, message: &Value) -> Result<(), McpError> {
    let mut line = message.to_string();
    line.push('\n');
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("server", &self.server)
            .field("healthy", &self.is_healthy())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "client.test.rs"]
mod tests;
