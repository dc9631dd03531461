//! Per-server client pool with TTL and health eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;

use cradle_protocol::McpServerConfig;

use crate::client::McpClient;
use crate::error::McpError;

/// Default idle TTL for pooled clients.
const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Grace period given to servers during `close_all`.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

struct PoolEntry {
    client: Arc<McpClient>,
    created_at: Instant,
    last_used: Instant,
}

/// Shared pool of MCP clients keyed by server name.
///
/// Creation uses double-checked locking: the global map mutex is released
/// while a server process starts, with a per-server mutex preventing
/// duplicate spawns.
pub struct McpPool {
    definitions: HashMap<String, McpServerConfig>,
    entries: Mutex<HashMap<String, PoolEntry>>,
    creation_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl McpPool {
    pub fn new(definitions: Vec<McpServerConfig>) -> Self {
        Self {
            definitions: definitions
                .into_iter()
                .map(|def| (def.name.clone(), def))
                .collect(),
            entries: Mutex::new(HashMap::new()),
            creation_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Names of configured servers.
    pub fn server_names(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }

    /// Return a healthy pooled client for `server`, creating one on demand.
    pub async fn get_client(&self, server: &str) -> Result<Arc<McpClient>, McpError> {
        let config = self
            .definitions
            .get(server)
            .ok_or_else(|| McpError::UnknownServer(server.to_string()))?;
        let ttl = config
            .ttl_seconds
            .map(Duration::from_secs_f64)
            .unwrap_or(DEFAULT_TTL);

        let creation_lock = self.creation_lock(server).await;
        let _creating = creation_lock.lock().await;

        // Fast path: a live entry that is neither expired nor unhealthy.
        let stale = {
            let mut entries = self.entries.lock().await;
            match entries.get_mut(server) {
                Some(entry) => {
                    let expired = entry.last_used.elapsed() > ttl;
                    if !expired && entry.client.is_healthy() {
                        entry.last_used = Instant::now();
                        return Ok(entry.client.clone());
                    }
                    debug!(server, expired, "evicting pooled MCP client");
                    entries.remove(server).map(|entry| entry.client)
                }
                None => None,
            }
        };
        if let Some(old) = stale {
            old.shutdown(SHUTDOWN_GRACE).await;
        }

        // Slow path: spawn outside the map lock; the per-server creation
        // lock keeps concurrent callers from double-spawning.
        let client = Arc::new(McpClient::connect(config).await?);
        info!(server, "MCP client connected");
        let mut entries = self.entries.lock().await;
        entries.insert(
            server.to_string(),
            PoolEntry {
                client: client.clone(),
                created_at: Instant::now(),
                last_used: Instant::now(),
            },
        );
        Ok(client)
    }

    /// Evict and close the client for `server` after a failure.
    pub async fn mark_unhealthy(&self, server: &str) {
        let entry = {
            let mut entries = self.entries.lock().await;
            entries.remove(server)
        };
        if let Some(entry) = entry {
            debug!(
                server,
                age_secs = entry.created_at.elapsed().as_secs(),
                "closing unhealthy MCP client"
            );
            entry.client.shutdown(SHUTDOWN_GRACE).await;
        }
    }

    /// Gracefully shut down every pooled client.
    pub async fn close_all(&self) {
        let entries: Vec<PoolEntry> = {
            let mut map = self.entries.lock().await;
            map.drain().map(|(_, entry)| entry).collect()
        };
        for entry in entries {
            entry.client.shutdown(SHUTDOWN_GRACE).await;
        }
    }

    async fn creation_lock(&self, server: &str) -> Arc<Mutex<()>> {
        let mut locks = self.creation_locks.lock().await;
        locks
            .entry(server.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl std::fmt::Debug for McpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpPool")
            .field("servers", &self.definitions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "pool.test.rs"]
mod tests;
