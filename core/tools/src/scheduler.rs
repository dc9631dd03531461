//! Per-turn concurrent scheduler with a reader/writer discipline.
//!
//! Calls whose spec declares `supports_parallel = true` share a read guard
//! and run concurrently; every other call takes the write guard and runs
//! exclusively. The underlying `tokio::sync::RwLock` is write-preferring, so
//! readers arriving while a writer waits queue behind it. Guard acquisition
//! is bounded; results are always delivered in input order.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::RwLock;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;

use cradle_protocol::TelemetryEvent;
use cradle_protocol::ToolCall;
use cradle_protocol::ToolResultBlock;

use crate::error::Result;
use crate::error::ToolError;
use crate::handler::ToolInvocation;
use crate::handler::TurnContext;
use crate::interrupt::InterruptManager;
use crate::registry::ToolRegistry;
use crate::tracker::TurnDiffTracker;

/// Default bound on guard acquisition.
pub const DEFAULT_GUARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one scheduled batch.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Tool results in the order of the originating tool-use blocks.
    pub results: Vec<ToolResultBlock>,
    /// First fatal error, if the batch aborted.
    pub fatal: Option<ToolError>,
}

/// Scheduler for the tool calls of one assistant turn.
pub struct TurnScheduler {
    registry: Arc<ToolRegistry>,
    interrupt: Arc<InterruptManager>,
    guard_timeout: Duration,
    max_in_flight: Option<usize>,
}

impl TurnScheduler {
    pub fn new(registry: Arc<ToolRegistry>, interrupt: Arc<InterruptManager>) -> Self {
        Self {
            registry,
            interrupt,
            guard_timeout: DEFAULT_GUARD_TIMEOUT,
            max_in_flight: None,
        }
    }

    pub fn with_guard_timeout(mut self, timeout: Duration) -> Self {
        self.guard_timeout = timeout;
        self
    }

    /// Optional throttle on concurrently running calls.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = Some(max);
        self
    }

    /// Run one ordered batch of calls to completion (or fatal abort).
    ///
    /// On interrupt, in-flight tasks are cancelled cooperatively: completed
    /// results are preserved and cancelled calls produce error results
    /// tagged cancelled. A fatal error cancels the remainder of the batch
    /// and clears any leftover tracker locks.
    pub async fn run_batch(
        &self,
        turn: Arc<TurnContext>,
        tracker: Arc<TurnDiffTracker>,
        sub_id: &str,
        calls: Vec<ToolCall>,
    ) -> BatchOutcome {
        let rw = Arc::new(RwLock::new(()));
        let limiter = self.max_in_flight.map(|max| Arc::new(Semaphore::new(max)));
        let root = CancellationToken::new();

        // Bridge the interrupt latch onto the batch's cancellation token.
        let watcher = {
            let interrupt = self.interrupt.clone();
            let root = root.clone();
            tokio::spawn(async move {
                interrupt.wait_until_fired().await;
                info!("interrupt fired, cancelling in-flight tool calls");
                root.cancel();
            })
        };
        if self.interrupt.check() {
            root.cancel();
        }

        let mut handles = Vec::with_capacity(calls.len());
        for call in calls {
            let parallel = self.registry.supports_parallel(&call.tool_name);
            let token = root.child_token();
            let invocation = ToolInvocation {
                turn: turn.clone(),
                tracker: tracker.clone(),
                sub_id: sub_id.to_string(),
                call_id: call.call_id.clone(),
                tool_name: call.tool_name.clone(),
                payload: call.payload,
                cancel: token.clone(),
            };
            debug!(call_id = %call.call_id, tool = %call.tool_name, parallel, "scheduling tool call");
            let handle = tokio::spawn(run_one(
                self.registry.clone(),
                rw.clone(),
                limiter.clone(),
                self.guard_timeout,
                parallel,
                token,
                invocation,
            ));
            handles.push((call.call_id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        let mut fatal: Option<ToolError> = None;
        for (call_id, handle) in handles {
            match handle.await {
                Ok(Ok(block)) => results.push(block),
                Ok(Err(err)) => {
                    error!(call_id = %call_id, error = %err, "tool call aborted the turn");
                    if fatal.is_none() {
                        root.cancel();
                        fatal = Some(err);
                    }
                }
                Err(join_err) => {
                    error!(call_id = %call_id, error = %join_err, "tool task panicked");
                    results.push(ToolResultBlock {
                        tool_use_id: call_id,
                        content: format!("tool execution task panicked: {join_err}"),
                        is_error: true,
                    });
                }
            }
        }
        watcher.abort();

        if fatal.is_some() {
            tracker.clear_locks();
        }
        BatchOutcome { results, fatal }
    }
}

enum Guard {
    Read(tokio::sync::OwnedRwLockReadGuard<()>),
    Write(tokio::sync::OwnedRwLockWriteGuard<()>),
}

/// Execute one call under its guard.
///
/// Returns `Err` only for fatal errors; cancellation and guard timeouts
/// become error result blocks so the turn can continue.
async fn run_one(
    registry: Arc<ToolRegistry>,
    rw: Arc<RwLock<()>>,
    limiter: Option<Arc<Semaphore>>,
    guard_timeout: Duration,
    parallel: bool,
    token: CancellationToken,
    invocation: ToolInvocation,
) -> Result<ToolResultBlock> {
    let call_id = invocation.call_id.clone();
    let tool_name = invocation.tool_name.clone();
    let turn_id = invocation.turn.turn_id;
    let input_bytes = invocation.payload.input_bytes() as u64;
    let start = Instant::now();

    let _permit = match limiter {
        Some(limiter) => limiter.acquire_owned().await.ok(),
        None => None,
    };

    let acquire = async {
        if parallel {
            Guard::Read(rw.read_owned().await)
        } else {
            Guard::Write(rw.write_owned().await)
        }
    };
    let guard = tokio::select! {
        biased;
        _ = token.cancelled() => {
            record_aborted(registry.as_ref(), &tool_name, &call_id, turn_id, start, input_bytes, &ToolError::Cancelled);
            return Ok(error_block(&call_id, &ToolError::Cancelled));
        }
        acquired = tokio::time::timeout(guard_timeout, acquire) => match acquired {
            Ok(guard) => guard,
            Err(_) => {
                let err = ToolError::Timeout {
                    timeout_secs: guard_timeout.as_secs(),
                };
                record_aborted(registry.as_ref(), &tool_name, &call_id, turn_id, start, input_bytes, &err);
                return Ok(error_block(&call_id, &err));
            }
        }
    };

    let result = tokio::select! {
        biased;
        _ = token.cancelled() => {
            record_aborted(registry.as_ref(), &tool_name, &call_id, turn_id, start, input_bytes, &ToolError::Cancelled);
            Ok(error_block(&call_id, &ToolError::Cancelled))
        }
        dispatched = registry.dispatch(invocation) => dispatched,
    };
    drop(guard);
    result
}

fn error_block(call_id: &str, err: &ToolError) -> ToolResultBlock {
    ToolResultBlock {
        tool_use_id: call_id.to_string(),
        content: err.to_string(),
        is_error: true,
    }
}

/// Telemetry for calls that never reached the registry (cancelled while
/// queued, or guard acquisition timed out).
fn record_aborted(
    registry: &ToolRegistry,
    tool_name: &str,
    call_id: &str,
    turn_id: u64,
    start: Instant,
    input_bytes: u64,
    err: &ToolError,
) {
    registry.telemetry().record(TelemetryEvent {
        timestamp_ms: TelemetryEvent::now_ms(),
        tool_name: tool_name.to_string(),
        call_id: call_id.to_string(),
        turn_id,
        duration_ms: start.elapsed().as_millis() as u64,
        success: false,
        error_kind: Some(err.kind().to_string()),
        input_bytes,
        output_bytes: 0,
        truncated: false,
    });
}

#[cfg(test)]
#[path = "scheduler.test.rs"]
mod tests;
