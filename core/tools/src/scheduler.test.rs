use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;

use cradle_protocol::JsonSchema;
use cradle_protocol::ToolKind;
use cradle_protocol::ToolOutput;
use cradle_protocol::ToolPayload;
use cradle_protocol::ToolSpec;

use super::*;
use crate::error::Result as ToolResult;
use crate::handler::ToolHandler;
use crate::testutil;

/// Sleeps for the duration given in its arguments, cooperatively.
struct SleepHandler;

#[async_trait]
impl ToolHandler for SleepHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, invocation: crate::handler::ToolInvocation) -> ToolResult<ToolOutput> {
        let args: serde_json::Value =
            serde_json::from_str(invocation.raw_arguments().unwrap_or("{}"))?;
        let ms = args.get("ms").and_then(|v| v.as_u64()).unwrap_or(0);
        tokio::select! {
            biased;
            _ = invocation.cancel.cancelled() => return Err(ToolError::Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
        }
        Ok(ToolOutput::text(format!("slept {ms}")))
    }
}

/// Locks a path in the tracker, then sleeps holding the lock.
struct LockAndSleepHandler;

#[async_trait]
impl ToolHandler for LockAndSleepHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, invocation: crate::handler::ToolInvocation) -> ToolResult<ToolOutput> {
        let path = std::path::Path::new("/locked/by/test");
        let _guard = invocation.tracker.lock_guard(path)?;
        tokio::select! {
            biased;
            _ = invocation.cancel.cancelled() => return Err(ToolError::Cancelled),
            _ = tokio::time::sleep(Duration::from_secs(5)) => {}
        }
        Ok(ToolOutput::text("done"))
    }
}

struct FatalHandler;

#[async_trait]
impl ToolHandler for FatalHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, _invocation: crate::handler::ToolInvocation) -> ToolResult<ToolOutput> {
        Err(ToolError::sandbox("blocked"))
    }
}

fn spec(name: &str, parallel: bool) -> ToolSpec {
    ToolSpec::new(
        name,
        "test tool",
        JsonSchema::Object {
            properties: Default::default(),
            required: None,
            additional_properties: None,
        },
    )
    .with_parallel(parallel)
}

fn registry() -> Arc<ToolRegistry> {
    Arc::new(
        ToolRegistry::builder()
            .register(spec("sleep_parallel", true), Arc::new(SleepHandler))
            .register(spec("sleep_serial", false), Arc::new(SleepHandler))
            .register(spec("lock_and_sleep", false), Arc::new(LockAndSleepHandler))
            .register(spec("fatal", false), Arc::new(FatalHandler))
            .build(),
    )
}

fn call(tool: &str, call_id: &str, ms: u64) -> cradle_protocol::ToolCall {
    cradle_protocol::ToolCall {
        tool_name: tool.to_string(),
        call_id: call_id.to_string(),
        payload: ToolPayload::Function {
            raw_arguments: serde_json::json!({"ms": ms}).to_string(),
        },
    }
}

#[tokio::test]
async fn parallel_calls_overlap() {
    let registry = registry();
    let interrupt = Arc::new(InterruptManager::new());
    let scheduler = TurnScheduler::new(registry, interrupt);
    let harness = testutil::harness();

    let start = Instant::now();
    let outcome = scheduler
        .run_batch(
            harness.turn.clone(),
            harness.tracker.clone(),
            "sub-1",
            vec![
                call("sleep_parallel", "c1", 300),
                call("sleep_parallel", "c2", 300),
            ],
        )
        .await;
    let elapsed = start.elapsed();

    assert!(outcome.fatal.is_none());
    assert_eq!(outcome.results.len(), 2);
    assert!(
        elapsed < Duration::from_millis(450),
        "parallel batch took {elapsed:?}"
    );
}

#[tokio::test]
async fn serial_calls_do_not_overlap() {
    let registry = registry();
    let interrupt = Arc::new(InterruptManager::new());
    let scheduler = TurnScheduler::new(registry, interrupt);
    let harness = testutil::harness();

    let start = Instant::now();
    let outcome = scheduler
        .run_batch(
            harness.turn.clone(),
            harness.tracker.clone(),
            "sub-1",
            vec![
                call("sleep_serial", "c1", 300),
                call("sleep_serial", "c2", 300),
            ],
        )
        .await;
    let elapsed = start.elapsed();

    assert!(outcome.fatal.is_none());
    assert!(
        elapsed >= Duration::from_millis(550),
        "serial batch took {elapsed:?}"
    );
}

#[tokio::test]
async fn results_follow_input_order() {
    let registry = registry();
    let interrupt = Arc::new(InterruptManager::new());
    let scheduler = TurnScheduler::new(registry, interrupt);
    let harness = testutil::harness();

    // The first call sleeps longer, so it completes last.
    let outcome = scheduler
        .run_batch(
            harness.turn.clone(),
            harness.tracker.clone(),
            "sub-1",
            vec![
                call("sleep_parallel", "slow", 200),
                call("sleep_parallel", "fast", 10),
            ],
        )
        .await;

    let ids: Vec<&str> = outcome
        .results
        .iter()
        .map(|block| block.tool_use_id.as_str())
        .collect();
    assert_eq!(ids, vec!["slow", "fast"]);
}

#[tokio::test]
async fn interrupt_cancels_in_flight_calls() {
    let registry = registry();
    let interrupt = Arc::new(InterruptManager::new());
    let scheduler = TurnScheduler::new(registry.clone(), interrupt.clone());
    let harness = testutil::harness();
    interrupt.arm();

    let trigger = {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            interrupt.trigger();
        })
    };

    let outcome = scheduler
        .run_batch(
            harness.turn.clone(),
            harness.tracker.clone(),
            "sub-1",
            vec![
                call("sleep_parallel", "quick", 10),
                call("lock_and_sleep", "locked", 0),
            ],
        )
        .await;
    trigger.await.unwrap();

    assert!(outcome.fatal.is_none());
    assert_eq!(outcome.results.len(), 2);
    // The quick call completed before the interrupt; the locked one was
    // cancelled.
    assert!(!outcome.results[0].is_error);
    assert!(outcome.results[1].is_error);
    assert!(outcome.results[1].content.contains("cancelled"));

    // No tracker lock survives a cancelled handler.
    assert!(harness
        .tracker
        .lock_file(std::path::Path::new("/locked/by/test"))
        .is_ok());
}

#[tokio::test]
async fn fatal_error_aborts_batch() {
    let registry = registry();
    let interrupt = Arc::new(InterruptManager::new());
    let scheduler = TurnScheduler::new(registry, interrupt);
    let harness = testutil::harness();

    let outcome = scheduler
        .run_batch(
            harness.turn.clone(),
            harness.tracker.clone(),
            "sub-1",
            vec![call("fatal", "boom", 0), call("sleep_serial", "after", 100)],
        )
        .await;

    let fatal = outcome.fatal.expect("fatal error expected");
    assert!(fatal.is_fatal());
}

#[tokio::test]
async fn guard_acquisition_times_out() {
    let registry = registry();
    let interrupt = Arc::new(InterruptManager::new());
    let scheduler = TurnScheduler::new(registry, interrupt)
        .with_guard_timeout(Duration::from_millis(100));
    let harness = testutil::harness();

    let outcome = scheduler
        .run_batch(
            harness.turn.clone(),
            harness.tracker.clone(),
            "sub-1",
            vec![
                call("sleep_serial", "long", 1_000),
                call("sleep_serial", "starved", 10),
            ],
        )
        .await;

    assert!(outcome.fatal.is_none());
    assert!(!outcome.results[0].is_error);
    assert!(outcome.results[1].is_error);
    assert!(outcome.results[1].content.contains("timed out"));
}

#[tokio::test]
async fn max_in_flight_throttles_but_completes() {
    let registry = registry();
    let interrupt = Arc::new(InterruptManager::new());
    let scheduler = TurnScheduler::new(registry, interrupt).with_max_in_flight(1);
    let harness = testutil::harness();

    let outcome = scheduler
        .run_batch(
            harness.turn.clone(),
            harness.tracker.clone(),
            "sub-1",
            vec![
                call("sleep_parallel", "a", 20),
                call("sleep_parallel", "b", 20),
                call("sleep_parallel", "c", 20),
            ],
        )
        .await;
    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.results.iter().all(|block| !block.is_error));
}
