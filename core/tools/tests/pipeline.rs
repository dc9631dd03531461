//! End-to-end pipeline tests: router → scheduler → registry → handlers,
//! with a real tracker and filesystem.

use std::sync::Arc;

use serde_json::json;

use cradle_mcp::McpPool;
use cradle_protocol::ContentBlock;
use cradle_protocol::Message;
use cradle_protocol::Role;
use cradle_protocol::ToolCall;
use cradle_protocol::ToolPayload;
use cradle_protocol::config::ExecutionConfig;
use cradle_shell::BackgroundRegistry;
use cradle_shell::ShellExecutor;
use cradle_tools::ExecutionPolicy;
use cradle_tools::InterruptManager;
use cradle_tools::TelemetrySink;
use cradle_tools::ToolRegistry;
use cradle_tools::ToolRouter;
use cradle_tools::TurnContext;
use cradle_tools::TurnDiffTracker;
use cradle_tools::TurnScheduler;
use cradle_tools::handler::ApproveAll;
use cradle_tools::handlers;

struct Fixture {
    dir: tempfile::TempDir,
    registry: Arc<ToolRegistry>,
    scheduler: TurnScheduler,
    turn: Arc<TurnContext>,
    tracker: Arc<TurnDiffTracker>,
    interrupt: Arc<InterruptManager>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("temp dir");
    let cwd = dir.path().to_path_buf();
    let telemetry = Arc::new(TelemetrySink::new());
    let registry = Arc::new(handlers::builtin_registry(telemetry).build());
    let interrupt = Arc::new(InterruptManager::new());
    let scheduler = TurnScheduler::new(registry.clone(), interrupt.clone());
    let turn = Arc::new(TurnContext {
        turn_id: 1,
        cwd: cwd.clone(),
        policy: ExecutionPolicy::new(ExecutionConfig::default()),
        approvals: Arc::new(ApproveAll),
        mcp_pool: Arc::new(McpPool::new(vec![])),
        shell: ShellExecutor::new(cwd.clone()),
        background: BackgroundRegistry::new(),
        log_dir: cwd.join("run_logs"),
    });
    Fixture {
        dir,
        registry,
        scheduler,
        turn,
        tracker: Arc::new(TurnDiffTracker::new(1)),
        interrupt,
    }
}

fn function_call(tool: &str, call_id: &str, input: serde_json::Value) -> ToolCall {
    ToolCall {
        tool_name: tool.to_string(),
        call_id: call_id.to_string(),
        payload: ToolPayload::Function {
            raw_arguments: input.to_string(),
        },
    }
}

#[tokio::test]
async fn parallel_reads_return_in_input_order() {
    let fixture = fixture();
    // Two 1 MiB files.
    let chunk = "abcdefghij".repeat(104_858);
    std::fs::write(fixture.dir.path().join("one.txt"), &chunk).unwrap();
    std::fs::write(fixture.dir.path().join("two.txt"), &chunk).unwrap();

    let outcome = fixture
        .scheduler
        .run_batch(
            fixture.turn.clone(),
            fixture.tracker.clone(),
            "turn-1",
            vec![
                function_call("read_file", "c1", json!({"path": "one.txt"})),
                function_call("read_file", "c2", json!({"path": "two.txt"})),
            ],
        )
        .await;

    assert!(outcome.fatal.is_none());
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[0].tool_use_id, "c1");
    assert_eq!(outcome.results[1].tool_use_id, "c2");
    assert!(outcome.results.iter().all(|block| !block.is_error));
    // Oversized reads are bounded for the model.
    assert!(outcome.results[0].content.len() <= 10 * 1024);

    let events = fixture.registry.telemetry().events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| event.truncated));
}

#[tokio::test]
async fn undo_after_create_update_create() {
    let fixture = fixture();

    // Three serial apply_patch calls in one turn: create a.txt, update it,
    // create b.txt.
    let create_a = "*** Begin Patch\n*** Add File: a.txt\n+v1\n*** End Patch";
    let update_a = concat!(
        "*** Begin Patch\n",
        "*** Update File: a.txt\n",
        "-v1\n",
        "+v2\n",
        "*** End Patch",
    );
    let create_b = "*** Begin Patch\n*** Add File: b.txt\n+bee\n*** End Patch";

    let outcome = fixture
        .scheduler
        .run_batch(
            fixture.turn.clone(),
            fixture.tracker.clone(),
            "turn-1",
            vec![
                function_call("apply_patch", "c1", json!({"patch": create_a})),
                function_call("apply_patch", "c2", json!({"patch": update_a})),
                function_call("apply_patch", "c3", json!({"patch": create_b})),
            ],
        )
        .await;
    assert!(outcome.fatal.is_none());
    assert!(outcome.results.iter().all(|block| !block.is_error));

    let a = fixture.dir.path().join("a.txt");
    let b = fixture.dir.path().join("b.txt");
    assert_eq!(std::fs::read_to_string(&a).unwrap(), "v2\n");
    assert_eq!(std::fs::read_to_string(&b).unwrap(), "bee\n");

    // The tracker can render the turn as a unified diff.
    let diff = fixture.tracker.generate_unified_diff().unwrap();
    assert!(diff.contains("+v2"));

    let operations = fixture.tracker.undo().unwrap();
    assert!(!operations.is_empty());
    assert!(!a.exists());
    assert!(!b.exists());
    assert!(fixture.tracker.locked_paths().is_empty());
}

#[tokio::test]
async fn shell_and_read_mix_respects_guards() {
    let fixture = fixture();
    std::fs::write(fixture.dir.path().join("data.txt"), "payload\n").unwrap();

    let outcome = fixture
        .scheduler
        .run_batch(
            fixture.turn.clone(),
            fixture.tracker.clone(),
            "turn-1",
            vec![
                function_call("read_file", "c1", json!({"path": "data.txt"})),
                function_call(
                    "run_terminal_cmd",
                    "c2",
                    json!({"command": "echo from-shell"}),
                ),
                function_call("read_file", "c3", json!({"path": "data.txt"})),
            ],
        )
        .await;

    assert!(outcome.fatal.is_none());
    let ids: Vec<&str> = outcome
        .results
        .iter()
        .map(|block| block.tool_use_id.as_str())
        .collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
    assert!(outcome.results[1].content.contains("from-shell"));
}

#[tokio::test]
async fn interrupted_batch_recovers_for_next_turn() {
    let fixture = fixture();
    fixture.interrupt.arm();

    let trigger = {
        let interrupt = fixture.interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            interrupt.trigger();
        })
    };

    let outcome = fixture
        .scheduler
        .run_batch(
            fixture.turn.clone(),
            fixture.tracker.clone(),
            "turn-1",
            vec![function_call(
                "run_terminal_cmd",
                "c1",
                json!({"command": "sleep 30"}),
            )],
        )
        .await;
    trigger.await.unwrap();

    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.results[0].is_error);
    assert!(outcome.results[0].content.contains("cancelled"));

    // Latch cleared, next batch proceeds normally.
    fixture.interrupt.clear();
    let tracker = Arc::new(TurnDiffTracker::new(2));
    let next = fixture
        .scheduler
        .run_batch(
            fixture.turn.clone(),
            tracker,
            "turn-2",
            vec![function_call(
                "run_terminal_cmd",
                "c2",
                json!({"command": "echo recovered"}),
            )],
        )
        .await;
    assert!(next.fatal.is_none());
    assert!(next.results[0].content.contains("recovered"));
}

#[tokio::test]
async fn router_to_scheduler_round_trip() {
    let fixture = fixture();
    std::fs::write(fixture.dir.path().join("x.txt"), "hello router\n").unwrap();

    let router = ToolRouter::new(fixture.registry.clone());
    let assistant = Message::new(
        Role::Assistant,
        vec![
            ContentBlock::text("let me check"),
            ContentBlock::ToolUse {
                id: "c1".to_string(),
                name: "read_file".to_string(),
                input: json!({"path": "x.txt"}),
            },
        ],
    );
    let calls = router.parse_message(&assistant);
    assert_eq!(calls.len(), 1);
    assert!(router.supports_parallel("read_file"));

    let outcome = fixture
        .scheduler
        .run_batch(fixture.turn.clone(), fixture.tracker.clone(), "turn-1", calls)
        .await;
    assert!(outcome.results[0].content.contains("hello router"));
}
