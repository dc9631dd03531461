use cradle_protocol::Role;

use super::*;

fn tiny_config() -> Config {
    let mut config = Config::default();
    config.model.context_tokens = 3_000;
    config.model.guardrail_tokens = 100;
    config.compaction.target_tokens = 300;
    config.compaction.keep_last_turns = 1;
    config
}

/// Repetitive turn text: compacts down to a couple of summary lines.
fn turn_text() -> String {
    format!("the goal is to ship\n{}", "filler line\n".repeat(30))
}

fn assistant_with_tool(id: &str) -> Message {
    Message::new(
        Role::Assistant,
        vec![
            ContentBlock::text("running a tool"),
            ContentBlock::ToolUse {
                id: id.to_string(),
                name: "read_file".to_string(),
                input: serde_json::json!({"path": "x"}),
            },
        ],
    )
}

fn result(id: &str) -> ToolResultBlock {
    ToolResultBlock {
        tool_use_id: id.to_string(),
        content: "ok".to_string(),
        is_error: false,
    }
}

#[tokio::test]
async fn turn_lifecycle_emits_events() {
    let mut session = Session::new(Config::default());
    session.register_system_prompt("be helpful");
    let turn_id = session.submit_user_turn("hello");
    assert_eq!(turn_id, 1);
    session
        .append_assistant(Message::text(Role::Assistant, "hi there"))
        .unwrap();
    session.complete_turn("done");

    assert!(matches!(
        session.try_next_event(),
        Some(SessionEvent::TaskStarted { turn_id: 1 })
    ));
    assert!(matches!(
        session.try_next_event(),
        Some(SessionEvent::AssistantMessage { .. })
    ));
    assert!(matches!(
        session.try_next_event(),
        Some(SessionEvent::TaskComplete { .. })
    ));
}

#[tokio::test]
async fn tool_results_enforce_call_id_match() {
    let mut session = Session::new(Config::default());
    session.submit_user_turn("go");
    session.append_assistant(assistant_with_tool("c1")).unwrap();
    assert_eq!(session.outstanding_tool_uses(), ["c1"]);

    assert!(session.append_tool_results(vec![result("other")]).is_err());
    session.append_tool_results(vec![result("c1")]).unwrap();
    assert!(session.outstanding_tool_uses().is_empty());
}

#[tokio::test]
async fn compaction_defers_while_tools_in_flight() {
    let mut session = Session::new(tiny_config());
    for _ in 0..10 {
        session.submit_user_turn(turn_text());
        session
            .append_assistant(Message::text(Role::Assistant, turn_text()))
            .unwrap();
    }

    session.begin_tool_batch();
    assert!(session.compact_if_needed(true, None).await.is_none());
    let tokens_during = session.total_tokens();

    session.end_tool_batch().await;
    // The deferred compaction ran when the counter drained.
    assert!(session.total_tokens() < tokens_during);
    let compacted = session.telemetry().counter("compact_events");
    assert_eq!(compacted, 1);
}

#[tokio::test]
async fn snapshot_auto_compacts_and_keeps_pins() {
    let mut session = Session::new(tiny_config());
    session.register_system_prompt("sys");
    session.add_pin("standards", None, 10).unwrap();
    for _ in 0..10 {
        session.submit_user_turn(turn_text());
        session
            .append_assistant(Message::text(Role::Assistant, turn_text()))
            .unwrap();
    }

    let snapshot = session.snapshot_for_model().await;
    let target = session.config().compaction.target_tokens;
    assert!(session.total_tokens() <= target);

    let texts: Vec<String> = snapshot
        .iter()
        .flat_map(|m| m.content.iter().filter_map(ContentBlock::text_fragment))
        .map(String::from)
        .collect();
    assert!(texts.iter().any(|t| t.contains("standards")));
    assert!(texts
        .iter()
        .any(|t| t.starts_with("Previous conversation summary:")));

    // Compaction emitted its event.
    let mut saw_compaction = false;
    while let Some(event) = session.try_next_event() {
        if matches!(event, SessionEvent::Compaction { .. }) {
            saw_compaction = true;
        }
    }
    assert!(saw_compaction);
}

#[tokio::test]
async fn expired_pins_do_not_survive() {
    let mut session = Session::new(Config::default());
    session
        .add_pin(
            "short lived",
            Some(std::time::Duration::from_millis(0)),
            0,
        )
        .unwrap();
    session.submit_user_turn("hi");

    let snapshot = session.snapshot_for_model().await;
    let texts: Vec<String> = snapshot
        .iter()
        .flat_map(|m| m.content.iter().filter_map(ContentBlock::text_fragment))
        .map(String::from)
        .collect();
    assert!(!texts.iter().any(|t| t.contains("short lived")));
    assert_eq!(session.pin_count(), 0);
}

#[tokio::test]
async fn fail_turn_clears_pending_tool_uses() {
    let mut session = Session::new(Config::default());
    session.submit_user_turn("go");
    session.append_assistant(assistant_with_tool("c1")).unwrap();
    assert_eq!(session.outstanding_tool_uses().len(), 1);

    session.fail_turn("sandbox violation");
    assert!(session.outstanding_tool_uses().is_empty());

    // Subsequent turns proceed normally.
    session.submit_user_turn("again");
    session
        .append_assistant(Message::text(Role::Assistant, "sure"))
        .unwrap();
}

#[tokio::test]
async fn close_shuts_down_pool() {
    let session = Session::new(Config::default());
    // No servers configured; close is a quiet no-op.
    session.close().await;
}
