use cradle_protocol::ContentBlock;
use pretty_assertions::assert_eq;

use super::*;

fn history() -> MessageHistory {
    MessageHistory::new(TokenMeter::new())
}

fn assistant_with_tools(ids: &[&str]) -> Message {
    let mut content = vec![ContentBlock::text("working")];
    for id in ids {
        content.push(ContentBlock::ToolUse {
            id: id.to_string(),
            name: "read_file".to_string(),
            input: serde_json::json!({"path": "x"}),
        });
    }
    Message::new(Role::Assistant, content)
}

fn result(id: &str) -> ToolResultBlock {
    ToolResultBlock {
        tool_use_id: id.to_string(),
        content: format!("result for {id}"),
        is_error: false,
    }
}

#[test]
fn turns_increment_on_user_messages() {
    let mut history = history();
    history.register_system("be helpful");
    assert_eq!(history.register_user("first"), 1);
    assert_eq!(history.register_user("second"), 2);
    assert_eq!(history.turn_counter(), 2);
}

#[test]
fn system_messages_stay_in_front() {
    let mut history = history();
    history.register_user("hello");
    history.register_system("late system");
    let snapshot = history.snapshot_for_model(None);
    assert_eq!(snapshot[0].role, Role::System);
}

#[test]
fn tool_results_must_match_outstanding_uses() {
    let mut history = history();
    history.register_user("go");
    history
        .register_assistant(assistant_with_tools(&["c1", "c2"]))
        .unwrap();
    assert_eq!(history.outstanding_tool_uses(), ["c1", "c2"]);

    // Unknown id rejected.
    let err = history
        .append_tool_results(vec![result("nope")])
        .unwrap_err();
    assert!(err.to_string().contains("unknown call id"));

    // Duplicates rejected.
    let err = history
        .append_tool_results(vec![result("c1"), result("c1")])
        .unwrap_err();
    assert!(err.to_string().contains("duplicate"));

    history
        .append_tool_results(vec![result("c1"), result("c2")])
        .unwrap();
    assert!(history.outstanding_tool_uses().is_empty());
}

#[test]
fn next_assistant_requires_matched_tools() {
    let mut history = history();
    history.register_user("go");
    history
        .register_assistant(assistant_with_tools(&["c1"]))
        .unwrap();

    let err = history
        .register_assistant(Message::text(Role::Assistant, "too soon"))
        .unwrap_err();
    assert!(err.to_string().contains("unmatched tool_use"));

    history.append_tool_results(vec![result("c1")]).unwrap();
    history
        .register_assistant(Message::text(Role::Assistant, "now fine"))
        .unwrap();
}

#[test]
fn wrong_role_rejected() {
    let mut history = history();
    assert!(history
        .register_assistant(Message::text(Role::User, "imposter"))
        .is_err());
}

#[test]
fn tool_hash_dedup_detects_identical_payloads() {
    let mut history = history();
    history.register_user("go");
    history
        .register_assistant(assistant_with_tools(&["c1"]))
        .unwrap();
    history
        .append_tool_results(vec![ToolResultBlock {
            tool_use_id: "c1".to_string(),
            content: "same output".to_string(),
            is_error: false,
        }])
        .unwrap();

    assert!(history.has_tool_hash("same output"));
    assert!(!history.has_tool_hash("different output"));
}

#[test]
fn rollback_removes_current_turn() {
    let mut history = history();
    history.register_system("sys");
    history.register_user("turn one");
    history
        .register_assistant(Message::text(Role::Assistant, "reply one"))
        .unwrap();
    history.register_user("turn two");
    history
        .register_assistant(assistant_with_tools(&["c1"]))
        .unwrap();

    history.rollback_current_turn();
    assert_eq!(history.turn_counter(), 1);
    assert!(history.outstanding_tool_uses().is_empty());
    let texts: Vec<String> = history
        .records()
        .iter()
        .flat_map(|record| record.text_fragments())
        .map(String::from)
        .collect();
    assert!(texts.iter().any(|t| t.contains("turn one")));
    assert!(!texts.iter().any(|t| t.contains("turn two")));
}

#[test]
fn compaction_replaces_older_turns() {
    let mut history = history();
    history.register_system("sys");
    for i in 1..=5 {
        history.register_user(format!("user {i}"));
        history
            .register_assistant(Message::text(Role::Assistant, format!("reply {i}")))
            .unwrap();
    }

    let removed = history.apply_compaction(4, "summary of 1-3");
    assert_eq!(removed, 6);

    let snapshot = history.snapshot_for_model(None);
    assert_eq!(snapshot[0].role, Role::System);
    match &snapshot[1].content[0] {
        ContentBlock::Text { text } => {
            assert!(text.starts_with(SUMMARY_PREFIX));
            assert!(text.contains("summary of 1-3"));
        }
        other => panic!("expected text block, got {other:?}"),
    }
    let texts: Vec<String> = snapshot
        .iter()
        .flat_map(|m| m.content.iter().filter_map(ContentBlock::text_fragment))
        .map(String::from)
        .collect();
    assert!(texts.iter().any(|t| t.contains("user 4")));
    assert!(!texts.iter().any(|t| t.contains("user 2")));
}

#[test]
fn pinned_messages_survive_compaction() {
    let mut history = history();
    history.register_user("old turn");
    history.pin_record(0);
    history.register_user("turn two");
    history.register_user("turn three");

    history.apply_compaction(3, "sum");
    let texts: Vec<String> = history
        .records()
        .iter()
        .flat_map(|record| record.text_fragments())
        .map(String::from)
        .collect();
    assert!(texts.iter().any(|t| t.contains("turn three")));
    assert!(
        texts.iter().any(|t| t.contains("old turn")),
        "pinned record must survive"
    );
    assert!(!texts.iter().any(|t| t.contains("turn two")));
}

#[test]
fn pin_block_rides_after_system_prefix() {
    let mut history = history();
    history.register_system("sys");
    history.register_user("hi");
    let snapshot = history.snapshot_for_model(Some("Pinned context:\nstandards".to_string()));
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot[0].role, Role::System);
    match &snapshot[1].content[0] {
        ContentBlock::Text { text } => assert!(text.contains("standards")),
        other => panic!("expected text block, got {other:?}"),
    }
}

#[test]
fn compact_text_substitutes_tool_output() {
    let mut history = history();
    history.register_user("go");
    history
        .register_assistant(assistant_with_tools(&["c1"]))
        .unwrap();
    history
        .append_tool_results(vec![ToolResultBlock {
            tool_use_id: "c1".to_string(),
            content: "x".repeat(10_000),
            is_error: false,
        }])
        .unwrap();

    let index = history.records().len() - 1;
    let full_tokens = history.records()[index].effective_tokens();
    history.set_compact_text(index, "[digest]".to_string());
    let compact_tokens = history.records()[index].effective_tokens();
    assert!(compact_tokens < full_tokens);

    let snapshot = history.snapshot_for_model(None);
    match &snapshot.last().unwrap().content[0] {
        ContentBlock::ToolResult { content, .. } => assert_eq!(content, "[digest]"),
        other => panic!("expected tool result, got {other:?}"),
    }

    history.clear_compact_text(index);
    assert_eq!(history.records()[index].effective_tokens(), full_tokens);
}
