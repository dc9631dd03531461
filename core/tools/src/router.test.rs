use std::sync::Arc;

use serde_json::json;

use cradle_protocol::ContentBlock;
use cradle_protocol::Message;
use cradle_protocol::Role;

use super::*;

fn router() -> ToolRouter {
    ToolRouter::new(Arc::new(ToolRegistry::builder().build()))
}

#[test]
fn parse_message_preserves_block_order() {
    let message = Message::new(
        Role::Assistant,
        vec![
            ContentBlock::text("let me look"),
            ContentBlock::ToolUse {
                id: "call-1".to_string(),
                name: "read_file".to_string(),
                input: json!({"path": "a.txt"}),
            },
            ContentBlock::ToolUse {
                id: "call-2".to_string(),
                name: "fs/read".to_string(),
                input: json!({"path": "b.txt"}),
            },
        ],
    );
    let calls = router().parse_message(&message);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].call_id, "call-1");
    assert_eq!(calls[1].call_id, "call-2");
    assert!(matches!(
        calls[0].payload,
        ToolPayload::Function { .. }
    ));
    match &calls[1].payload {
        ToolPayload::Mcp { server, tool, .. } => {
            assert_eq!(server, "fs");
            assert_eq!(tool, "read");
        }
        other => panic!("expected MCP payload, got {other:?}"),
    }
}

#[test]
fn slash_rule_is_exactly_one() {
    let single = build_call("srv/tool", "c1", &json!({}));
    assert!(matches!(single.payload, ToolPayload::Mcp { .. }));

    let none = build_call("plain_tool", "c2", &json!({}));
    assert!(matches!(none.payload, ToolPayload::Function { .. }));

    let several = build_call("a/b/c", "c3", &json!({}));
    assert!(matches!(several.payload, ToolPayload::Function { .. }));

    let leading = build_call("/tool", "c4", &json!({}));
    assert!(matches!(leading.payload, ToolPayload::Function { .. }));
}

#[test]
fn tool_use_block_parses() {
    let block = json!({
        "type": "tool_use",
        "id": "call-9",
        "name": "read_file",
        "input": {"path": "x"}
    });
    let call = ToolRouter::build_tool_call(&block).unwrap().unwrap();
    assert_eq!(call.call_id, "call-9");
    assert_eq!(call.tool_name, "read_file");
}

#[test]
fn tool_use_missing_id_is_protocol_error() {
    let block = json!({"type": "tool_use", "name": "read_file", "input": {}});
    let err = ToolRouter::build_tool_call(&block).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.kind(), "protocol");
}

#[test]
fn local_shell_accepts_call_id_or_id() {
    let action = json!({"type": "exec", "command": ["ls"]});

    let with_call_id = json!({"type": "local_shell_call", "call_id": "c1", "action": action});
    let call = ToolRouter::build_tool_call(&with_call_id).unwrap().unwrap();
    assert_eq!(call.call_id, "c1");
    assert_eq!(call.tool_name, "run_terminal_cmd");
    assert!(matches!(call.payload, ToolPayload::LocalShell { .. }));

    let with_id = json!({"type": "local_shell_call", "id": "c2", "action": action});
    let call = ToolRouter::build_tool_call(&with_id).unwrap().unwrap();
    assert_eq!(call.call_id, "c2");

    let with_neither = json!({"type": "local_shell_call", "action": action});
    let err = ToolRouter::build_tool_call(&with_neither).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn custom_tool_call_parses() {
    let block = json!({
        "type": "custom_tool_call",
        "id": "c5",
        "name": "my_tool",
        "input": "freeform text"
    });
    let call = ToolRouter::build_tool_call(&block).unwrap().unwrap();
    assert_eq!(call.tool_name, "my_tool");
    match call.payload {
        ToolPayload::Custom { raw_input, .. } => assert_eq!(raw_input, "freeform text"),
        other => panic!("expected custom payload, got {other:?}"),
    }
}

#[test]
fn non_tool_blocks_are_skipped() {
    let text = json!({"type": "text", "text": "hello"});
    assert!(ToolRouter::build_tool_call(&text).unwrap().is_none());
}

#[test]
fn unknown_parallel_lookup_defaults_false() {
    assert!(!router().supports_parallel("anything"));
}
