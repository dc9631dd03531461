use super::*;

#[test]
fn tool_use_ids_in_order() {
    let message = Message::new(
        Role::Assistant,
        vec![
            ContentBlock::text("working on it"),
            ContentBlock::ToolUse {
                id: "call-1".to_string(),
                name: "read_file".to_string(),
                input: serde_json::json!({"path": "a.txt"}),
            },
            ContentBlock::ToolUse {
                id: "call-2".to_string(),
                name: "run_terminal_cmd".to_string(),
                input: serde_json::json!({"command": "ls", "is_background": false}),
            },
        ],
    );
    assert_eq!(message.tool_use_ids(), vec!["call-1", "call-2"]);
    assert!(message.tool_result_ids().is_empty());
}

#[test]
fn text_fragments() {
    let text = ContentBlock::text("hello");
    assert_eq!(text.text_fragment(), Some("hello"));

    let result = ContentBlock::ToolResult {
        tool_use_id: "call-1".to_string(),
        content: "output".to_string(),
        is_error: false,
    };
    assert_eq!(result.text_fragment(), Some("output"));

    let tool_use = ContentBlock::ToolUse {
        id: "call-1".to_string(),
        name: "x".to_string(),
        input: serde_json::Value::Null,
    };
    assert_eq!(tool_use.text_fragment(), None);
}

#[test]
fn serde_round_trip() {
    let message = Message::text(Role::User, "hi");
    let encoded = serde_json::to_string(&message).unwrap();
    let decoded: Message = serde_json::from_str(&encoded).unwrap();
    assert_eq!(message, decoded);
}
