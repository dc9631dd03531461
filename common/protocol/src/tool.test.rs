use super::*;
use pretty_assertions::assert_eq;

#[test]
fn spec_wire_shape() {
    let spec = ToolSpec::new(
        "read_file",
        "Read a file",
        JsonSchema::Object {
            properties: BTreeMap::from([("path".to_string(), JsonSchema::string("File path"))]),
            required: Some(vec!["path".to_string()]),
            additional_properties: Some(false),
        },
    )
    .with_parallel(true);

    let wire = spec.to_wire();
    assert_eq!(wire["name"], "read_file");
    assert_eq!(wire["input_schema"]["type"], "object");
    assert_eq!(wire["input_schema"]["properties"]["path"]["type"], "string");
    assert!(spec.supports_parallel);
}

#[test]
fn sanitize_normalizes_integer() {
    let raw = serde_json::json!({
        "type": "object",
        "properties": {
            "count": {"type": "integer", "description": "how many"}
        }
    });
    let clean = sanitize_schema(&raw).unwrap();
    assert_eq!(clean["properties"]["count"]["type"], "number");
    assert_eq!(clean["properties"]["count"]["description"], "how many");
}

#[test]
fn sanitize_fills_missing_properties_and_items() {
    let raw = serde_json::json!({
        "type": "object",
        "properties": {
            "tags": {"type": "array"},
            "nested": {"type": "object"}
        }
    });
    let clean = sanitize_schema(&raw).unwrap();
    assert_eq!(clean["properties"]["tags"]["items"]["type"], "string");
    assert!(clean["properties"]["nested"]["properties"].is_object());
}

#[test]
fn sanitize_keeps_deep_acyclic_chains_intact() {
    // Deep but under the ceiling: every level survives, nothing is stubbed.
    let mut schema = serde_json::json!({"type": "string", "description": "leaf"});
    for _ in 0..40 {
        schema = serde_json::json!({
            "type": "object",
            "properties": {"inner": schema}
        });
    }
    let clean = sanitize_schema(&schema).unwrap();
    let mut node = &clean;
    for _ in 0..40 {
        node = &node["properties"]["inner"];
    }
    assert_eq!(node["type"], "string");
    assert_eq!(node["description"], "leaf");
    assert!(!serde_json::to_string(&clean)
        .unwrap()
        .contains("recursive reference"));
}

#[test]
fn unbounded_nesting_is_a_hard_error() {
    // Nesting past the ceiling with no cycle is rejected, not stubbed.
    let mut schema = serde_json::json!({"type": "string"});
    for _ in 0..100 {
        schema = serde_json::json!({
            "type": "object",
            "properties": {"inner": schema}
        });
    }
    let err = sanitize_schema(&schema).unwrap_err();
    assert_eq!(err, SchemaError::TooDeep { max_depth: 64 });
}

#[test]
fn payload_kind_routing() {
    let function = ToolPayload::Function {
        raw_arguments: "{}".to_string(),
    };
    assert_eq!(function.kind(), ToolKind::Function);

    let mcp = ToolPayload::Mcp {
        server: "fs".to_string(),
        tool: "read".to_string(),
        raw_arguments: "{}".to_string(),
    };
    assert_eq!(mcp.kind(), ToolKind::Mcp);

    let shell = ToolPayload::LocalShell {
        action: LocalShellAction::Exec {
            command: vec!["/bin/echo".to_string()],
            working_directory: None,
            timeout_ms: None,
        },
    };
    assert_eq!(shell.kind(), ToolKind::UnifiedExec);
}

#[test]
fn output_result_block_carries_call_id() {
    let block = ToolOutput::text("done").into_result_block("call-7");
    assert_eq!(block.tool_use_id, "call-7");
    assert_eq!(block.content, "done");
    assert!(!block.is_error);

    let err = ToolOutput::error("nope").into_result_block("call-8");
    assert!(err.is_error);
}

#[test]
fn mcp_result_renders_text() {
    let result = CallToolResult {
        content: vec![
            McpContentBlock::Text {
                text: "hello".to_string(),
            },
            McpContentBlock::Resource {
                uri: "file:///tmp/x".to_string(),
            },
        ],
        is_error: false,
    };
    let output = ToolOutput::Mcp { result };
    assert!(output.is_success());
    assert_eq!(output.content_text(), "hello\n[resource: file:///tmp/x]");
}

#[test]
fn truncated_flag_read_from_metadata() {
    let output =
        ToolOutput::text("body").with_metadata(serde_json::json!({"truncated": true}));
    assert!(output.is_truncated());
    assert!(!ToolOutput::text("body").is_truncated());
}
