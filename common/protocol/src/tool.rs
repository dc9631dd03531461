//! Tool-facing protocol types.
//!
//! Defines the specs shown to the model, the payloads routed to handlers,
//! and the outputs converted back into wire tool-result blocks.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

/// Maximum recursion depth accepted when sanitizing foreign schemas.
///
/// Cycles are caught by identity before this limit matters; input that
/// nests deeper than this without ever cycling is pathological and rejected.
const MAX_SCHEMA_DEPTH: usize = 64;

/// Failure while sanitizing a foreign schema.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema nesting exceeds {max_depth} levels without cycling")]
    TooDeep { max_depth: usize },
}

/// Kinds of tools supported by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Function,
    UnifiedExec,
    Mcp,
    Custom,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Function => "function",
            ToolKind::UnifiedExec => "unified_exec",
            ToolKind::Mcp => "mcp",
            ToolKind::Custom => "custom",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully realized parameter schema.
///
/// Every object carries `properties` and every array carries `items`; the
/// model API rejects under-specified schemas, so the type makes the complete
/// form the only representable one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonSchema {
    Boolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// `integer` inputs are normalized to `number` during sanitization.
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Array {
        items: Box<JsonSchema>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Object {
        properties: BTreeMap<String, JsonSchema>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        required: Option<Vec<String>>,
        #[serde(
            default,
            rename = "additionalProperties",
            skip_serializing_if = "Option::is_none"
        )]
        additional_properties: Option<bool>,
    },
}

impl JsonSchema {
    /// Shorthand for a string property with a description.
    pub fn string(description: impl Into<String>) -> Self {
        JsonSchema::String {
            description: Some(description.into()),
        }
    }

    pub fn number(description: impl Into<String>) -> Self {
        JsonSchema::Number {
            description: Some(description.into()),
        }
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        JsonSchema::Boolean {
            description: Some(description.into()),
        }
    }

    /// Serialize into the JSON form sent to the model.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({"type": "object", "properties": {}}))
    }
}

/// Specification for a tool exposed to the model.
///
/// Created once at registry build time and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// Parameter schema in fully realized form.
    pub parameters: JsonSchema,
    /// Whether this tool may run concurrently with other parallel-safe tools.
    #[serde(default)]
    pub supports_parallel: bool,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: JsonSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            supports_parallel: false,
        }
    }

    pub fn with_parallel(mut self, supports_parallel: bool) -> Self {
        self.supports_parallel = supports_parallel;
        self
    }

    /// Render the spec as the wire JSON shown to the model.
    pub fn to_wire(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.parameters.to_value(),
        })
    }
}

/// Sanitize a foreign (typically MCP-supplied) JSON schema into the fully
/// realized form the model API accepts.
///
/// - objects gain an empty `properties` map when absent
/// - arrays gain a string-stub `items` when absent
/// - `integer` is normalized to `number`
/// - cycles, tracked by sub-object identity along the recursion path, are
///   replaced with a string stub describing the recursive reference
/// - recursion past [`MAX_SCHEMA_DEPTH`] without a detected cycle is a hard
///   error
pub fn sanitize_schema(schema: &Value) -> Result<Value, SchemaError> {
    let mut visited: Vec<*const Value> = Vec::new();
    sanitize_visited(schema, &mut visited)
}

fn recursion_stub() -> Value {
    json!({"type": "string", "description": "recursive reference"})
}

fn sanitize_visited(
    schema: &Value,
    visited: &mut Vec<*const Value>,
) -> Result<Value, SchemaError> {
    // A sub-object already on the recursion path is a cycle: stub it at the
    // point of repetition rather than expanding it again.
    let identity = schema as *const Value;
    if visited.contains(&identity) {
        return Ok(recursion_stub());
    }
    if visited.len() >= MAX_SCHEMA_DEPTH {
        return Err(SchemaError::TooDeep {
            max_depth: MAX_SCHEMA_DEPTH,
        });
    }
    visited.push(identity);
    let result = sanitize_node(schema, visited);
    visited.pop();
    result
}

fn sanitize_node(
    schema: &Value,
    visited: &mut Vec<*const Value>,
) -> Result<Value, SchemaError> {
    let obj = match schema.as_object() {
        Some(obj) => obj,
        None => return Ok(recursion_stub()),
    };

    let ty = obj.get("type").and_then(Value::as_str).unwrap_or("object");
    let out = match ty {
        "boolean" | "string" | "number" => {
            let mut out = serde_json::Map::new();
            out.insert("type".into(), Value::String(ty.to_string()));
            copy_description(obj, &mut out);
            Value::Object(out)
        }
        "integer" => {
            let mut out = serde_json::Map::new();
            out.insert("type".into(), Value::String("number".into()));
            copy_description(obj, &mut out);
            Value::Object(out)
        }
        "array" => {
            let items = match obj.get("items") {
                Some(items) => sanitize_visited(items, visited)?,
                None => json!({"type": "string"}),
            };
            let mut out = serde_json::Map::new();
            out.insert("type".into(), Value::String("array".into()));
            out.insert("items".into(), items);
            copy_description(obj, &mut out);
            Value::Object(out)
        }
        // Unknown types degrade to object; the model rejects anything else.
        _ => {
            let mut properties = serde_json::Map::new();
            if let Some(props) = obj.get("properties").and_then(Value::as_object) {
                for (key, sub) in props {
                    properties.insert(key.clone(), sanitize_visited(sub, visited)?);
                }
            }
            let mut out = serde_json::Map::new();
            out.insert("type".into(), Value::String("object".into()));
            out.insert("properties".into(), Value::Object(properties));
            if let Some(required) = obj.get("required").and_then(Value::as_array) {
                out.insert("required".into(), Value::Array(required.clone()));
            }
            if let Some(additional) = obj.get("additionalProperties").and_then(Value::as_bool) {
                out.insert("additionalProperties".into(), Value::Bool(additional));
            }
            copy_description(obj, &mut out);
            Value::Object(out)
        }
    };
    Ok(out)
}

fn copy_description(from: &serde_json::Map<String, Value>, to: &mut serde_json::Map<String, Value>) {
    if let Some(desc) = from.get("description").and_then(Value::as_str) {
        to.insert("description".into(), Value::String(desc.to_string()));
    }
}

/// Legacy `local_shell_call` action payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocalShellAction {
    Exec {
        command: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_directory: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
}

/// Payload routed to a tool handler.
///
/// Raw arguments stay unparsed strings until the owning handler decodes them;
/// the router never inspects argument contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolPayload {
    Function {
        raw_arguments: String,
    },
    UnifiedExec {
        raw_arguments: String,
    },
    Mcp {
        server: String,
        tool: String,
        raw_arguments: String,
    },
    LocalShell {
        action: LocalShellAction,
    },
    Custom {
        name: String,
        raw_input: String,
    },
}

impl ToolPayload {
    /// The tool kind this payload routes to.
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolPayload::Function { .. } => ToolKind::Function,
            ToolPayload::UnifiedExec { .. } | ToolPayload::LocalShell { .. } => {
                ToolKind::UnifiedExec
            }
            ToolPayload::Mcp { .. } => ToolKind::Mcp,
            ToolPayload::Custom { .. } => ToolKind::Custom,
        }
    }

    /// Size in bytes of the raw arguments, for telemetry.
    pub fn input_bytes(&self) -> usize {
        match self {
            ToolPayload::Function { raw_arguments }
            | ToolPayload::UnifiedExec { raw_arguments }
            | ToolPayload::Mcp { raw_arguments, .. } => raw_arguments.len(),
            ToolPayload::LocalShell { action } => serde_json::to_string(action)
                .map(|s| s.len())
                .unwrap_or(0),
            ToolPayload::Custom { raw_input, .. } => raw_input.len(),
        }
    }
}

/// A parsed tool call emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    /// Server-issued opaque id; echoed verbatim in the tool result.
    pub call_id: String,
    pub payload: ToolPayload,
}

/// One content block inside an MCP `CallToolResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpContentBlock {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(alias = "mimeType")]
        mime_type: String,
    },
    Resource {
        uri: String,
    },
}

/// Result of an MCP `tools/call` round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<McpContentBlock>,
    #[serde(default, alias = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Flatten text blocks into a single string for the wire result.
    pub fn rendered_text(&self) -> String {
        let mut parts = Vec::new();
        for block in &self.content {
            match block {
                McpContentBlock::Text { text } => parts.push(text.clone()),
                McpContentBlock::Image { mime_type, .. } => {
                    parts.push(format!("[image: {mime_type}]"));
                }
                McpContentBlock::Resource { uri } => parts.push(format!("[resource: {uri}]")),
            }
        }
        parts.join("\n")
    }
}

/// Output of a tool handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutput {
    Function {
        content: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },
    Mcp {
        result: CallToolResult,
    },
}

impl ToolOutput {
    /// Create a successful text output.
    pub fn text(content: impl Into<String>) -> Self {
        ToolOutput::Function {
            content: content.into(),
            success: true,
            metadata: None,
        }
    }

    /// Create an error output.
    pub fn error(message: impl Into<String>) -> Self {
        ToolOutput::Function {
            content: message.into(),
            success: false,
            metadata: None,
        }
    }

    pub fn with_metadata(self, metadata: Value) -> Self {
        match self {
            ToolOutput::Function {
                content, success, ..
            } => ToolOutput::Function {
                content,
                success,
                metadata: Some(metadata),
            },
            other => other,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            ToolOutput::Function { success, .. } => *success,
            ToolOutput::Mcp { result } => !result.is_error,
        }
    }

    /// Rendered textual content, regardless of variant.
    pub fn content_text(&self) -> String {
        match self {
            ToolOutput::Function { content, .. } => content.clone(),
            ToolOutput::Mcp { result } => result.rendered_text(),
        }
    }

    /// Whether the output was truncated (recorded by the formatter).
    pub fn is_truncated(&self) -> bool {
        match self {
            ToolOutput::Function {
                metadata: Some(meta),
                ..
            } => meta
                .get("truncated")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Convert into the wire tool-result block for the given call.
    pub fn into_result_block(self, call_id: impl Into<String>) -> ToolResultBlock {
        let is_error = !self.is_success();
        ToolResultBlock {
            tool_use_id: call_id.into(),
            content: self.content_text(),
            is_error,
        }
    }
}

/// Wire-format tool-result block returned to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

#[cfg(test)]
#[path = "tool.test.rs"]
mod tests;
