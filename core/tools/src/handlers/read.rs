//! File read handler.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use cradle_protocol::JsonSchema;
use cradle_protocol::ToolKind;
use cradle_protocol::ToolOutput;
use cradle_protocol::ToolSpec;

use crate::error::Result;
use crate::error::ToolError;
use crate::format::truncate_head_tail;
use crate::handler::ToolHandler;
use crate::handler::ToolInvocation;
use crate::tracker::content_hash;

pub fn spec() -> ToolSpec {
    let mut properties = std::collections::BTreeMap::new();
    properties.insert(
        "path".to_string(),
        JsonSchema::string("Relative or absolute path to a file"),
    );
    properties.insert(
        "offset".to_string(),
        JsonSchema::number("1-based line number to start reading from"),
    );
    properties.insert(
        "limit".to_string(),
        JsonSchema::number("Number of lines to read"),
    );
    ToolSpec::new(
        "read_file",
        "Read a file from the filesystem, optionally windowed to a line range.",
        JsonSchema::Object {
            properties,
            required: Some(vec!["path".to_string()]),
            additional_properties: Some(false),
        },
    )
    .with_parallel(true)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadInput {
    path: String,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

/// Reads files and records the observed content hash for later conflict
/// detection.
#[derive(Debug, Default)]
pub struct ReadFileHandler;

#[async_trait]
impl ToolHandler for ReadFileHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        let raw = invocation
            .raw_arguments()
            .ok_or_else(|| ToolError::validation("read_file call carries no arguments"))?;
        let input: ReadInput = serde_json::from_str(raw)?;
        if let Some(offset) = input.offset {
            if offset == 0 {
                return Err(ToolError::validation("offset is 1-based and must be >= 1"));
            }
        }

        let path = invocation.turn.resolve_path(&input.path);
        if invocation.cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => {
                    ToolError::not_found(format!("file {} does not exist", path.display()))
                }
                _ => ToolError::from(err),
            })?;
        let content = String::from_utf8_lossy(&bytes).into_owned();

        invocation
            .tracker
            .record_read(&path, &invocation.tool_name, Some(content_hash(&content)));

        let windowed = apply_window(&content, input.offset, input.limit);
        let formatted = truncate_head_tail(&windowed);
        Ok(ToolOutput::Function {
            content: formatted.content,
            success: true,
            metadata: Some(json!({"truncated": formatted.truncated})),
        })
    }
}

/// Slice to the requested line window, preserving terminators.
fn apply_window(content: &str, offset: Option<usize>, limit: Option<usize>) -> String {
    if offset.is_none() && limit.is_none() {
        return content.to_string();
    }
    let start = offset.unwrap_or(1).saturating_sub(1);
    let lines = content.split_inclusive('\n');
    match limit {
        Some(limit) => lines.skip(start).take(limit).collect(),
        None => lines.skip(start).collect(),
    }
}

#[cfg(test)]
#[path = "read.test.rs"]
mod tests;
