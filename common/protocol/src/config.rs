//! Configuration sections for the execution core.
//!
//! All sections deserialize from the TOML config file with serde defaults, so
//! a missing section or field falls back to the documented default.

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Sandbox restriction levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxPolicy {
    None,
    #[default]
    Restricted,
    Strict,
}

/// When to request user approval before a side-effecting operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalPolicy {
    Never,
    #[default]
    OnRequest,
    OnWrite,
    Always,
}

/// Model identity and context window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_context_tokens")]
    pub context_tokens: u64,
    /// Head-room subtracted from the context window before budgeting.
    #[serde(default = "default_guardrail_tokens")]
    pub guardrail_tokens: u64,
}

impl ModelConfig {
    /// Usable window after the guardrail reserve.
    pub fn window_tokens(&self) -> u64 {
        self.context_tokens.saturating_sub(self.guardrail_tokens)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            context_tokens: default_context_tokens(),
            guardrail_tokens: default_guardrail_tokens(),
        }
    }
}

/// Automatic history compaction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default = "default_true")]
    pub auto: bool,
    #[serde(default = "default_keep_last_turns")]
    pub keep_last_turns: u32,
    #[serde(default = "default_target_tokens")]
    pub target_tokens: u64,
    #[serde(default = "default_pin_budget_tokens")]
    pub pin_budget_tokens: u64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            auto: true,
            keep_last_turns: default_keep_last_turns(),
            target_tokens: default_target_tokens(),
            pin_budget_tokens: default_pin_budget_tokens(),
        }
    }
}

/// Per-tool-result size limits enforced in context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolLimits {
    #[serde(default = "default_max_tool_tokens")]
    pub max_tool_tokens: u64,
    #[serde(default = "default_max_stdout_bytes")]
    pub max_stdout_bytes: u64,
    #[serde(default = "default_max_lines")]
    pub max_lines: u64,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            max_tool_tokens: default_max_tool_tokens(),
            max_stdout_bytes: default_max_stdout_bytes(),
            max_lines: default_max_lines(),
        }
    }
}

/// Execution policy gates consulted by handlers before side effects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub sandbox: SandboxPolicy,
    #[serde(default)]
    pub approval: ApprovalPolicy,
    /// If non-empty, write targets must resolve under one of these paths.
    #[serde(default)]
    pub allowed_paths: Vec<PathBuf>,
    /// Literal substrings denied in full command lines.
    #[serde(default)]
    pub blocked_commands: Vec<String>,
    /// Upper cap coerced onto any handler-supplied timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
}

/// Definition of an MCP server to launch over stdio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<f64>,
}

/// MCP section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub definitions: Vec<McpServerConfig>,
}

/// Tools section wrapper (`[tools.limits]`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub limits: ToolLimits,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub compaction: CompactionConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub mcp: McpConfig,
}

impl Config {
    /// Validate cross-field constraints not expressible in serde.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.context_tokens == 0 {
            return Err("model.context_tokens must be positive".to_string());
        }
        if self.compaction.target_tokens == 0 {
            return Err("compaction.target_tokens must be positive".to_string());
        }
        if let Some(timeout) = self.execution.timeout_seconds {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(format!(
                    "execution.timeout_seconds must be positive, got {timeout}"
                ));
            }
        }
        if let Some(ttl) = self
            .mcp
            .definitions
            .iter()
            .filter_map(|d| d.ttl_seconds)
            .find(|ttl| !ttl.is_finite() || *ttl <= 0.0)
        {
            return Err(format!("mcp ttl_seconds must be positive, got {ttl}"));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_model_name() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_context_tokens() -> u64 {
    200_000
}

fn default_guardrail_tokens() -> u64 {
    20_000
}

fn default_keep_last_turns() -> u32 {
    4
}

fn default_target_tokens() -> u64 {
    110_000
}

fn default_pin_budget_tokens() -> u64 {
    2_048
}

fn default_max_tool_tokens() -> u64 {
    4_000
}

fn default_max_stdout_bytes() -> u64 {
    131_072
}

fn default_max_lines() -> u64 {
    800
}

#[cfg(test)]
#[path = "config.test.rs"]
mod tests;
