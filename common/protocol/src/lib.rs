//! Protocol types for the cradle agent execution core.
//!
//! This crate provides the foundational types shared across the workspace:
//! - Tool specs, payloads, calls and outputs
//! - Message and content-block shapes for session history
//! - Session and telemetry events
//! - Configuration sections loaded from the config file

pub mod config;
pub mod event;
pub mod message;
pub mod tool;

pub use config::CompactionConfig;
pub use config::Config;
pub use config::ExecutionConfig;
pub use config::McpServerConfig;
pub use config::ModelConfig;
pub use config::ToolLimits;
pub use event::SessionEvent;
pub use event::TelemetryEvent;
pub use message::ContentBlock;
pub use message::Message;
pub use message::MessageKind;
pub use message::Role;
pub use tool::CallToolResult;
pub use tool::JsonSchema;
pub use tool::LocalShellAction;
pub use tool::McpContentBlock;
pub use tool::SchemaError;
pub use tool::ToolCall;
pub use tool::ToolKind;
pub use tool::ToolOutput;
pub use tool::ToolPayload;
pub use tool::ToolResultBlock;
pub use tool::ToolSpec;
pub use tool::sanitize_schema;
