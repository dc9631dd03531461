//! Tool dispatch pipeline, concurrent scheduler, turn diff tracker, and
//! execution policy.
//!
//! The flow for one assistant turn: the router parses tool-use blocks into
//! [`ToolCall`](cradle_protocol::ToolCall)s, the scheduler runs them under a
//! reader/writer discipline, each call dispatches through the registry to a
//! handler, handlers consult the execution policy and record file effects in
//! the turn diff tracker, and outputs come back as wire tool-result blocks.

pub mod error;
#[cfg(test)]
pub(crate) mod testutil;
pub mod format;
pub mod handler;
pub mod handlers;
pub mod interrupt;
pub mod policy;
pub mod registry;
pub mod router;
pub mod scheduler;
pub mod telemetry;
pub mod tracker;

pub use error::Severity;
pub use error::ToolError;
pub use handler::ApprovalRequester;
pub use handler::ToolHandler;
pub use handler::ToolInvocation;
pub use handler::TurnContext;
pub use interrupt::InterruptManager;
pub use policy::ExecutionPolicy;
pub use registry::ToolRegistry;
pub use registry::ToolRegistryBuilder;
pub use router::ToolRouter;
pub use scheduler::BatchOutcome;
pub use scheduler::TurnScheduler;
pub use telemetry::TelemetrySink;
pub use tracker::FileAction;
pub use tracker::FileEdit;
pub use tracker::TurnDiffTracker;
