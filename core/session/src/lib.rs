//! Context session: bounded message history under a token budget.
//!
//! The session owns history, pins, the token meter, and the MCP pool. Older
//! turns are compacted into a generated summary once the running total
//! crosses the configured target; pinned content survives compaction until
//! its TTL elapses.

pub mod compaction;
pub mod history;
pub mod meter;
pub mod pins;
pub mod session;
pub mod summarizer;

pub use compaction::CompactionOutcome;
pub use history::MessageHistory;
pub use history::MessageRecord;
pub use meter::TokenMeter;
pub use pins::Pin;
pub use pins::PinStore;
pub use session::Session;
pub use session::SessionError;
pub use summarizer::RuleBasedSummarizer;
pub use summarizer::Summarizer;
