//! Shell command execution for tool handlers.
//!
//! Foreground commands run with a timeout that kills the whole process group
//! on expiry; background commands detach into a registry and stream their
//! output to sidecar log files.

mod background;
mod command;
mod executor;
mod process;

pub use background::BackgroundJob;
pub use background::BackgroundRegistry;
pub use command::CommandResult;
pub use command::ExecParams;
pub use executor::ShellExecutor;
