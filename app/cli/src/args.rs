//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "cradle", about = "Headless agent execution core", version)]
pub struct Args {
    /// User prompt text for the first turn.
    #[arg(long, conflicts_with = "prompt_file")]
    pub prompt: Option<String>,

    /// Read the user prompt from a file.
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Assistant script: one JSON content-block array per line.
    ///
    /// Stands in for the model connection so the core can be driven
    /// end-to-end without network access.
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Stop after this many assistant turns.
    #[arg(long, default_value_t = 16)]
    pub max_turns: u32,

    /// Comma-separated allowlist of tool names offered to the model.
    #[arg(long, value_delimiter = ',')]
    pub allowed_tools: Vec<String>,

    /// Comma-separated denylist of tool names.
    #[arg(long, value_delimiter = ',')]
    pub blocked_tools: Vec<String>,

    /// Parse and validate everything, execute nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Exit non-zero on the first error tool result.
    #[arg(long)]
    pub exit_on_tool_error: bool,

    /// Append one JSON record per tool event here.
    #[arg(long)]
    pub audit_log: Option<PathBuf>,

    /// Append write-touched paths per turn here.
    #[arg(long)]
    pub changes_log: Option<PathBuf>,

    /// Human-readable transcript destination.
    #[arg(long)]
    pub transcript: Option<PathBuf>,

    /// Emit machine-readable JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Config file path (defaults to $CRADLE_CONFIG, then ~/.agent/config.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Working directory for tool execution (defaults to the current dir).
    #[arg(long)]
    pub cwd: Option<PathBuf>,
}

impl Args {
    /// Resolve the prompt from `--prompt` or `--prompt-file`.
    pub fn resolve_prompt(&self) -> std::io::Result<Option<String>> {
        if let Some(prompt) = &self.prompt {
            return Ok(Some(prompt.clone()));
        }
        match &self.prompt_file {
            Some(path) => Ok(Some(std::fs::read_to_string(path)?)),
            None => Ok(None),
        }
    }

    /// Whether `name` survives the allow/block filters.
    pub fn tool_enabled(&self, name: &str) -> bool {
        if self.blocked_tools.iter().any(|blocked| blocked == name) {
            return false;
        }
        self.allowed_tools.is_empty() || self.allowed_tools.iter().any(|allowed| allowed == name)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["cradle", "--prompt", "hi"]);
        assert_eq!(args.prompt.as_deref(), Some("hi"));
        assert_eq!(args.max_turns, 16);
        assert!(!args.dry_run);
        assert!(args.tool_enabled("read_file"));
    }

    #[test]
    fn tool_filters() {
        let args = Args::parse_from([
            "cradle",
            "--allowed-tools",
            "read_file,run_terminal_cmd",
            "--blocked-tools",
            "run_terminal_cmd",
        ]);
        assert!(args.tool_enabled("read_file"));
        assert!(!args.tool_enabled("run_terminal_cmd"));
        assert!(!args.tool_enabled("apply_patch"));
    }

    #[test]
    fn prompt_file_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "from file").unwrap();
        let args = Args::parse_from([
            "cradle",
            "--prompt-file",
            path.to_str().unwrap(),
        ]);
        assert_eq!(args.resolve_prompt().unwrap().as_deref(), Some("from file"));
    }
}
