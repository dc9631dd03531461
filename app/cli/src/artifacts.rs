//! Persisted run artifacts: audit log, changes log, transcript, and the
//! REPL history file.

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use serde_json::json;

use cradle_protocol::TelemetryEvent;
use cradle_tools::FileEdit;

/// Maximum entries kept in the REPL history file.
pub const HISTORY_CAP: usize = 100;

/// Append-only JSONL audit writer.
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// One record per tool event.
    pub fn append(&self, events: &[TelemetryEvent]) -> Result<()> {
        let mut file = open_append(&self.path)?;
        for event in events {
            let line = serde_json::to_string(event)?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }
}

/// Records write-touched paths per turn.
pub struct ChangesLog {
    path: PathBuf,
}

impl ChangesLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append_turn(&self, turn_id: u64, edits: &[FileEdit]) -> Result<()> {
        let touched: Vec<String> = edits
            .iter()
            .filter(|edit| edit.action != cradle_tools::FileAction::Read)
            .map(|edit| edit.path.display().to_string())
            .collect();
        if touched.is_empty() {
            return Ok(());
        }
        let record = json!({"turn": turn_id, "paths": touched});
        let mut file = open_append(&self.path)?;
        writeln!(file, "{record}")?;
        Ok(())
    }
}

/// Human-readable transcript writer.
pub struct Transcript {
    path: PathBuf,
}

impl Transcript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append_line(&self, speaker: &str, text: &str) -> Result<()> {
        let mut file = open_append(&self.path)?;
        writeln!(file, "[{speaker}] {text}")?;
        Ok(())
    }
}

/// Append a prompt to the REPL history file, rotating to the newest
/// [`HISTORY_CAP`] entries.
pub fn append_history(path: &Path, entry: &str) -> Result<()> {
    let entry = entry.replace('\n', " ");
    let mut entries: Vec<String> = match std::fs::read_to_string(path) {
        Ok(existing) => existing.lines().map(String::from).collect(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(err) => return Err(err).context("failed to read history file"),
    };
    entries.push(entry);
    if entries.len() > HISTORY_CAP {
        entries.drain(..entries.len() - HISTORY_CAP);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, entries.join("\n") + "\n").context("failed to write history file")
}

/// Default history location (`~/.agent/history.txt`).
pub fn default_history_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".agent").join("history.txt"))
}

fn open_append(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_log_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = AuditLog::new(&path);
        let event = TelemetryEvent {
            timestamp_ms: 0,
            tool_name: "read_file".to_string(),
            call_id: "c1".to_string(),
            turn_id: 1,
            duration_ms: 3,
            success: true,
            error_kind: None,
            input_bytes: 5,
            output_bytes: 10,
            truncated: false,
        };
        log.append(&[event.clone()]).unwrap();
        log.append(&[event]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn history_rotates_fifo_at_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");
        for i in 0..(HISTORY_CAP + 10) {
            append_history(&path, &format!("entry {i}")).unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), HISTORY_CAP);
        assert_eq!(lines[0], "entry 10");
        assert_eq!(lines[HISTORY_CAP - 1], &format!("entry {}", HISTORY_CAP + 9));
    }

    #[test]
    fn multiline_prompts_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");
        append_history(&path, "line one\nline two").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "line one line two\n");
    }

    #[test]
    fn transcript_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.log");
        let transcript = Transcript::new(&path);
        transcript.append_line("user", "hello").unwrap();
        transcript.append_line("assistant", "hi").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[user] hello"));
        assert!(text.contains("[assistant] hi"));
    }
}
