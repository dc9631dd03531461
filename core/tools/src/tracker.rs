//! Per-turn transaction log of filesystem operations.
//!
//! One mutex guards the whole tracker state: the append-only edit log, the
//! touched and locked path sets, and accumulated conflict descriptors. The
//! log supports grouped summaries, unified-diff generation, and a one-shot
//! best-effort undo pass.

use std::collections::BTreeSet;
use std::hash::Hash;
use std::hash::Hasher;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use cradle_protocol::TelemetryEvent;

use crate::error::Result;
use crate::error::ToolError;

/// Kind of filesystem operation recorded for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Read,
    Create,
    Update,
    Delete,
    Rename,
}

impl FileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileAction::Read => "read",
            FileAction::Create => "create",
            FileAction::Update => "update",
            FileAction::Delete => "delete",
            FileAction::Rename => "rename",
        }
    }
}

/// One recorded file operation. Never mutated after append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEdit {
    pub path: PathBuf,
    pub tool_name: String,
    /// Unix epoch milliseconds.
    pub timestamp_ms: i64,
    pub action: FileAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_range: Option<(u32, u32)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_hash: Option<String>,
    /// Source path for rename actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<PathBuf>,
    /// Parent directories this edit created, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_parents: Vec<PathBuf>,
}

/// Cheap, process-local content fingerprint used for conflict detection.
pub fn content_hash(content: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[derive(Debug, Default)]
struct TrackerState {
    edits: Vec<FileEdit>,
    touched: BTreeSet<PathBuf>,
    locked: BTreeSet<PathBuf>,
    conflicts: Vec<String>,
    undone: bool,
}

/// Thread-safe per-turn edit log.
#[derive(Debug)]
pub struct TurnDiffTracker {
    turn_id: u64,
    state: Mutex<TrackerState>,
}

impl TurnDiffTracker {
    pub fn new(turn_id: u64) -> Self {
        Self {
            turn_id,
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub fn turn_id(&self) -> u64 {
        self.turn_id
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Mark writer intent on a path. Fails fast with `AlreadyLocked` when
    /// another operation holds it.
    pub fn lock_file(&self, path: &Path) -> Result<()> {
        let mut state = self.state();
        if !state.locked.insert(path.to_path_buf()) {
            return Err(ToolError::already_locked(format!(
                "file {} is already locked by another operation",
                path.display()
            )));
        }
        Ok(())
    }

    pub fn unlock_file(&self, path: &Path) {
        let mut state = self.state();
        state.locked.remove(path);
    }

    /// RAII variant of [`lock_file`](Self::lock_file); the lock releases when
    /// the guard drops, including on cancellation.
    pub fn lock_guard(self: &Arc<Self>, path: &Path) -> Result<PathLockGuard> {
        self.lock_file(path)?;
        Ok(PathLockGuard {
            tracker: self.clone(),
            path: path.to_path_buf(),
        })
    }

    pub fn locked_paths(&self) -> Vec<PathBuf> {
        self.state().locked.iter().cloned().collect()
    }

    /// Drop all writer-intent markers. Used by the fatal-error cleanup pass.
    pub fn clear_locks(&self) {
        let mut state = self.state();
        if !state.locked.is_empty() {
            warn!(
                turn_id = self.turn_id,
                count = state.locked.len(),
                "clearing leftover tracker locks"
            );
            state.locked.clear();
        }
    }

    /// Record a read with the content hash observed, for later pre-image
    /// verification.
    pub fn record_read(&self, path: &Path, tool_name: &str, old_hash: Option<String>) {
        let mut state = self.state();
        state.edits.push(FileEdit {
            path: path.to_path_buf(),
            tool_name: tool_name.to_string(),
            timestamp_ms: TelemetryEvent::now_ms(),
            action: FileAction::Read,
            old_content: None,
            new_content: None,
            line_range: None,
            old_hash,
            new_hash: None,
            renamed_from: None,
            created_parents: Vec::new(),
        });
    }

    /// Record a mutation. Detects disagreement with the previous edit's
    /// post-image for the same path.
    pub fn record_edit(
        &self,
        path: &Path,
        tool_name: &str,
        action: FileAction,
        old_content: Option<String>,
        new_content: Option<String>,
    ) {
        self.record_edit_inner(path, tool_name, action, old_content, new_content, None, Vec::new());
    }

    /// Record a file creation, remembering which parent directories had to be
    /// created so undo can remove them again.
    pub fn record_create(
        &self,
        path: &Path,
        tool_name: &str,
        new_content: String,
        created_parents: Vec<PathBuf>,
    ) {
        self.record_edit_inner(
            path,
            tool_name,
            FileAction::Create,
            None,
            Some(new_content),
            None,
            created_parents,
        );
    }

    /// Record a rename from `from` to `path`.
    pub fn record_rename(&self, from: &Path, path: &Path, tool_name: &str) {
        self.record_edit_inner(
            path,
            tool_name,
            FileAction::Rename,
            None,
            None,
            Some(from.to_path_buf()),
            Vec::new(),
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn record_edit_inner(
        &self,
        path: &Path,
        tool_name: &str,
        action: FileAction,
        old_content: Option<String>,
        new_content: Option<String>,
        renamed_from: Option<PathBuf>,
        created_parents: Vec<PathBuf>,
    ) {
        let mut state = self.state();

        if let Some(ref old) = old_content {
            let prior = state
                .edits
                .iter()
                .rev()
                .find(|edit| edit.path == path && edit.new_content.is_some());
            if let Some(prior) = prior {
                if prior.new_content.as_deref() != Some(old.as_str()) {
                    let descriptor = format!(
                        "{}: pre-image of {} by {} disagrees with prior {} by {}",
                        path.display(),
                        action.as_str(),
                        tool_name,
                        prior.action.as_str(),
                        prior.tool_name,
                    );
                    debug!(turn_id = self.turn_id, %descriptor, "edit conflict recorded");
                    state.conflicts.push(descriptor);
                }
            }
        }

        let old_hash = old_content.as_deref().map(content_hash);
        let new_hash = new_content.as_deref().map(content_hash);
        state.edits.push(FileEdit {
            path: path.to_path_buf(),
            tool_name: tool_name.to_string(),
            timestamp_ms: TelemetryEvent::now_ms(),
            action,
            old_content,
            new_content,
            line_range: None,
            old_hash,
            new_hash,
            renamed_from,
            created_parents,
        });
        state.touched.insert(path.to_path_buf());
    }

    /// Last known content hash for a path: the newest post-image hash, or the
    /// hash observed at read time.
    pub fn last_known_hash(&self, path: &Path) -> Option<String> {
        let state = self.state();
        state
            .edits
            .iter()
            .rev()
            .filter(|edit| edit.path == path)
            .find_map(|edit| edit.new_hash.clone().or_else(|| edit.old_hash.clone()))
    }

    pub fn get_edits_for(&self, path: &Path) -> Vec<FileEdit> {
        let state = self.state();
        state
            .edits
            .iter()
            .filter(|edit| edit.path == path)
            .cloned()
            .collect()
    }

    pub fn edits(&self) -> Vec<FileEdit> {
        self.state().edits.clone()
    }

    pub fn touched_paths(&self) -> Vec<PathBuf> {
        self.state().touched.iter().cloned().collect()
    }

    pub fn conflicts(&self) -> Vec<String> {
        self.state().conflicts.clone()
    }

    /// Human-readable summary grouped by path.
    pub fn summary(&self) -> String {
        let state = self.state();
        if state.edits.is_empty() {
            return "No files modified this turn.".to_string();
        }

        let mut grouped: std::collections::BTreeMap<&PathBuf, Vec<&FileEdit>> =
            std::collections::BTreeMap::new();
        for edit in &state.edits {
            grouped.entry(&edit.path).or_default().push(edit);
        }

        let mut lines = vec![format!("Turn {} modifications:", self.turn_id)];
        for (path, edits) in grouped {
            let actions: Vec<&str> = edits.iter().map(|edit| edit.action.as_str()).collect();
            let tools: BTreeSet<&str> = edits.iter().map(|edit| edit.tool_name.as_str()).collect();
            lines.push(format!(
                "  {}: {} (via {})",
                path.display(),
                actions.join(", "),
                tools.into_iter().collect::<Vec<_>>().join(", "),
            ));
        }
        lines.join("\n")
    }

    /// Unified diff of initial old content to final new content per path.
    pub fn generate_unified_diff(&self) -> Option<String> {
        let state = self.state();
        let mut diffs = Vec::new();
        for path in &state.touched {
            let edits: Vec<&FileEdit> = state.edits.iter().filter(|e| &e.path == path).collect();
            let old = edits.iter().find_map(|e| e.old_content.as_deref());
            let new = edits.iter().rev().find_map(|e| e.new_content.as_deref());
            let (old, new) = match (old, new) {
                (Some(old), Some(new)) => (old, new),
                // Creations diff against empty; deletions against empty.
                (None, Some(new)) => ("", new),
                (Some(old), None) => (old, ""),
                (None, None) => continue,
            };
            if old == new {
                continue;
            }
            let diff = cradle_patch::unified_diff(&path.display().to_string(), old, new);
            if !diff.is_empty() {
                diffs.push(diff);
            }
        }
        if diffs.is_empty() {
            None
        } else {
            Some(diffs.join("\n"))
        }
    }

    /// Reverse the recorded edits on disk, newest first.
    ///
    /// Best effort: per-path failures are reported in the returned operation
    /// log and do not abort the pass. A second call in the same turn is an
    /// error.
    pub fn undo(&self) -> Result<Vec<String>> {
        let mut state = self.state();
        if state.undone {
            return Err(ToolError::validation("undo already performed this turn"));
        }
        state.undone = true;

        let mut operations = Vec::new();
        let edits = state.edits.clone();
        for edit in edits.iter().rev() {
            match edit.action {
                FileAction::Read => {}
                FileAction::Create => {
                    match std::fs::remove_file(&edit.path) {
                        Ok(()) => operations.push(format!("removed {}", edit.path.display())),
                        Err(err) => operations.push(format!(
                            "failed to remove {}: {err}",
                            edit.path.display()
                        )),
                    }
                    // Remove directories this edit created, innermost first.
                    for parent in edit.created_parents.iter().rev() {
                        if std::fs::remove_dir(parent).is_ok() {
                            operations.push(format!("removed directory {}", parent.display()));
                        }
                    }
                }
                FileAction::Update | FileAction::Delete => {
                    let Some(previous) = edit.old_content.as_deref() else {
                        operations.push(format!(
                            "no previous content recorded for {}, skipped",
                            edit.path.display()
                        ));
                        continue;
                    };
                    match restore_file(&edit.path, previous) {
                        Ok(()) => operations.push(format!("restored {}", edit.path.display())),
                        Err(err) => operations.push(format!(
                            "failed to restore {}: {err}",
                            edit.path.display()
                        )),
                    }
                }
                FileAction::Rename => {
                    let Some(source) = edit.renamed_from.as_deref() else {
                        operations.push(format!(
                            "rename of {} has no source recorded, skipped",
                            edit.path.display()
                        ));
                        continue;
                    };
                    let result = ensure_parent(source)
                        .and_then(|_| std::fs::rename(&edit.path, source));
                    match result {
                        Ok(()) => operations.push(format!(
                            "renamed {} back to {}",
                            edit.path.display(),
                            source.display()
                        )),
                        Err(err) => operations.push(format!(
                            "failed to rename {} back: {err}",
                            edit.path.display()
                        )),
                    }
                }
            }
        }

        debug!(turn_id = self.turn_id, operations = operations.len(), "undo pass complete");
        Ok(operations)
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn restore_file(path: &Path, content: &str) -> std::io::Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, content)
}

/// RAII path lock; releases on drop.
#[derive(Debug)]
pub struct PathLockGuard {
    tracker: Arc<TurnDiffTracker>,
    path: PathBuf,
}

impl Drop for PathLockGuard {
    fn drop(&mut self) {
        self.tracker.unlock_file(&self.path);
    }
}

#[cfg(test)]
#[path = "tracker.test.rs"]
mod tests;
