//! Apply-patch handler.
//!
//! Applies the patch envelope parsed by `cradle-patch` hunk by hunk. Each
//! target path is locked in the tracker for the duration of its hunk, the
//! pre-image is verified against the last recorded hash, and every mutation
//! is recorded with old and new content so the turn can be undone.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use cradle_patch::Hunk;
use cradle_patch::parse_patch;
use cradle_protocol::JsonSchema;
use cradle_protocol::ToolKind;
use cradle_protocol::ToolOutput;
use cradle_protocol::ToolSpec;

use crate::error::Result;
use crate::error::ToolError;
use crate::handler::ToolHandler;
use crate::handler::ToolInvocation;
use crate::tracker::FileAction;
use crate::tracker::content_hash;

pub fn spec() -> ToolSpec {
    let mut properties = std::collections::BTreeMap::new();
    properties.insert(
        "patch".to_string(),
        JsonSchema::string(
            "Patch envelope: '*** Begin Patch' ... '*** End Patch' with Add/Update/Delete File hunks",
        ),
    );
    ToolSpec::new(
        "apply_patch",
        "Create, update, delete, or move files by applying a patch envelope.",
        JsonSchema::Object {
            properties,
            required: Some(vec!["patch".to_string()]),
            additional_properties: Some(false),
        },
    )
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ApplyPatchInput {
    patch: String,
    #[serde(default)]
    dry_run: bool,
}

#[derive(Debug, Default)]
pub struct ApplyPatchHandler;

#[async_trait]
impl ToolHandler for ApplyPatchHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        let raw = invocation
            .raw_arguments()
            .ok_or_else(|| ToolError::validation("apply_patch call carries no arguments"))?;
        let input: ApplyPatchInput = serde_json::from_str(raw)?;
        let hunks =
            parse_patch(&input.patch).map_err(|err| ToolError::validation(err.to_string()))?;

        let turn = &invocation.turn;
        if turn.policy.approval_needed(true, false) {
            let description = format!("apply_patch: {} file(s)", hunks.len());
            if !turn
                .approvals
                .request_approval(&invocation.tool_name, &description)
                .await
            {
                return Err(ToolError::permission("denied by user"));
            }
        }

        let mut summary_lines = Vec::with_capacity(hunks.len());
        for hunk in &hunks {
            if invocation.cancel.is_cancelled() {
                return Err(ToolError::Cancelled);
            }
            let path = turn.resolve_path(hunk.path());
            turn.policy.check_write_path(&path, &turn.cwd)?;
            let _lock = invocation.tracker.lock_guard(&path)?;

            match hunk {
                Hunk::AddFile { contents, .. } => {
                    if path.exists() {
                        return Err(ToolError::validation(format!(
                            "file {} already exists",
                            path.display()
                        )));
                    }
                    let created_parents = if input.dry_run {
                        Vec::new()
                    } else {
                        let created = create_missing_parents(&path)?;
                        std::fs::write(&path, contents)?;
                        created
                    };
                    if !input.dry_run {
                        invocation.tracker.record_create(
                            &path,
                            &invocation.tool_name,
                            contents.clone(),
                            created_parents,
                        );
                    }
                    summary_lines.push(format!("A {}", path.display()));
                }
                Hunk::DeleteFile { .. } => {
                    let old = read_existing(&path)?;
                    if !input.dry_run {
                        std::fs::remove_file(&path)?;
                        invocation.tracker.record_edit(
                            &path,
                            &invocation.tool_name,
                            FileAction::Delete,
                            Some(old),
                            None,
                        );
                    }
                    summary_lines.push(format!("D {}", path.display()));
                }
                Hunk::UpdateFile {
                    move_path, chunks, ..
                } => {
                    let old = read_existing(&path)?;
                    verify_preimage(&invocation, &path, &old)?;

                    let new = cradle_patch::derive_new_contents(
                        &path.display().to_string(),
                        &old,
                        chunks,
                    )
                    .map_err(|err| ToolError::conflict(err.to_string()))?;

                    let dest = move_path
                        .as_deref()
                        .map(|dest| turn.resolve_path(dest));
                    if let Some(ref dest) = dest {
                        turn.policy.check_write_path(dest, &turn.cwd)?;
                    }

                    if !input.dry_run {
                        match dest {
                            Some(dest) => {
                                create_missing_parents(&dest)?;
                                std::fs::write(&dest, &new)?;
                                std::fs::remove_file(&path)?;
                                invocation.tracker.record_rename(
                                    &path,
                                    &dest,
                                    &invocation.tool_name,
                                );
                                invocation.tracker.record_edit(
                                    &dest,
                                    &invocation.tool_name,
                                    FileAction::Update,
                                    Some(old),
                                    Some(new),
                                );
                                summary_lines.push(format!("M {}", dest.display()));
                            }
                            None => {
                                std::fs::write(&path, &new)?;
                                invocation.tracker.record_edit(
                                    &path,
                                    &invocation.tool_name,
                                    FileAction::Update,
                                    Some(old),
                                    Some(new),
                                );
                                summary_lines.push(format!("M {}", path.display()));
                            }
                        }
                    } else {
                        summary_lines.push(format!("M {}", path.display()));
                    }
                }
            }
        }

        let header = if input.dry_run {
            "Dry run. The patch would update the following files:"
        } else {
            "Success. Updated the following files:"
        };
        Ok(ToolOutput::text(format!(
            "{header}\n{}",
            summary_lines.join("\n")
        )))
    }
}

fn read_existing(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => {
            ToolError::not_found(format!("file {} does not exist", path.display()))
        }
        _ => ToolError::from(err),
    })
}

/// Fail with a conflict when the file on disk disagrees with the content the
/// tracker last observed (an external write raced the patch).
fn verify_preimage(invocation: &ToolInvocation, path: &Path, current: &str) -> Result<()> {
    if let Some(expected) = invocation.tracker.last_known_hash(path) {
        if expected != content_hash(current) {
            return Err(ToolError::conflict(format!(
                "file {} changed since it was last read; re-read it before patching",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Create missing parent directories, returning the ones that had to be
/// created (outermost first) so undo can remove them.
fn create_missing_parents(path: &Path) -> Result<Vec<PathBuf>> {
    let mut missing = Vec::new();
    if let Some(parent) = path.parent() {
        if parent.as_os_str().is_empty() {
            return Ok(missing);
        }
        let mut current = parent;
        while !current.exists() && !current.as_os_str().is_empty() {
            missing.push(current.to_path_buf());
            match current.parent() {
                Some(next) => current = next,
                None => break,
            }
        }
        if !missing.is_empty() {
            std::fs::create_dir_all(parent)?;
            missing.reverse();
        }
    }
    Ok(missing)
}

#[cfg(test)]
#[path = "edit.test.rs"]
mod tests;
