//! Patch grammar and content-level application.
//!
//! The apply-patch tool accepts a patch envelope of the form:
//!
//! ```text
//! *** Begin Patch
//! *** Update File: src/main.rs
//! @@ fn main() {
//! -    println!("old");
//! +    println!("new");
//! *** End Patch
//! ```
//!
//! Parsing produces [`Hunk`]s; application is purely content-level so the
//! calling handler controls filesystem writes, pre-image verification, and
//! edit recording.

mod parser;
mod seek;

use similar::TextDiff;
use thiserror::Error;

pub use parser::Hunk;
pub use parser::UpdateChunk;
pub use parser::parse_patch;

#[derive(Debug, Error, PartialEq)]
pub enum PatchError {
    #[error("invalid patch: {message}")]
    Parse { message: String },
    #[error("invalid patch hunk on line {line}: {message}")]
    ParseHunk { message: String, line: usize },
    #[error("failed to find expected lines in {path}:\n{wanted}")]
    ContextNotFound { path: String, wanted: String },
}

/// New file contents after applying `chunks` to `old`.
///
/// Line matching walks forward through the file; each chunk's context (if
/// any) is located first, then its old lines are matched with decreasing
/// strictness and replaced by its new lines.
pub fn derive_new_contents(
    path: &str,
    old: &str,
    chunks: &[UpdateChunk],
) -> Result<String, PatchError> {
    let mut lines: Vec<String> = old.split('\n').map(String::from).collect();
    // Drop the sentinel produced by the trailing newline so counts match diff.
    if lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }

    let replacements = compute_replacements(&lines, path, chunks)?;
    // Apply in descending order so earlier replacements keep their indices.
    for (start, old_len, new_lines) in replacements.iter().rev() {
        for _ in 0..*old_len {
            if *start < lines.len() {
                lines.remove(*start);
            }
        }
        for (offset, new_line) in new_lines.iter().enumerate() {
            lines.insert(start + offset, new_line.clone());
        }
    }

    if !lines.last().is_some_and(String::is_empty) {
        lines.push(String::new());
    }
    Ok(lines.join("\n"))
}

fn compute_replacements(
    lines: &[String],
    path: &str,
    chunks: &[UpdateChunk],
) -> Result<Vec<(usize, usize, Vec<String>)>, PatchError> {
    let mut replacements: Vec<(usize, usize, Vec<String>)> = Vec::new();
    let mut cursor = 0usize;

    for chunk in chunks {
        if let Some(context) = &chunk.change_context {
            match seek::seek_sequence(lines, std::slice::from_ref(context), cursor, false) {
                Some(idx) => cursor = idx + 1,
                None => {
                    return Err(PatchError::ContextNotFound {
                        path: path.to_string(),
                        wanted: context.clone(),
                    });
                }
            }
        }

        if chunk.old_lines.is_empty() {
            // Pure addition: insert before the trailing blank if present.
            let at = if lines.last().is_some_and(String::is_empty) {
                lines.len() - 1
            } else {
                lines.len()
            };
            replacements.push((at, 0, chunk.new_lines.clone()));
            continue;
        }

        let mut pattern: &[String] = &chunk.old_lines;
        let mut replacement: &[String] = &chunk.new_lines;
        let mut found = seek::seek_sequence(lines, pattern, cursor, chunk.is_end_of_file);

        // Diffs often carry a trailing empty line standing in for the final
        // newline; retry without it when the direct search misses.
        if found.is_none() && pattern.last().is_some_and(String::is_empty) {
            pattern = &pattern[..pattern.len() - 1];
            if replacement.last().is_some_and(String::is_empty) {
                replacement = &replacement[..replacement.len() - 1];
            }
            found = seek::seek_sequence(lines, pattern, cursor, chunk.is_end_of_file);
        }

        match found {
            Some(start) => {
                replacements.push((start, pattern.len(), replacement.to_vec()));
                cursor = start + pattern.len();
            }
            None => {
                return Err(PatchError::ContextNotFound {
                    path: path.to_string(),
                    wanted: chunk.old_lines.join("\n"),
                });
            }
        }
    }

    replacements.sort_by_key(|(start, _, _)| *start);
    Ok(replacements)
}

/// Render a unified diff between two contents with one line of context.
pub fn unified_diff(path: &str, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(1)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}

#[cfg(test)]
#[path = "lib.test.rs"]
mod tests;
