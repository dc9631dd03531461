//! Parser for the apply-patch envelope grammar.

use crate::PatchError;

const BEGIN_MARKER: &str = "*** Begin Patch";
const END_MARKER: &str = "*** End Patch";
const ADD_PREFIX: &str = "*** Add File: ";
const DELETE_PREFIX: &str = "*** Delete File: ";
const UPDATE_PREFIX: &str = "*** Update File: ";
const MOVE_PREFIX: &str = "*** Move to: ";
const EOF_MARKER: &str = "*** End of File";

/// One parsed hunk of a patch.
#[derive(Debug, Clone, PartialEq)]
pub enum Hunk {
    AddFile {
        path: String,
        contents: String,
    },
    DeleteFile {
        path: String,
    },
    UpdateFile {
        path: String,
        move_path: Option<String>,
        chunks: Vec<UpdateChunk>,
    },
}

impl Hunk {
    pub fn path(&self) -> &str {
        match self {
            Hunk::AddFile { path, .. }
            | Hunk::DeleteFile { path }
            | Hunk::UpdateFile { path, .. } => path,
        }
    }
}

/// One change region inside an `Update File` hunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateChunk {
    /// `@@` context line used to position the chunk, when present.
    pub change_context: Option<String>,
    pub old_lines: Vec<String>,
    pub new_lines: Vec<String>,
    pub is_end_of_file: bool,
}

impl UpdateChunk {
    fn is_empty(&self) -> bool {
        self.change_context.is_none() && self.old_lines.is_empty() && self.new_lines.is_empty()
    }
}

/// Parse a full patch envelope into hunks.
pub fn parse_patch(patch: &str) -> Result<Vec<Hunk>, PatchError> {
    let lines: Vec<&str> = patch.trim().lines().collect();
    if lines.first().map(|l| l.trim()) != Some(BEGIN_MARKER) {
        return Err(PatchError::Parse {
            message: format!("patch must start with '{BEGIN_MARKER}'"),
        });
    }
    if lines.last().map(|l| l.trim()) != Some(END_MARKER) {
        return Err(PatchError::Parse {
            message: format!("patch must end with '{END_MARKER}'"),
        });
    }

    let body = &lines[1..lines.len() - 1];
    let mut hunks = Vec::new();
    let mut i = 0usize;

    while i < body.len() {
        let line = body[i];
        if let Some(path) = line.strip_prefix(ADD_PREFIX) {
            let (contents, consumed) = parse_added_lines(&body[i + 1..], i + 2)?;
            hunks.push(Hunk::AddFile {
                path: path.trim().to_string(),
                contents,
            });
            i += 1 + consumed;
        } else if let Some(path) = line.strip_prefix(DELETE_PREFIX) {
            hunks.push(Hunk::DeleteFile {
                path: path.trim().to_string(),
            });
            i += 1;
        } else if let Some(path) = line.strip_prefix(UPDATE_PREFIX) {
            let mut move_path = None;
            let mut j = i + 1;
            if j < body.len() {
                if let Some(dest) = body[j].strip_prefix(MOVE_PREFIX) {
                    move_path = Some(dest.trim().to_string());
                    j += 1;
                }
            }
            let (chunks, consumed) = parse_update_chunks(&body[j..], j + 2)?;
            if chunks.is_empty() {
                return Err(PatchError::ParseHunk {
                    message: format!("update hunk for '{}' has no changes", path.trim()),
                    line: i + 2,
                });
            }
            hunks.push(Hunk::UpdateFile {
                path: path.trim().to_string(),
                move_path,
                chunks,
            });
            i = j + consumed;
        } else if line.trim().is_empty() {
            i += 1;
        } else {
            return Err(PatchError::ParseHunk {
                message: format!("unexpected line: {line}"),
                line: i + 2,
            });
        }
    }

    if hunks.is_empty() {
        return Err(PatchError::Parse {
            message: "patch contains no hunks".to_string(),
        });
    }
    Ok(hunks)
}

/// Consume `+` lines of an Add File hunk. Returns contents and lines consumed.
fn parse_added_lines(body: &[&str], first_line_no: usize) -> Result<(String, usize), PatchError> {
    let mut contents = String::new();
    let mut consumed = 0usize;
    for (offset, line) in body.iter().enumerate() {
        if line.starts_with("***") {
            break;
        }
        match line.strip_prefix('+') {
            Some(added) => {
                contents.push_str(added);
                contents.push('\n');
                consumed = offset + 1;
            }
            None => {
                return Err(PatchError::ParseHunk {
                    message: format!("expected '+' line in added file, got: {line}"),
                    line: first_line_no + offset,
                });
            }
        }
    }
    Ok((contents, consumed))
}

/// Consume the chunk lines of an Update File hunk.
fn parse_update_chunks(
    body: &[&str],
    first_line_no: usize,
) -> Result<(Vec<UpdateChunk>, usize), PatchError> {
    let mut chunks: Vec<UpdateChunk> = Vec::new();
    let mut current = UpdateChunk::default();
    let mut consumed = 0usize;

    for (offset, line) in body.iter().enumerate() {
        if line.starts_with(ADD_PREFIX) || line.starts_with(DELETE_PREFIX)
            || line.starts_with(UPDATE_PREFIX)
        {
            break;
        }
        consumed = offset + 1;

        if *line == EOF_MARKER {
            current.is_end_of_file = true;
            continue;
        }
        if let Some(context) = line.strip_prefix("@@") {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let context = context.trim();
            current.change_context = (!context.is_empty()).then(|| context.to_string());
            continue;
        }
        if let Some(removed) = line.strip_prefix('-') {
            current.old_lines.push(removed.to_string());
            continue;
        }
        if let Some(added) = line.strip_prefix('+') {
            current.new_lines.push(added.to_string());
            continue;
        }
        if let Some(context) = line.strip_prefix(' ').or(line.is_empty().then_some("")) {
            current.old_lines.push(context.to_string());
            current.new_lines.push(context.to_string());
            continue;
        }
        return Err(PatchError::ParseHunk {
            message: format!("unexpected line in update hunk: {line}"),
            line: first_line_no + offset,
        });
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    Ok((chunks, consumed))
}

#[cfg(test)]
#[path = "parser.test.rs"]
mod tests;
