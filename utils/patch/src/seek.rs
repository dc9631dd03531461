/// Find the sequence of `pattern` lines within `lines` at or after `start`.
///
/// Matching is attempted with decreasing strictness: exact, then ignoring
/// trailing whitespace, then ignoring surrounding whitespace. When `eof` is
/// true the search first anchors at the end of the file so patterns intended
/// for file endings land there, falling back to `start`.
pub(crate) fn seek_sequence(
    lines: &[String],
    pattern: &[String],
    start: usize,
    eof: bool,
) -> Option<usize> {
    if pattern.is_empty() {
        return Some(start);
    }
    if pattern.len() > lines.len() {
        return None;
    }

    let last_start = lines.len() - pattern.len();
    let search_start = if eof { last_start } else { start.min(last_start) };

    for i in search_start..=last_start {
        if lines[i..i + pattern.len()] == *pattern {
            return Some(i);
        }
    }
    for i in search_start..=last_start {
        if pattern
            .iter()
            .enumerate()
            .all(|(j, pat)| lines[i + j].trim_end() == pat.trim_end())
        {
            return Some(i);
        }
    }
    for i in search_start..=last_start {
        if pattern
            .iter()
            .enumerate()
            .all(|(j, pat)| lines[i + j].trim() == pat.trim())
        {
            return Some(i);
        }
    }

    None
}

#[cfg(test)]
#[path = "seek.test.rs"]
mod tests;
