use super::*;
use pretty_assertions::assert_eq;

#[test]
fn parse_add_file() {
    let patch = "*** Begin Patch\n*** Add File: src/new.rs\n+fn fresh() {}\n+\n*** End Patch";
    let hunks = parse_patch(patch).unwrap();
    assert_eq!(
        hunks,
        vec![Hunk::AddFile {
            path: "src/new.rs".to_string(),
            contents: "fn fresh() {}\n\n".to_string(),
        }]
    );
}

#[test]
fn parse_delete_file() {
    let patch = "*** Begin Patch\n*** Delete File: old.txt\n*** End Patch";
    let hunks = parse_patch(patch).unwrap();
    assert_eq!(
        hunks,
        vec![Hunk::DeleteFile {
            path: "old.txt".to_string()
        }]
    );
}

#[test]
fn parse_update_with_context() {
    let patch = concat!(
        "*** Begin Patch\n",
        "*** Update File: src/main.rs\n",
        "@@ fn main() {\n",
        "-    old();\n",
        "+    new();\n",
        "*** End Patch",
    );
    let hunks = parse_patch(patch).unwrap();
    match &hunks[0] {
        Hunk::UpdateFile {
            path,
            move_path,
            chunks,
        } => {
            assert_eq!(path, "src/main.rs");
            assert!(move_path.is_none());
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0].change_context.as_deref(), Some("fn main() {"));
            assert_eq!(chunks[0].old_lines, vec!["    old();"]);
            assert_eq!(chunks[0].new_lines, vec!["    new();"]);
        }
        other => panic!("expected update hunk, got {other:?}"),
    }
}

#[test]
fn parse_update_with_move() {
    let patch = concat!(
        "*** Begin Patch\n",
        "*** Update File: a.txt\n",
        "*** Move to: b.txt\n",
        "-x\n",
        "+y\n",
        "*** End Patch",
    );
    let hunks = parse_patch(patch).unwrap();
    match &hunks[0] {
        Hunk::UpdateFile { move_path, .. } => {
            assert_eq!(move_path.as_deref(), Some("b.txt"));
        }
        other => panic!("expected update hunk, got {other:?}"),
    }
}

#[test]
fn parse_multiple_hunks() {
    let patch = concat!(
        "*** Begin Patch\n",
        "*** Add File: a.txt\n",
        "+hello\n",
        "*** Delete File: b.txt\n",
        "*** End Patch",
    );
    let hunks = parse_patch(patch).unwrap();
    assert_eq!(hunks.len(), 2);
    assert_eq!(hunks[0].path(), "a.txt");
    assert_eq!(hunks[1].path(), "b.txt");
}

#[test]
fn rejects_missing_envelope() {
    assert!(matches!(
        parse_patch("*** Update File: x\n-a\n+b"),
        Err(PatchError::Parse { .. })
    ));
    assert!(matches!(
        parse_patch("*** Begin Patch\n*** Update File: x\n-a\n+b"),
        Err(PatchError::Parse { .. })
    ));
}

#[test]
fn rejects_empty_update() {
    let patch = "*** Begin Patch\n*** Update File: x\n*** End Patch";
    assert!(matches!(
        parse_patch(patch),
        Err(PatchError::ParseHunk { .. })
    ));
}

#[test]
fn rejects_garbage_between_hunks() {
    let patch = "*** Begin Patch\nnot a hunk\n*** End Patch";
    assert!(matches!(
        parse_patch(patch),
        Err(PatchError::ParseHunk { .. })
    ));
}

#[test]
fn end_of_file_marker_sets_flag() {
    let patch = concat!(
        "*** Begin Patch\n",
        "*** Update File: x\n",
        "-last\n",
        "+LAST\n",
        "*** End of File\n",
        "*** End Patch",
    );
    let hunks = parse_patch(patch).unwrap();
    match &hunks[0] {
        Hunk::UpdateFile { chunks, .. } => assert!(chunks[0].is_end_of_file),
        other => panic!("expected update hunk, got {other:?}"),
    }
}
