use super::*;
use pretty_assertions::assert_eq;

#[test]
fn apply_simple_replacement() {
    let old = "fn main() {\n    old();\n}\n";
    let chunks = vec![UpdateChunk {
        change_context: None,
        old_lines: vec!["    old();".to_string()],
        new_lines: vec!["    new();".to_string()],
        is_end_of_file: false,
    }];
    let new = derive_new_contents("main.rs", old, &chunks).unwrap();
    assert_eq!(new, "fn main() {\n    new();\n}\n");
}

#[test]
fn apply_with_context_positioning() {
    let old = "a\nmarker\na\nb\n";
    let chunks = vec![UpdateChunk {
        change_context: Some("marker".to_string()),
        old_lines: vec!["a".to_string()],
        new_lines: vec!["A".to_string()],
        is_end_of_file: false,
    }];
    // The context line makes the second `a` the match, not the first.
    let new = derive_new_contents("f.txt", old, &chunks).unwrap();
    assert_eq!(new, "a\nmarker\nA\nb\n");
}

#[test]
fn apply_pure_addition_appends() {
    let old = "one\ntwo\n";
    let chunks = vec![UpdateChunk {
        change_context: None,
        old_lines: vec![],
        new_lines: vec!["three".to_string()],
        is_end_of_file: false,
    }];
    let new = derive_new_contents("f.txt", old, &chunks).unwrap();
    assert_eq!(new, "one\ntwo\nthree\n");
}

#[test]
fn apply_multiple_chunks_in_order() {
    let old = "alpha\nbeta\ngamma\ndelta\n";
    let chunks = vec![
        UpdateChunk {
            change_context: None,
            old_lines: vec!["alpha".to_string()],
            new_lines: vec!["ALPHA".to_string()],
            is_end_of_file: false,
        },
        UpdateChunk {
            change_context: None,
            old_lines: vec!["gamma".to_string()],
            new_lines: vec!["GAMMA".to_string()],
            is_end_of_file: false,
        },
    ];
    let new = derive_new_contents("f.txt", old, &chunks).unwrap();
    assert_eq!(new, "ALPHA\nbeta\nGAMMA\ndelta\n");
}

#[test]
fn missing_context_is_an_error() {
    let old = "a\nb\n";
    let chunks = vec![UpdateChunk {
        change_context: Some("nowhere".to_string()),
        old_lines: vec!["a".to_string()],
        new_lines: vec!["A".to_string()],
        is_end_of_file: false,
    }];
    let err = derive_new_contents("f.txt", old, &chunks).unwrap_err();
    assert!(matches!(err, PatchError::ContextNotFound { .. }));
}

#[test]
fn missing_old_lines_is_an_error() {
    let old = "a\nb\n";
    let chunks = vec![UpdateChunk {
        change_context: None,
        old_lines: vec!["zzz".to_string()],
        new_lines: vec!["A".to_string()],
        is_end_of_file: false,
    }];
    assert!(derive_new_contents("f.txt", old, &chunks).is_err());
}

#[test]
fn unified_diff_has_headers() {
    let diff = unified_diff("f.txt", "a\nb\n", "a\nc\n");
    assert!(diff.contains("--- a/f.txt"));
    assert!(diff.contains("+++ b/f.txt"));
    assert!(diff.contains("-b"));
    assert!(diff.contains("+c"));
}

#[test]
fn parse_then_apply_round_trip() {
    let patch = concat!(
        "*** Begin Patch\n",
        "*** Update File: greeting.txt\n",
        "@@ hello\n",
        "-world\n",
        "+rust\n",
        "*** End Patch",
    );
    let hunks = parse_patch(patch).unwrap();
    let chunks = match &hunks[0] {
        Hunk::UpdateFile { chunks, .. } => chunks,
        other => panic!("expected update hunk, got {other:?}"),
    };
    let new = derive_new_contents("greeting.txt", "hello\nworld\n", chunks).unwrap();
    assert_eq!(new, "hello\nrust\n");
}
