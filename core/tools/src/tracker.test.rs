use std::sync::Arc;

use super::*;

#[test]
fn lock_is_exclusive_and_fail_fast() {
    let tracker = TurnDiffTracker::new(1);
    let path = Path::new("/work/a.txt");
    tracker.lock_file(path).unwrap();
    let err = tracker.lock_file(path).unwrap_err();
    // Lock contention is its own kind, distinct from pre-image conflicts.
    assert_eq!(err.kind(), "already_locked");
    assert!(!err.is_fatal());

    tracker.unlock_file(path);
    tracker.lock_file(path).unwrap();
}

#[test]
fn lock_guard_releases_on_drop() {
    let tracker = Arc::new(TurnDiffTracker::new(1));
    let path = Path::new("/work/a.txt");
    {
        let _guard = tracker.lock_guard(path).unwrap();
        assert!(tracker.lock_file(path).is_err());
    }
    assert!(tracker.lock_file(path).is_ok());
}

#[test]
fn conflict_descriptor_on_preimage_mismatch() {
    let tracker = TurnDiffTracker::new(3);
    let path = Path::new("/work/a.txt");
    tracker.record_edit(
        path,
        "apply_patch",
        FileAction::Update,
        Some("v1".to_string()),
        Some("v2".to_string()),
    );
    // Second edit claims a pre-image that disagrees with the recorded v2.
    tracker.record_edit(
        path,
        "apply_patch",
        FileAction::Update,
        Some("externally-changed".to_string()),
        Some("v3".to_string()),
    );
    let conflicts = tracker.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert!(conflicts[0].contains("a.txt"));

    // A consistent chain records no further conflicts.
    tracker.record_edit(
        path,
        "apply_patch",
        FileAction::Update,
        Some("v3".to_string()),
        Some("v4".to_string()),
    );
    assert_eq!(tracker.conflicts().len(), 1);
}

#[test]
fn last_known_hash_follows_edit_chain() {
    let tracker = TurnDiffTracker::new(1);
    let path = Path::new("/work/a.txt");
    assert!(tracker.last_known_hash(path).is_none());

    tracker.record_read(path, "read_file", Some(content_hash("v1")));
    assert_eq!(tracker.last_known_hash(path), Some(content_hash("v1")));

    tracker.record_edit(
        path,
        "apply_patch",
        FileAction::Update,
        Some("v1".to_string()),
        Some("v2".to_string()),
    );
    assert_eq!(tracker.last_known_hash(path), Some(content_hash("v2")));
}

#[test]
fn summary_groups_by_path() {
    let tracker = TurnDiffTracker::new(9);
    tracker.record_edit(
        Path::new("/b.txt"),
        "apply_patch",
        FileAction::Update,
        Some("old".to_string()),
        Some("new".to_string()),
    );
    tracker.record_read(Path::new("/a.txt"), "read_file", None);

    let summary = tracker.summary();
    assert!(summary.starts_with("Turn 9 modifications:"));
    assert!(summary.contains("/a.txt: read (via read_file)"));
    assert!(summary.contains("/b.txt: update (via apply_patch)"));

    let empty = TurnDiffTracker::new(1);
    assert_eq!(empty.summary(), "No files modified this turn.");
}

#[test]
fn unified_diff_spans_first_to_last() {
    let tracker = TurnDiffTracker::new(1);
    let path = Path::new("f.txt");
    tracker.record_edit(
        path,
        "apply_patch",
        FileAction::Update,
        Some("a\nb\n".to_string()),
        Some("a\nB\n".to_string()),
    );
    tracker.record_edit(
        path,
        "apply_patch",
        FileAction::Update,
        Some("a\nB\n".to_string()),
        Some("a\nC\n".to_string()),
    );
    let diff = tracker.generate_unified_diff().unwrap();
    assert!(diff.contains("-b"));
    assert!(diff.contains("+C"));
    assert!(!diff.contains("+B"), "intermediate state must not appear");

    let untouched = TurnDiffTracker::new(2);
    assert!(untouched.generate_unified_diff().is_none());
}

#[test]
fn undo_reverses_create_update_delete() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = TurnDiffTracker::new(1);

    // Create a.txt, then update it, then create b.txt.
    let a = dir.path().join("a.txt");
    std::fs::write(&a, "first").unwrap();
    tracker.record_create(&a, "apply_patch", "first".to_string(), vec![]);

    std::fs::write(&a, "second").unwrap();
    tracker.record_edit(
        &a,
        "apply_patch",
        FileAction::Update,
        Some("first".to_string()),
        Some("second".to_string()),
    );

    let b = dir.path().join("nested").join("b.txt");
    std::fs::create_dir_all(b.parent().unwrap()).unwrap();
    std::fs::write(&b, "bee").unwrap();
    tracker.record_create(
        &b,
        "apply_patch",
        "bee".to_string(),
        vec![b.parent().unwrap().to_path_buf()],
    );

    let operations = tracker.undo().unwrap();
    assert!(!operations.is_empty());
    assert!(!a.exists(), "created file must be removed");
    assert!(!b.exists());
    assert!(!b.parent().unwrap().exists(), "created parent dir removed");
}

#[test]
fn undo_restores_deleted_file_with_missing_parents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deep").join("gone.txt");
    let tracker = TurnDiffTracker::new(1);
    tracker.record_edit(
        &path,
        "apply_patch",
        FileAction::Delete,
        Some("contents".to_string()),
        None,
    );

    // Parent never existed; undo must create it.
    tracker.undo().unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "contents");
}

#[test]
fn undo_reverses_rename() {
    let dir = tempfile::tempdir().unwrap();
    let from = dir.path().join("old.txt");
    let to = dir.path().join("new.txt");
    std::fs::write(&to, "moved").unwrap();

    let tracker = TurnDiffTracker::new(1);
    tracker.record_rename(&from, &to, "rename_file");
    tracker.undo().unwrap();
    assert!(from.exists());
    assert!(!to.exists());
}

#[test]
fn undo_runs_once() {
    let tracker = TurnDiffTracker::new(1);
    tracker.undo().unwrap();
    assert!(tracker.undo().is_err());
}

#[test]
fn undo_accumulates_errors_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("never-existed.txt");
    let real = dir.path().join("real.txt");
    std::fs::write(&real, "x").unwrap();

    let tracker = TurnDiffTracker::new(1);
    // Create recorded for a path that is already gone: removal fails.
    tracker.record_create(&missing, "apply_patch", "x".to_string(), vec![]);
    tracker.record_create(&real, "apply_patch", "x".to_string(), vec![]);

    let operations = tracker.undo().unwrap();
    assert!(operations.iter().any(|op| op.contains("failed to remove")));
    assert!(!real.exists(), "later entries still processed");
}

#[test]
fn clear_locks_empties_set() {
    let tracker = TurnDiffTracker::new(1);
    tracker.lock_file(Path::new("/a")).unwrap();
    tracker.lock_file(Path::new("/b")).unwrap();
    assert_eq!(tracker.locked_paths().len(), 2);
    tracker.clear_locks();
    assert!(tracker.locked_paths().is_empty());
}
