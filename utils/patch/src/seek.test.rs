use super::seek_sequence;

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn exact_match() {
    let file = lines(&["a", "b", "c", "d"]);
    let pattern = lines(&["b", "c"]);
    assert_eq!(seek_sequence(&file, &pattern, 0, false), Some(1));
}

#[test]
fn respects_start_offset() {
    let file = lines(&["a", "b", "a", "b"]);
    let pattern = lines(&["a", "b"]);
    assert_eq!(seek_sequence(&file, &pattern, 1, false), Some(2));
}

#[test]
fn trailing_whitespace_lenience() {
    let file = lines(&["fn main() {   ", "}"]);
    let pattern = lines(&["fn main() {", "}"]);
    assert_eq!(seek_sequence(&file, &pattern, 0, false), Some(0));
}

#[test]
fn surrounding_whitespace_lenience() {
    let file = lines(&["    let x = 1;"]);
    let pattern = lines(&["let x = 1;"]);
    assert_eq!(seek_sequence(&file, &pattern, 0, false), Some(0));
}

#[test]
fn eof_anchors_at_end() {
    let file = lines(&["x", "y", "x", "y"]);
    let pattern = lines(&["x", "y"]);
    assert_eq!(seek_sequence(&file, &pattern, 0, true), Some(2));
}

#[test]
fn pattern_longer_than_input() {
    let file = lines(&["a"]);
    let pattern = lines(&["a", "b"]);
    assert_eq!(seek_sequence(&file, &pattern, 0, false), None);
}

#[test]
fn empty_pattern_is_noop() {
    let file = lines(&["a"]);
    assert_eq!(seek_sequence(&file, &[], 7, false), Some(7));
}
