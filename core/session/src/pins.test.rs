use std::time::Duration;

use super::*;

#[test]
fn add_and_remove() {
    let mut store = PinStore::new();
    let id = store.add("coding standards", None, 0).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.remove(&id));
    assert!(!store.remove(&id));
    assert!(store.is_empty());
}

#[test]
fn empty_content_rejected() {
    let mut store = PinStore::new();
    assert!(store.add("   ", None, 0).is_err());
}

#[test]
fn expired_pins_dropped_lazily() {
    let mut store = PinStore::new();
    store
        .add("short lived", Some(Duration::from_millis(0)), 0)
        .unwrap();
    store.add("keeper", None, 0).unwrap();

    let meter = TokenMeter::new();
    let live = store.within_budget(&meter, 1_000);
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].content, "keeper");
    assert_eq!(store.len(), 1);
}

#[test]
fn budget_prefers_priority() {
    let mut store = PinStore::new();
    store.add("x".repeat(40), None, 0).unwrap();
    store.add("y".repeat(40), None, 5).unwrap();

    // Budget fits only one 10-token pin.
    let meter = TokenMeter::new();
    let live = store.within_budget(&meter, 10);
    assert_eq!(live.len(), 1);
    assert!(live[0].content.starts_with('y'));
}

#[test]
fn render_joins_contents() {
    let mut store = PinStore::new();
    store.add("first", None, 0).unwrap();
    store.add("second", None, 0).unwrap();
    let meter = TokenMeter::new();
    let pins = store.within_budget(&meter, 1_000);
    let rendered = PinStore::render(&pins).unwrap();
    assert!(rendered.starts_with("Pinned context:"));
    assert!(rendered.contains("first"));
    assert!(rendered.contains("second"));

    assert!(PinStore::render(&[]).is_none());
}
