#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use super::*;

fn cursor(user_id: &str, x: f64, y: f64) -> Cursor {
    Cursor { user_id: user_id.to_owned(), user_name: "Ada".to_owned(), user_color: "#f97316".to_owned(), x, y }
}

fn peer(user_id: &str) -> Peer {
    Peer { user_id: user_id.to_owned(), user_name: user_id.to_uppercase(), user_color: "#fff".to_owned() }
}

// =============================================================
// CursorStore
// =============================================================

#[test]
fn upsert_keeps_latest_position() {
    let mut store = CursorStore::new();
    store.upsert(cursor("u-1", 1.0, 2.0));
    store.upsert(cursor("u-1", 5.0, 6.0));
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("u-1").unwrap().position(), Point::new(5.0, 6.0));
}

#[test]
fn remove_forgets_peer() {
    let mut store = CursorStore::new();
    store.upsert(cursor("u-1", 0.0, 0.0));
    store.upsert(cursor("u-2", 0.0, 0.0));
    assert!(store.remove("u-1"));
    assert!(!store.remove("u-1"));
    assert_eq!(store.iter().map(|c| c.user_id.as_str()).collect::<Vec<_>>(), vec!["u-2"]);
}

#[test]
fn clear_empties_store() {
    let mut store = CursorStore::new();
    store.upsert(cursor("u-1", 0.0, 0.0));
    store.clear();
    assert!(store.is_empty());
}

// =============================================================
// Roster
// =============================================================

#[test]
fn roster_replaces_wholesale() {
    let mut roster = Roster::default();
    roster.replace(vec![peer("a"), peer("b")]);
    roster.replace(vec![peer("c")]);
    assert_eq!(roster.users(), &[peer("c")]);
    assert!(!roster.contains("a"));
    assert!(roster.contains("c"));
}

// =============================================================
// CursorThrottle
// =============================================================

#[test]
fn first_sample_always_emits() {
    let mut throttle = CursorThrottle::new(16);
    assert!(throttle.should_emit(1_000));
}

#[test]
fn samples_inside_interval_are_suppressed() {
    let mut throttle = CursorThrottle::new(16);
    assert!(throttle.should_emit(1_000));
    assert!(!throttle.should_emit(1_005));
    assert!(!throttle.should_emit(1_015));
    assert!(throttle.should_emit(1_016));
    assert!(!throttle.should_emit(1_020));
}

#[test]
fn suppressed_samples_do_not_extend_window() {
    let mut throttle = CursorThrottle::new(16);
    assert!(throttle.should_emit(0));
    for t in 1..16 {
        assert!(!throttle.should_emit(t));
    }
    assert!(throttle.should_emit(16));
}

#[test]
fn reset_allows_immediate_emit() {
    let mut throttle = CursorThrottle::new(16);
    assert!(throttle.should_emit(100));
    throttle.reset();
    assert!(throttle.should_emit(101));
}
