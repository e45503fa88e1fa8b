//! Ephemeral peer state: live cursors, the presence roster, and the local emit throttle.
//!
//! None of this is part of the board document. Cursors are never persisted
//! and never enter undo snapshots; they vanish when a peer leaves or when
//! the local connection drops.

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use indexmap::IndexMap;
use serde::Serialize;

use crate::camera::Point;

/// A peer's pointer in board-space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cursor {
    pub user_id: String,
    pub user_name: String,
    pub user_color: String,
    pub x: f64,
    pub y: f64,
}

impl Cursor {
    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// One user currently viewing the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Peer {
    pub user_id: String,
    pub user_name: String,
    pub user_color: String,
}

/// Latest known cursor per peer, keyed by user id.
#[derive(Debug, Default)]
pub struct CursorStore {
    cursors: IndexMap<String, Cursor>,
}

impl CursorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a peer's latest position, replacing any earlier one.
    pub fn upsert(&mut self, cursor: Cursor) {
        self.cursors.insert(cursor.user_id.clone(), cursor);
    }

    /// Forget a peer's cursor. Returns `false` if none was held.
    pub fn remove(&mut self, user_id: &str) -> bool {
        self.cursors.shift_remove(user_id).is_some()
    }

    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<&Cursor> {
        self.cursors.get(user_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cursor> {
        self.cursors.values()
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

/// Presence roster. Every update replaces it wholesale.
#[derive(Debug, Default)]
pub struct Roster {
    users: Vec<Peer>,
}

impl Roster {
    pub fn replace(&mut self, users: Vec<Peer>) {
        self.users = users;
    }

    #[must_use]
    pub fn users(&self) -> &[Peer] {
        &self.users
    }

    #[must_use]
    pub fn contains(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u.user_id == user_id)
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }
}

/// Rate limiter for local cursor emits.
///
/// An emit is allowed only when at least `interval_ms` have passed since the
/// last allowed one. Suppressed samples are dropped, not queued.
#[derive(Debug, Clone, Copy)]
pub struct CursorThrottle {
    interval_ms: i64,
    last_emit_ms: Option<i64>,
}

impl CursorThrottle {
    #[must_use]
    pub fn new(interval_ms: i64) -> Self {
        Self { interval_ms, last_emit_ms: None }
    }

    /// Returns `true` and records `now_ms` if an emit is due.
    pub fn should_emit(&mut self, now_ms: i64) -> bool {
        let due = self.last_emit_ms.is_none_or(|last| now_ms - last >= self.interval_ms);
        if due {
            self.last_emit_ms = Some(now_ms);
        }
        due
    }

    /// Forget the last emit so the next sample goes out immediately.
    pub fn reset(&mut self) {
        self.last_emit_ms = None;
    }
}
