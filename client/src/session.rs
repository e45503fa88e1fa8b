//! Per-board session context.
//!
//! One `BoardSession` exists per open board. It owns every store the bridge
//! mutates (objects, cursors, roster) so nothing lives in globals, and it is
//! torn down explicitly when the board is closed.

use canvas::engine::EngineCore;
use canvas::presence::{CursorStore, Roster};

#[derive(Default)]
pub struct BoardSession {
    /// Object store, selection, camera, and gesture state.
    pub engine: EngineCore,
    /// Remote pointers.
    pub cursors: CursorStore,
    pub roster: Roster,
    /// Permission role last announced by the relay.
    pub role: Option<String>,
}

impl BoardSession {
    #[must_use]
    pub fn new(board_id: impl Into<String>, user_id: Option<String>) -> Self {
        Self { engine: EngineCore::for_board(board_id, user_id), ..Self::default() }
    }

    #[must_use]
    pub fn board_id(&self) -> &str {
        &self.engine.board_id
    }

    /// Whether the relay has marked this session read-only.
    #[must_use]
    pub fn is_viewer(&self) -> bool {
        self.role.as_deref() == Some("viewer")
    }

    /// Drop all board state. The board id is kept so the session can rejoin.
    pub fn teardown(&mut self) {
        self.engine.clear();
        self.cursors.clear();
        self.roster.clear();
        self.role = None;
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
