//! Shared relay state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds one `Room` per live board: the accepted objects in arrival order
//! and the connected members with their outbound channels. Rooms exist only
//! while someone is in them; nothing is persisted.

use std::collections::HashMap;
use std::sync::Arc;

use frames::Frame;
use frames::events::{JsonObject, PresenceUser};
use indexmap::IndexMap;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

// =============================================================================
// ROLE
// =============================================================================

/// Permission role for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Editor,
    /// Receives everything, may not change objects.
    Viewer,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    /// Parse a role name. Anything other than `viewer` is an editor.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("viewer") { Self::Viewer } else { Self::Editor }
    }
}

// =============================================================================
// MEMBER / ROOM
// =============================================================================

/// Identity the relay assigns to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub user_name: String,
    pub user_color: String,
    pub role: Role,
}

impl Identity {
    #[must_use]
    pub fn presence(&self) -> PresenceUser {
        PresenceUser {
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            user_color: self.user_color.clone(),
        }
    }
}

/// A connection inside a room.
pub struct Member {
    pub identity: Identity,
    pub tx: mpsc::Sender<Frame>,
}

/// Live state for one board.
#[derive(Default)]
pub struct Room {
    /// Accepted objects keyed by id, in creation order.
    pub objects: IndexMap<String, JsonObject>,
    /// Connected members keyed by connection id.
    pub members: HashMap<Uuid, Member>,
}

impl Room {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

#[derive(Clone, Default)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<String, Room>>>,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
