//! Room service: join/part, presence, object state, and broadcast.
//!
//! DESIGN
//! ======
//! A room is created on first join and evicted when its last member parts.
//! The relay never interprets objects beyond their `id`: creates insert the
//! object as sent, updates shallow-merge the patch, deletes drop the entry.
//! Whatever arrives last wins.

use frames::events::{JsonObject, PresenceUser};
use frames::{ErrorCode, Frame};
use rand::Rng;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::{AppState, Identity, Member, Room};

/// Colors handed out to connections, in no particular order.
pub const PALETTE: [&str; 8] =
    ["#ef4444", "#f97316", "#eab308", "#22c55e", "#06b6d4", "#3b82f6", "#8b5cf6", "#ec4899"];

/// Fields a patch can never change.
const IDENTITY_FIELDS: [&str; 4] = ["id", "board_id", "type", "created_by"];

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("must join a board first")]
    NotJoined,
    #[error("board id required")]
    MissingBoardId,
    #[error("event addressed to board {requested} but joined {joined}")]
    WrongBoard { joined: String, requested: String },
    #[error("read-only role cannot modify objects")]
    ReadOnly,
    #[error("object is missing a string id")]
    MissingObjectId,
}

impl ErrorCode for RoomError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotJoined => "E_NOT_JOINED",
            Self::MissingBoardId => "E_BOARD_REQUIRED",
            Self::WrongBoard { .. } => "E_WRONG_BOARD",
            Self::ReadOnly => "E_READ_ONLY",
            Self::MissingObjectId => "E_INVALID_OBJECT",
        }
    }
}

/// Pick a cursor color for a new connection.
#[must_use]
pub fn random_color() -> &'static str {
    PALETTE[rand::rng().random_range(0..PALETTE.len())]
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Add a connection to a room, creating the room if needed.
/// Returns the room's objects in creation order.
pub async fn join_room(
    state: &AppState,
    board_id: &str,
    client_id: Uuid,
    identity: Identity,
    tx: mpsc::Sender<Frame>,
) -> Vec<JsonObject> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.entry(board_id.to_owned()).or_insert_with(Room::new);
    room.members.insert(client_id, Member { identity, tx });
    info!(%board_id, %client_id, members = room.members.len(), "client joined room");
    room.objects.values().cloned().collect()
}

/// Remove a connection from a room. Evicts the room when it empties.
/// Returns the departed member's identity, if it was present.
pub async fn part_room(state: &AppState, board_id: &str, client_id: Uuid) -> Option<Identity> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(board_id)?;
    let member = room.members.remove(&client_id)?;
    info!(%board_id, %client_id, remaining = room.members.len(), "client left room");

    if room.members.is_empty() {
        rooms.remove(board_id);
        info!(%board_id, "evicted room");
    }
    Some(member.identity)
}

/// Current roster of a room, one entry per connection.
pub async fn roster(state: &AppState, board_id: &str) -> Vec<PresenceUser> {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(board_id) else {
        return Vec::new();
    };
    let mut users: Vec<PresenceUser> = room.members.values().map(|m| m.identity.presence()).collect();
    users.sort_by(|a, b| a.user_name.cmp(&b.user_name).then_with(|| a.user_id.cmp(&b.user_id)));
    users
}

// =============================================================================
// OBJECTS
// =============================================================================

/// Store a created object. Overwrites an existing object with the same id.
///
/// # Errors
///
/// Returns [`RoomError::MissingObjectId`] if the object has no string `id`,
/// or [`RoomError::NotJoined`] if the room does not exist.
pub async fn create_object(state: &AppState, board_id: &str, object: JsonObject) -> Result<(), RoomError> {
    let Some(id) = object.get("id").and_then(Value::as_str).map(ToOwned::to_owned) else {
        return Err(RoomError::MissingObjectId);
    };
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(board_id).ok_or(RoomError::NotJoined)?;
    debug!(%board_id, %id, "object created");
    room.objects.insert(id, object);
    Ok(())
}

/// Shallow-merge `patch` into an object. Returns `false` if the object is unknown.
pub async fn update_object(state: &AppState, board_id: &str, object_id: &str, patch: &JsonObject) -> bool {
    let mut rooms = state.rooms.write().await;
    let Some(object) = rooms.get_mut(board_id).and_then(|room| room.objects.get_mut(object_id)) else {
        debug!(%board_id, %object_id, "update for unknown object");
        return false;
    };
    merge_patch(object, patch);
    true
}

/// Drop an object. Returns `false` if it was not present.
pub async fn delete_object(state: &AppState, board_id: &str, object_id: &str) -> bool {
    let mut rooms = state.rooms.write().await;
    rooms.get_mut(board_id).and_then(|room| room.objects.shift_remove(object_id)).is_some()
}

/// Apply `patch` field by field. `null` removes a field; identity fields are kept.
pub fn merge_patch(object: &mut JsonObject, patch: &JsonObject) {
    for (key, value) in patch {
        if IDENTITY_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if value.is_null() {
            object.remove(key);
        } else {
            object.insert(key.clone(), value.clone());
        }
    }
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Send a frame to every member of a room, optionally excluding one.
pub async fn broadcast(state: &AppState, board_id: &str, frame: &Frame, exclude: Option<Uuid>) {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(board_id) else {
        return;
    };

    for (client_id, member) in &room.members {
        if exclude == Some(*client_id) {
            continue;
        }
        // Best-effort: a client whose channel is full misses this frame.
        if member.tx.try_send(frame.clone()).is_err() {
            debug!(%board_id, %client_id, syscall = %frame.syscall, "dropped frame for slow client");
        }
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
