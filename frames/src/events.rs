//! Typed board events carried in [`Frame`] payloads.
//!
//! Payload field names are part of the contract with every peer and are
//! kept camelCase on the wire (`boardId`, `objectId`, `userColor`, ...).
//! Object and patch payloads are generic so the relay can treat them as
//! opaque JSON maps while the client decodes them into its own store types.

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CodecError, Frame};

// ── Event names ─────────────────────────────────────────────────

pub const BOARD_JOIN: &str = "board:join";
pub const BOARD_LEAVE: &str = "board:leave";
pub const BOARD_STATE: &str = "board:state";
pub const CURSOR_MOVE: &str = "cursor:move";
pub const CURSOR_MOVED: &str = "cursor:moved";
pub const CURSOR_LEFT: &str = "cursor:left";
pub const OBJECT_CREATE: &str = "object:create";
pub const OBJECT_UPDATE: &str = "object:update";
pub const OBJECT_DELETE: &str = "object:delete";
pub const PRESENCE_UPDATE: &str = "presence:update";
pub const ROLE_CHANGED: &str = "role:changed";

/// Opaque JSON object, used by the relay for objects and patches it never inspects.
pub type JsonObject = Map<String, Value>;

// ── Payloads ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinBoard {
    pub board_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBoard {
    pub board_id: String,
}

/// Full-state snapshot answering a join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot<O> {
    pub objects: Vec<O>,
}

/// Local pointer position in board-space, sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorMove {
    pub board_id: String,
    pub x: f64,
    pub y: f64,
}

/// Peer pointer position, relayed with the peer's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorMoved {
    pub user_id: String,
    pub user_name: String,
    pub user_color: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorLeft {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectCreate<O> {
    pub board_id: String,
    pub object: O,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectUpdate<P> {
    pub board_id: String,
    pub object_id: String,
    pub props: P,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDelete {
    pub board_id: String,
    pub object_id: String,
}

/// One member of the live presence roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUser {
    pub user_id: String,
    pub user_name: String,
    pub user_color: String,
}

/// Complete roster; replaces whatever the receiver held before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub users: Vec<PresenceUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChanged {
    pub role: String,
}

// ── Client → server ─────────────────────────────────────────────

/// Every event a client sends.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent<O, P> {
    Join(JoinBoard),
    Leave(LeaveBoard),
    CursorMove(CursorMove),
    ObjectCreate(ObjectCreate<O>),
    ObjectUpdate(ObjectUpdate<P>),
    ObjectDelete(ObjectDelete),
}

impl<O, P> ClientEvent<O, P>
where
    O: Serialize + DeserializeOwned,
    P: Serialize + DeserializeOwned,
{
    /// Wire event name.
    #[must_use]
    pub fn syscall(&self) -> &'static str {
        match self {
            Self::Join(_) => BOARD_JOIN,
            Self::Leave(_) => BOARD_LEAVE,
            Self::CursorMove(_) => CURSOR_MOVE,
            Self::ObjectCreate(_) => OBJECT_CREATE,
            Self::ObjectUpdate(_) => OBJECT_UPDATE,
            Self::ObjectDelete(_) => OBJECT_DELETE,
        }
    }

    /// Board room the event is addressed to.
    #[must_use]
    pub fn board_id(&self) -> &str {
        match self {
            Self::Join(p) => &p.board_id,
            Self::Leave(p) => &p.board_id,
            Self::CursorMove(p) => &p.board_id,
            Self::ObjectCreate(p) => &p.board_id,
            Self::ObjectUpdate(p) => &p.board_id,
            Self::ObjectDelete(p) => &p.board_id,
        }
    }

    /// Wrap the event in a request frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Payload`] if the payload cannot be serialized.
    pub fn to_frame(&self) -> Result<Frame, CodecError> {
        let syscall = self.syscall();
        let data = match self {
            Self::Join(p) => encode_payload(syscall, p)?,
            Self::Leave(p) => encode_payload(syscall, p)?,
            Self::CursorMove(p) => encode_payload(syscall, p)?,
            Self::ObjectCreate(p) => encode_payload(syscall, p)?,
            Self::ObjectUpdate(p) => encode_payload(syscall, p)?,
            Self::ObjectDelete(p) => encode_payload(syscall, p)?,
        };
        Ok(Frame::request(syscall, data).with_board_id(self.board_id()))
    }

    /// Parse a frame received from a client.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownSyscall`] for names outside this enum and
    /// [`CodecError::Payload`] for mismatched payloads.
    pub fn from_frame(frame: &Frame) -> Result<Self, CodecError> {
        let syscall = frame.syscall.as_str();
        let data = &frame.data;
        Ok(match syscall {
            BOARD_JOIN => Self::Join(decode_payload(syscall, data)?),
            BOARD_LEAVE => Self::Leave(decode_payload(syscall, data)?),
            CURSOR_MOVE => Self::CursorMove(decode_payload(syscall, data)?),
            OBJECT_CREATE => Self::ObjectCreate(decode_payload(syscall, data)?),
            OBJECT_UPDATE => Self::ObjectUpdate(decode_payload(syscall, data)?),
            OBJECT_DELETE => Self::ObjectDelete(decode_payload(syscall, data)?),
            other => return Err(CodecError::UnknownSyscall(other.to_owned())),
        })
    }
}

// ── Server → client ─────────────────────────────────────────────

/// Every event a server sends.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent<O, P> {
    Snapshot(BoardSnapshot<O>),
    CursorMoved(CursorMoved),
    CursorLeft(CursorLeft),
    ObjectCreate(ObjectCreate<O>),
    ObjectUpdate(ObjectUpdate<P>),
    ObjectDelete(ObjectDelete),
    Presence(PresenceUpdate),
    RoleChanged(RoleChanged),
}

impl<O, P> ServerEvent<O, P>
where
    O: Serialize + DeserializeOwned,
    P: Serialize + DeserializeOwned,
{
    /// Wire event name.
    #[must_use]
    pub fn syscall(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => BOARD_STATE,
            Self::CursorMoved(_) => CURSOR_MOVED,
            Self::CursorLeft(_) => CURSOR_LEFT,
            Self::ObjectCreate(_) => OBJECT_CREATE,
            Self::ObjectUpdate(_) => OBJECT_UPDATE,
            Self::ObjectDelete(_) => OBJECT_DELETE,
            Self::Presence(_) => PRESENCE_UPDATE,
            Self::RoleChanged(_) => ROLE_CHANGED,
        }
    }

    /// Serialize the event payload.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Payload`] if the payload cannot be serialized.
    pub fn to_data(&self) -> Result<Value, CodecError> {
        let syscall = self.syscall();
        match self {
            Self::Snapshot(p) => encode_payload(syscall, p),
            Self::CursorMoved(p) => encode_payload(syscall, p),
            Self::CursorLeft(p) => encode_payload(syscall, p),
            Self::ObjectCreate(p) => encode_payload(syscall, p),
            Self::ObjectUpdate(p) => encode_payload(syscall, p),
            Self::ObjectDelete(p) => encode_payload(syscall, p),
            Self::Presence(p) => encode_payload(syscall, p),
            Self::RoleChanged(p) => encode_payload(syscall, p),
        }
    }

    /// Wrap the event in a request frame scoped to `board_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Payload`] if the payload cannot be serialized.
    pub fn to_frame(&self, board_id: &str) -> Result<Frame, CodecError> {
        Ok(Frame::request(self.syscall(), self.to_data()?).with_board_id(board_id))
    }

    /// Parse a frame received from the server.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownSyscall`] for names outside this enum and
    /// [`CodecError::Payload`] for mismatched payloads.
    pub fn from_frame(frame: &Frame) -> Result<Self, CodecError> {
        // The join reply carries the snapshot under the request's syscall.
        let syscall = if frame.syscall == BOARD_JOIN { BOARD_STATE } else { frame.syscall.as_str() };
        let data = &frame.data;
        Ok(match syscall {
            BOARD_STATE => Self::Snapshot(decode_payload(syscall, data)?),
            CURSOR_MOVED => Self::CursorMoved(decode_payload(syscall, data)?),
            CURSOR_LEFT => Self::CursorLeft(decode_payload(syscall, data)?),
            OBJECT_CREATE => Self::ObjectCreate(decode_payload(syscall, data)?),
            OBJECT_UPDATE => Self::ObjectUpdate(decode_payload(syscall, data)?),
            OBJECT_DELETE => Self::ObjectDelete(decode_payload(syscall, data)?),
            PRESENCE_UPDATE => Self::Presence(decode_payload(syscall, data)?),
            ROLE_CHANGED => Self::RoleChanged(decode_payload(syscall, data)?),
            other => return Err(CodecError::UnknownSyscall(other.to_owned())),
        })
    }
}

fn encode_payload<T: Serialize>(syscall: &str, payload: &T) -> Result<Value, CodecError> {
    serde_json::to_value(payload).map_err(|source| CodecError::Payload { syscall: syscall.to_owned(), source })
}

fn decode_payload<T: DeserializeOwned>(syscall: &str, data: &Value) -> Result<T, CodecError> {
    T::deserialize(data).map_err(|source| CodecError::Payload { syscall: syscall.to_owned(), source })
}
