//! Transport bridge between a board session and the realtime relay.
//!
//! SYSTEM CONTEXT
//! ==============
//! The bridge is sans-IO. The driver tells it when the socket opens and
//! closes, hands it every decoded inbound [`Frame`], and drains
//! [`Bridge::take_outbound`] after each step. Everything in between is plain
//! state mutation, so the whole protocol is testable without a socket.
//!
//! DESIGN
//! ======
//! - Inbound events are applied independently in arrival order. A snapshot
//!   replaces the store wholesale and schedules a view fit. Snapshot entries
//!   are decoded one at a time; an entry that is not a valid object is
//!   skipped and the rest still load.
//! - Local edits are applied to the store first; the matching wire event is
//!   queued afterwards, one per object action.
//! - Nothing is queued while disconnected. An edit made offline is kept
//!   locally and superseded by the snapshot that follows the next join.
//! - Cursor positions pass through a [`CursorThrottle`].

use std::collections::{HashMap, VecDeque};

use canvas::batch::Batch;
use canvas::camera::Point;
use canvas::doc::{BoardObject, ObjectId, ObjectKind, ObjectPatch};
use canvas::engine::Action;
use canvas::input::{Button, Key, Modifiers, Tool, WheelDelta};
use canvas::layout;
use canvas::presence::{Cursor, CursorThrottle, Peer};
use frames::events::{
    BOARD_JOIN, BOARD_STATE, BoardSnapshot, CursorMove, JoinBoard, LeaveBoard, ObjectCreate, ObjectDelete,
    ObjectUpdate,
};
use frames::{Frame, Status};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::session::BoardSession;

/// Events the client sends.
pub type OutboundEvent = frames::ClientEvent<BoardObject, ObjectPatch>;
/// Events the relay sends.
pub type InboundEvent = frames::ServerEvent<BoardObject, ObjectPatch>;

/// Connectivity as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Shift snapshots out of negative coordinates on ingestion.
    pub renormalize: bool,
    pub cursor_interval_ms: i64,
    pub broadcast_undo: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self { renormalize: true, cursor_interval_ms: canvas::consts::CURSOR_EMIT_INTERVAL_MS, broadcast_undo: false }
    }
}

impl From<&crate::config::ClientConfig> for BridgeOptions {
    fn from(config: &crate::config::ClientConfig) -> Self {
        Self {
            renormalize: config.renormalize,
            cursor_interval_ms: config.cursor_interval_ms,
            broadcast_undo: config.broadcast_undo,
        }
    }
}

/// Result of an AI batch, reported back to whoever submitted it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Temp id to the id the object was created with.
    pub resolved: HashMap<String, ObjectId>,
    pub skipped: usize,
}

/// Local work for the bridge, sent by the host through the driver.
pub enum Command {
    PointerDown { at: Point, button: Button, modifiers: Modifiers },
    PointerMove { at: Point, modifiers: Modifiers },
    PointerUp { at: Point, button: Button, modifiers: Modifiers },
    Wheel { at: Point, delta: WheelDelta, modifiers: Modifiers },
    Key { key: Key, modifiers: Modifiers },
    Viewport { width: f64, height: f64 },
    SetTool(Tool),
    SetColor(Option<String>),
    Create { kind: ObjectKind, x: f64, y: f64 },
    Connect { from_id: ObjectId, to_id: ObjectId },
    Update { id: ObjectId, patch: ObjectPatch },
    Delete { ids: Vec<ObjectId> },
    Batch { batch: Batch, reply: Option<oneshot::Sender<BatchReport>> },
    Undo,
    /// Run a read-only closure against the session.
    Inspect(Box<dyn FnOnce(&BoardSession) + Send>),
    /// Send `board:leave` and tear the session down.
    Leave,
}

type RoleCallback = Box<dyn FnMut(&str) + Send>;

pub struct Bridge {
    session: BoardSession,
    status: ConnectionStatus,
    options: BridgeOptions,
    throttle: CursorThrottle,
    outbound: VecDeque<Frame>,
    on_role_changed: Option<RoleCallback>,
}

impl Bridge {
    #[must_use]
    pub fn new(mut session: BoardSession, options: BridgeOptions) -> Self {
        session.engine.broadcast_undo = options.broadcast_undo;
        Self {
            session,
            status: ConnectionStatus::Disconnected,
            options,
            throttle: CursorThrottle::new(options.cursor_interval_ms),
            outbound: VecDeque::new(),
            on_role_changed: None,
        }
    }

    #[must_use]
    pub fn session(&self) -> &BoardSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut BoardSession {
        &mut self.session
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Register the callback invoked on every `role:changed`.
    pub fn on_role_changed(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.on_role_changed = Some(Box::new(callback));
    }

    // --- Connection lifecycle ---

    pub fn on_connecting(&mut self) {
        self.status = ConnectionStatus::Connecting;
    }

    /// Socket is open: (re)join the board. The relay answers with a full snapshot.
    pub fn on_connected(&mut self) {
        self.status = ConnectionStatus::Connected;
        self.throttle.reset();
        let board_id = self.session.board_id().to_owned();
        info!(%board_id, "bridge: connected, joining board");
        self.queue(&OutboundEvent::Join(JoinBoard { board_id }));
    }

    /// Socket closed. Peer cursors go; board objects stay until teardown.
    pub fn on_disconnected(&mut self) {
        if self.status != ConnectionStatus::Disconnected {
            info!(board_id = %self.session.board_id(), "bridge: disconnected");
        }
        self.status = ConnectionStatus::Disconnected;
        self.session.cursors.clear();
        self.outbound.clear();
    }

    /// Announce departure (if connected) and drop all session state.
    pub fn leave(&mut self) {
        if self.is_connected() {
            let board_id = self.session.board_id().to_owned();
            info!(%board_id, "bridge: leaving board");
            self.queue(&OutboundEvent::Leave(LeaveBoard { board_id }));
        }
        self.session.teardown();
    }

    /// Frames waiting to be written to the socket, in emit order.
    pub fn take_outbound(&mut self) -> Vec<Frame> {
        self.outbound.drain(..).collect()
    }

    // --- Inbound ---

    /// Apply one frame from the relay. Returns view actions for the host.
    pub fn handle_frame(&mut self, frame: &Frame) -> Vec<Action> {
        if frame.status == Status::Error {
            warn!(
                syscall = %frame.syscall,
                error_message = frame.error_message().unwrap_or("-"),
                "bridge: relay returned error"
            );
            return Vec::new();
        }
        if matches!(frame.syscall.as_str(), BOARD_STATE | BOARD_JOIN) {
            return match serde_json::from_value::<BoardSnapshot<Value>>(frame.data.clone()) {
                Ok(snapshot) => self.load_snapshot(decode_snapshot_objects(snapshot.objects)),
                Err(e) => {
                    warn!(syscall = %frame.syscall, error = %e, "bridge: dropping malformed snapshot");
                    Vec::new()
                }
            };
        }
        match InboundEvent::from_frame(frame) {
            Ok(event) => self.handle_event(event),
            Err(e) => {
                warn!(syscall = %frame.syscall, error = %e, "bridge: dropping malformed frame");
                Vec::new()
            }
        }
    }

    /// Apply one decoded relay event.
    pub fn handle_event(&mut self, event: InboundEvent) -> Vec<Action> {
        match event {
            InboundEvent::Snapshot(snapshot) => self.load_snapshot(snapshot.objects),
            InboundEvent::ObjectCreate(ev) => {
                if !self.is_current_board(&ev.board_id) {
                    return Vec::new();
                }
                debug!(id = %ev.object.id, "bridge: remote create");
                self.session.engine.apply_create(ev.object);
                vec![Action::RenderNeeded]
            }
            InboundEvent::ObjectUpdate(ev) => {
                if !self.is_current_board(&ev.board_id) {
                    return Vec::new();
                }
                debug!(id = %ev.object_id, "bridge: remote update");
                self.session.engine.apply_update(&ev.object_id, &ev.props);
                vec![Action::RenderNeeded]
            }
            InboundEvent::ObjectDelete(ev) => {
                if !self.is_current_board(&ev.board_id) {
                    return Vec::new();
                }
                debug!(id = %ev.object_id, "bridge: remote delete");
                self.session.engine.apply_delete(&ev.object_id);
                vec![Action::RenderNeeded]
            }
            InboundEvent::CursorMoved(ev) => {
                self.session.cursors.upsert(Cursor {
                    user_id: ev.user_id,
                    user_name: ev.user_name,
                    user_color: ev.user_color,
                    x: ev.x,
                    y: ev.y,
                });
                vec![Action::RenderNeeded]
            }
            InboundEvent::CursorLeft(ev) => {
                self.session.cursors.remove(&ev.user_id);
                vec![Action::RenderNeeded]
            }
            InboundEvent::Presence(ev) => {
                let users = ev
                    .users
                    .into_iter()
                    .map(|u| Peer { user_id: u.user_id, user_name: u.user_name, user_color: u.user_color })
                    .collect();
                self.session.roster.replace(users);
                vec![Action::RenderNeeded]
            }
            InboundEvent::RoleChanged(ev) => {
                info!(role = %ev.role, "bridge: role changed");
                if let Some(callback) = self.on_role_changed.as_mut() {
                    callback(&ev.role);
                }
                self.session.role = Some(ev.role);
                Vec::new()
            }
        }
    }

    fn load_snapshot(&mut self, mut objects: Vec<BoardObject>) -> Vec<Action> {
        if self.options.renormalize {
            if let Some((dx, dy)) = layout::renormalize(&mut objects) {
                debug!(dx, dy, "bridge: renormalized snapshot");
            }
        }
        info!(board_id = %self.session.board_id(), count = objects.len(), "bridge: snapshot");
        self.session.engine.load_snapshot(objects)
    }

    fn is_current_board(&self, board_id: &str) -> bool {
        // Older relays omit the board id on relayed object events.
        let ok = board_id.is_empty() || board_id == self.session.board_id();
        if !ok {
            debug!(%board_id, "bridge: ignoring event for another board");
        }
        ok
    }

    // --- Outbound ---

    /// Apply a local command and queue its wire events. Returns view actions.
    pub fn handle_command(&mut self, command: Command, now_ms: i64) -> Vec<Action> {
        let actions = match command {
            Command::PointerDown { at, button, modifiers } => {
                self.session.engine.on_pointer_down(at, button, modifiers)
            }
            Command::PointerMove { at, modifiers } => self.session.engine.on_pointer_move(at, modifiers),
            Command::PointerUp { at, button, modifiers } => self.session.engine.on_pointer_up(at, button, modifiers),
            Command::Wheel { at, delta, modifiers } => self.session.engine.on_wheel(at, delta, modifiers),
            Command::Key { key, modifiers } => self.session.engine.on_key_down(key, modifiers),
            Command::Viewport { width, height } => self.session.engine.set_viewport(width, height),
            Command::SetTool(tool) => {
                self.session.engine.set_tool(tool);
                vec![Action::RenderNeeded]
            }
            Command::SetColor(color) => {
                self.session.engine.set_active_color(color);
                Vec::new()
            }
            Command::Create { kind, x, y } => self.session.engine.create_object(kind, x, y),
            Command::Connect { from_id, to_id } => self.session.engine.create_connector(&from_id, &to_id),
            Command::Update { id, patch } => self.session.engine.update_object(&id, patch),
            Command::Delete { ids } => self.session.engine.delete_objects(&ids),
            Command::Batch { batch, reply } => {
                let outcome = self.session.engine.apply_batch(&batch);
                info!(
                    actions = batch.actions.len(),
                    skipped = outcome.skipped,
                    "bridge: applied batch"
                );
                if let Some(reply) = reply {
                    let report = BatchReport { resolved: outcome.resolved, skipped: outcome.skipped };
                    if reply.send(report).is_err() {
                        debug!("bridge: batch reply receiver dropped");
                    }
                }
                outcome.actions
            }
            Command::Undo => self.session.engine.undo(),
            Command::Inspect(inspect) => {
                inspect(&self.session);
                Vec::new()
            }
            Command::Leave => {
                self.leave();
                Vec::new()
            }
        };
        self.emit(actions, now_ms)
    }

    /// Queue wire events for the object and cursor actions in `actions`.
    /// Everything else is handed back for the host.
    pub fn emit(&mut self, actions: Vec<Action>, now_ms: i64) -> Vec<Action> {
        let board_id = self.session.board_id().to_owned();
        let mut host = Vec::new();
        for action in actions {
            let event = match action {
                Action::ObjectCreated(object) => {
                    OutboundEvent::ObjectCreate(ObjectCreate { board_id: board_id.clone(), object })
                }
                Action::ObjectUpdated { id, patch } => OutboundEvent::ObjectUpdate(ObjectUpdate {
                    board_id: board_id.clone(),
                    object_id: id,
                    props: patch,
                }),
                Action::ObjectDeleted { id } => {
                    OutboundEvent::ObjectDelete(ObjectDelete { board_id: board_id.clone(), object_id: id })
                }
                Action::CursorMoved(at) => {
                    if !self.is_connected() || !self.throttle.should_emit(now_ms) {
                        continue;
                    }
                    OutboundEvent::CursorMove(CursorMove { board_id: board_id.clone(), x: at.x, y: at.y })
                }
                other => {
                    host.push(other);
                    continue;
                }
            };
            self.queue(&event);
        }
        host
    }

    fn queue(&mut self, event: &OutboundEvent) {
        if !self.is_connected() {
            debug!(syscall = event.syscall(), "bridge: not connected, event not sent");
            return;
        }
        match event.to_frame() {
            Ok(frame) => self.outbound.push_back(frame),
            Err(e) => warn!(syscall = event.syscall(), error = %e, "bridge: failed to encode event"),
        }
    }
}

/// Decode snapshot entries independently, skipping the ones that are not objects.
fn decode_snapshot_objects(entries: Vec<Value>) -> Vec<BoardObject> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<BoardObject>(entry) {
            Ok(object) => Some(object),
            Err(e) => {
                warn!(index, error = %e, "bridge: skipping invalid snapshot object");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "bridge_test.rs"]
mod tests;
