//! WebSocket handler for the room-scoped board event relay.
//!
//! DESIGN
//! ======
//! On upgrade, assigns the connection a user id and cursor color, then
//! enters a `select!` loop:
//! - Incoming client frames → decode + dispatch by event
//! - Frames broadcast by room peers → forward to client
//!
//! Handler functions validate, mutate room state, and return an `Outcome`.
//! The dispatch layer owns all outbound concerns: reply to sender and
//! broadcast to peers.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade with `?user=<name>&role=<role>`
//! 2. `board:join` → `board:state` reply, `role:changed`, presence to the room
//! 3. Object and cursor events → stored (objects only) and sent to peers
//! 4. `board:leave` or close → `cursor:left` and presence to the room

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use frames::events::{
    BOARD_STATE, CURSOR_LEFT, CURSOR_MOVED, CursorMove, JsonObject, PRESENCE_UPDATE, ROLE_CHANGED,
};
use frames::{ClientEvent, Frame, Status};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::room::{self, RoomError};
use crate::state::{AppState, Identity, Role};

/// Client events as the relay sees them: objects and patches stay opaque.
type RelayEvent = ClientEvent<JsonObject, JsonObject>;

/// Outbound queue depth per connection.
const CLIENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what; handlers never write to the socket.
#[derive(Debug)]
enum Outcome {
    /// Send this frame to every room member except the sender. No reply.
    BroadcastExcludeSender(Frame),
    /// Send these frames to the sender only.
    Reply(Vec<Frame>),
    /// Nothing to send.
    Quiet,
}

// =============================================================================
// UPGRADE
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub user: Option<String>,
    pub role: Option<String>,
}

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = assign_identity(params);
    ws.on_upgrade(move |socket| run_ws(socket, state, identity))
}

/// Build the identity for a new connection from its query parameters.
fn assign_identity(params: ConnectParams) -> Identity {
    let user_id = Uuid::new_v4().to_string();
    let user_name = params
        .user
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("guest-{}", &user_id[..4]));
    let role = params.role.as_deref().map_or(Role::Editor, Role::parse);
    Identity { user_id, user_name, user_color: room::random_color().to_owned(), role }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Per-connection state carried through dispatch.
struct Connection {
    client_id: Uuid,
    identity: Identity,
    /// Sender half of this connection's broadcast channel, handed to rooms.
    tx: mpsc::Sender<Frame>,
    /// Room this connection has joined.
    board: Option<String>,
}

impl Connection {
    fn new(identity: Identity, tx: mpsc::Sender<Frame>) -> Self {
        Self { client_id: Uuid::new_v4(), identity, tx, board: None }
    }
}

async fn run_ws(mut socket: WebSocket, state: AppState, identity: Identity) {
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(CLIENT_CHANNEL_CAPACITY);
    let mut conn = Connection::new(identity, client_tx);

    info!(
        client_id = %conn.client_id,
        user_id = %conn.identity.user_id,
        role = conn.identity.role.as_str(),
        "ws: client connected"
    );

    'conn: loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Binary(bytes) => {
                        for frame in process_inbound_bytes(&state, &mut conn, &bytes).await {
                            if send_frame(&mut socket, &frame).await.is_err() {
                                break 'conn;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(board_id) = conn.board.take() {
        depart(&state, &board_id, conn.client_id).await;
    }
    info!(client_id = %conn.client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Decode and process one inbound binary frame and return frames for the sender.
async fn process_inbound_bytes(state: &AppState, conn: &mut Connection, bytes: &[u8]) -> Vec<Frame> {
    let mut req = match frames::decode_frame(bytes) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(client_id = %conn.client_id, error = %e, "ws: invalid inbound frame");
            return vec![Frame::request("gateway:error", json!({ "message": format!("invalid frame: {e}") }))];
        }
    };

    // Stamp the relay-assigned user id as `from`.
    req.from = Some(conn.identity.user_id.clone());

    if req.prefix() == "cursor" {
        debug!(client_id = %conn.client_id, "ws: recv cursor");
    } else {
        info!(client_id = %conn.client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");
    }

    let event = match RelayEvent::from_frame(&req) {
        Ok(event) => event,
        Err(e) => {
            warn!(client_id = %conn.client_id, syscall = %req.syscall, error = %e, "ws: rejected frame");
            return vec![req.error(e.to_string())];
        }
    };

    let result = match event {
        ClientEvent::Join(p) => handle_join(state, conn, &req, &p.board_id).await,
        ClientEvent::Leave(_) => Ok(handle_leave(state, conn).await),
        ClientEvent::CursorMove(p) => Ok(handle_cursor(conn, &p)),
        event => handle_object(state, conn, &req, &event).await,
    };

    match result {
        Ok(Outcome::BroadcastExcludeSender(frame)) => {
            if let Some(board_id) = &conn.board {
                room::broadcast(state, board_id, &frame, Some(conn.client_id)).await;
            }
            Vec::new()
        }
        Ok(Outcome::Reply(frames)) => frames,
        Ok(Outcome::Quiet) => Vec::new(),
        Err(e) => vec![req.error_from(&e)],
    }
}

// =============================================================================
// BOARD HANDLERS
// =============================================================================

async fn handle_join(
    state: &AppState,
    conn: &mut Connection,
    req: &Frame,
    board_id: &str,
) -> Result<Outcome, RoomError> {
    let board_id = if board_id.is_empty() { req.board_id.as_deref().unwrap_or_default() } else { board_id };
    if board_id.is_empty() {
        return Err(RoomError::MissingBoardId);
    }

    // Part the current room unless this is a rejoin of the same board.
    if let Some(old) = conn.board.take_if(|old| old.as_str() != board_id) {
        depart(state, &old, conn.client_id).await;
    }

    let objects = room::join_room(state, board_id, conn.client_id, conn.identity.clone(), conn.tx.clone()).await;
    conn.board = Some(board_id.to_owned());
    announce_presence(state, board_id).await;

    let objects = Value::Array(objects.into_iter().map(Value::Object).collect());
    let mut snapshot = req.done_with(json!({ "objects": objects }));
    BOARD_STATE.clone_into(&mut snapshot.syscall);
    snapshot.board_id = Some(board_id.to_owned());
    let role = Frame::request(ROLE_CHANGED, json!({ "role": conn.identity.role.as_str() })).with_board_id(board_id);
    Ok(Outcome::Reply(vec![snapshot, role]))
}

async fn handle_leave(state: &AppState, conn: &mut Connection) -> Outcome {
    if let Some(board_id) = conn.board.take() {
        depart(state, &board_id, conn.client_id).await;
    }
    Outcome::Quiet
}

/// Remove a connection from a room and tell the remaining members.
async fn depart(state: &AppState, board_id: &str, client_id: Uuid) {
    let Some(identity) = room::part_room(state, board_id, client_id).await else {
        return;
    };
    let left = Frame::request(CURSOR_LEFT, json!({ "userId": identity.user_id })).with_board_id(board_id);
    room::broadcast(state, board_id, &left, None).await;
    announce_presence(state, board_id).await;
}

/// Send the full roster to every member of a room.
async fn announce_presence(state: &AppState, board_id: &str) {
    let users = room::roster(state, board_id).await;
    if users.is_empty() {
        return;
    }
    let frame = Frame::request(PRESENCE_UPDATE, json!({ "users": users })).with_board_id(board_id);
    room::broadcast(state, board_id, &frame, None).await;
}

// =============================================================================
// OBJECT HANDLERS
// =============================================================================

async fn handle_object(
    state: &AppState,
    conn: &Connection,
    req: &Frame,
    event: &RelayEvent,
) -> Result<Outcome, RoomError> {
    let Some(board_id) = conn.board.as_deref() else {
        return Err(RoomError::NotJoined);
    };
    let requested = event.board_id();
    if !requested.is_empty() && requested != board_id {
        return Err(RoomError::WrongBoard { joined: board_id.to_owned(), requested: requested.to_owned() });
    }
    if conn.identity.role == Role::Viewer {
        return Err(RoomError::ReadOnly);
    }

    match event {
        ClientEvent::ObjectCreate(p) => room::create_object(state, board_id, p.object.clone()).await?,
        ClientEvent::ObjectUpdate(p) => {
            room::update_object(state, board_id, &p.object_id, &p.props).await;
        }
        ClientEvent::ObjectDelete(p) => {
            room::delete_object(state, board_id, &p.object_id).await;
        }
        ClientEvent::Join(_) | ClientEvent::Leave(_) | ClientEvent::CursorMove(_) => return Ok(Outcome::Quiet),
    }

    let peer_frame = Frame::request(req.syscall.clone(), req.data.clone())
        .with_board_id(board_id)
        .with_from(conn.identity.user_id.clone());
    Ok(Outcome::BroadcastExcludeSender(peer_frame))
}

// =============================================================================
// CURSOR HANDLER
// =============================================================================

fn handle_cursor(conn: &Connection, p: &CursorMove) -> Outcome {
    let Some(board_id) = conn.board.as_deref() else {
        // Silently ignore cursor moves before joining.
        return Outcome::Quiet;
    };
    let identity = &conn.identity;
    let data = json!({
        "userId": identity.user_id,
        "userName": identity.user_name,
        "userColor": identity.user_color,
        "x": p.x,
        "y": p.y,
    });
    Outcome::BroadcastExcludeSender(
        Frame::request(CURSOR_MOVED, data).with_board_id(board_id).with_from(identity.user_id.clone()),
    )
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), axum::Error> {
    if !frame.syscall.starts_with("cursor:") {
        if frame.status == Status::Error {
            let code = frame.data.get("code").and_then(Value::as_str).unwrap_or("-");
            let message = frame.error_message().unwrap_or("-");
            warn!(id = %frame.id, syscall = %frame.syscall, code, error_message = message, "ws: send frame status=Error");
        } else {
            debug!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
        }
    }
    socket.send(Message::Binary(frames::encode_frame(frame).into())).await
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
