use std::time::Duration;

use canvas::doc::{BoardObject, ObjectKind};
use frames::events::BoardSnapshot;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;

use super::*;
use crate::bridge::InboundEvent;
use crate::config::ReconnectPolicy;

type ServerSocket = WebSocketStream<TcpStream>;

fn fast_config(port: u16) -> ClientConfig {
    ClientConfig {
        url: format!("ws://127.0.0.1:{port}/ws"),
        reconnect: ReconnectPolicy { max_attempts: 3, initial_backoff_ms: 10, max_backoff_ms: 20 },
        ..ClientConfig::default()
    }
}

async fn accept(listener: &TcpListener) -> ServerSocket {
    let (tcp, _) = timeout(Duration::from_secs(5), listener.accept()).await.unwrap().unwrap();
    tokio_tungstenite::accept_async(tcp).await.unwrap()
}

async fn next_frame(ws: &mut ServerSocket) -> Frame {
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Binary(bytes) = msg {
            return frames::decode_frame(&bytes).unwrap();
        }
    }
}

async fn send(ws: &mut ServerSocket, frame: &Frame) {
    ws.send(Message::Binary(frames::encode_frame(frame).into())).await.unwrap();
}

async fn object_count(handle: &BridgeHandle) -> usize {
    handle.inspect(|session| session.engine.doc.len()).await.unwrap()
}

#[tokio::test]
async fn joins_applies_snapshot_and_rejoins_after_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (handle, task) = spawn(fast_config(port), "b-1", Some("u-1".into()));

    let mut ws = accept(&listener).await;
    let join = next_frame(&mut ws).await;
    assert_eq!(join.syscall, "board:join");
    assert_eq!(join.data["boardId"], "b-1");
    handle.wait_for_status(ConnectionStatus::Connected).await.unwrap();

    let object = BoardObject::new(ObjectKind::Sticky, "b-1", 10.0, 10.0, None);
    let snapshot = InboundEvent::Snapshot(BoardSnapshot { objects: vec![object] }).to_frame("b-1").unwrap();
    send(&mut ws, &snapshot).await;

    let mut count = 0;
    for _ in 0..50 {
        count = object_count(&handle).await;
        if count == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(count, 1);

    drop(ws);
    let mut ws = accept(&listener).await;
    let rejoin = next_frame(&mut ws).await;
    assert_eq!(rejoin.syscall, "board:join");
    // Objects survive the drop until the next snapshot.
    assert_eq!(object_count(&handle).await, 1);

    handle.leave().unwrap();
    let leave = next_frame(&mut ws).await;
    assert_eq!(leave.syscall, "board:leave");
    assert!(timeout(Duration::from_secs(2), task).await.unwrap().unwrap().is_ok());
    assert_eq!(handle.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn local_commands_reach_the_relay() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (handle, _task) = spawn(fast_config(port), "b-1", Some("u-1".into()));

    let mut ws = accept(&listener).await;
    next_frame(&mut ws).await;
    handle.wait_for_status(ConnectionStatus::Connected).await.unwrap();

    handle.send(Command::Create { kind: ObjectKind::Rect, x: 5.0, y: 6.0 }).unwrap();
    let create = next_frame(&mut ws).await;
    assert_eq!(create.syscall, "object:create");
    assert_eq!(create.board_id.as_deref(), Some("b-1"));
    assert_eq!(create.data["object"]["x"], 5.0);
}

#[tokio::test]
async fn batch_report_comes_back() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (handle, _task) = spawn(fast_config(port), "b-1", None);
    let mut ws = accept(&listener).await;
    next_frame(&mut ws).await;

    let batch: Batch = serde_json::from_value(serde_json::json!({"actions": [
        {"action": "create", "object_type": "circle", "temp_id": "c1"},
    ]}))
    .unwrap();
    let report = handle.apply_batch(batch).await.unwrap();
    assert_eq!(report.skipped, 0);
    assert!(report.resolved.contains_key("c1"));
}

#[tokio::test]
async fn gives_up_after_attempt_budget() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = fast_config(port);
    config.reconnect = ReconnectPolicy { max_attempts: 2, initial_backoff_ms: 1, max_backoff_ms: 2 };
    let (handle, task) = spawn(config, "b-1", None);

    let result = timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    assert!(matches!(result, Err(ClientError::ReconnectExhausted { attempts: 2 })));
    assert!(matches!(handle.send(Command::Undo), Err(ClientError::Closed)));
}

/// Accepts TCP connections and never answers the websocket handshake.
async fn silent_listener() -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
        }
    });
    (port, server)
}

#[tokio::test]
async fn local_edits_apply_while_handshake_hangs() {
    let (port, server) = silent_listener().await;
    let (handle, task) = spawn(fast_config(port), "b-1", None);
    handle.wait_for_status(ConnectionStatus::Connecting).await.unwrap();

    handle.send(Command::Create { kind: ObjectKind::Sticky, x: 0.0, y: 0.0 }).unwrap();
    let count = timeout(Duration::from_secs(1), object_count(&handle)).await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(handle.status(), ConnectionStatus::Connecting);

    handle.leave().unwrap();
    assert!(timeout(Duration::from_secs(1), task).await.unwrap().unwrap().is_ok());
    assert_eq!(handle.status(), ConnectionStatus::Disconnected);
    server.abort();
}

#[tokio::test]
async fn hung_handshake_counts_against_attempt_budget() {
    let (port, server) = silent_listener().await;
    let mut config = fast_config(port);
    config.connect_timeout_ms = 50;
    config.reconnect = ReconnectPolicy { max_attempts: 1, initial_backoff_ms: 10, max_backoff_ms: 10 };
    let (_handle, task) = spawn(config, "b-1", None);

    let result = timeout(Duration::from_secs(3), task).await.unwrap().unwrap();
    assert!(matches!(result, Err(ClientError::ReconnectExhausted { attempts: 1 })));
    server.abort();
}
