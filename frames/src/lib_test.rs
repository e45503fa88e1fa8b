use serde_json::json;

use super::*;

#[derive(Debug, thiserror::Error)]
#[error("read-only role")]
struct ReadOnly;

impl ErrorCode for ReadOnly {
    fn error_code(&self) -> &'static str {
        "E_READ_ONLY"
    }
}

#[test]
fn request_is_fresh_and_unscoped() {
    let a = Frame::request("object:create", json!({}));
    let b = Frame::request("object:create", json!({}));
    assert_eq!(a.status, Status::Request);
    assert!(a.parent_id.is_none() && a.board_id.is_none() && a.from.is_none());
    assert!(a.ts > 0);
    assert_ne!(a.id, b.id);
}

#[test]
fn builders_scope_and_stamp() {
    let frame = Frame::request("cursor:moved", json!({})).with_board_id("b-1").with_from("u-1");
    assert_eq!(frame.board_id.as_deref(), Some("b-1"));
    assert_eq!(frame.from.as_deref(), Some("u-1"));
}

#[test]
fn join_reply_points_back_at_request() {
    let req = Frame::request("board:join", json!({ "boardId": "b-1" }))
        .with_board_id("b-1")
        .with_from("u-1");
    let done = req.done_with(json!({ "objects": [] }));

    assert_eq!(done.parent_id.as_deref(), Some(req.id.as_str()));
    assert_eq!(done.board_id.as_deref(), Some("b-1"));
    assert_eq!(done.syscall, "board:join");
    assert_eq!(done.status, Status::Done);
    assert!(done.from.is_none());
    assert_ne!(done.id, req.id);
}

#[test]
fn typed_error_carries_code_and_message() {
    let err = Frame::request("object:create", json!({})).error_from(&ReadOnly);
    assert_eq!(err.status, Status::Error);
    assert_eq!(err.data[FRAME_CODE], "E_READ_ONLY");
    assert_eq!(err.error_message(), Some("read-only role"));
}

#[test]
fn plain_error_has_message_only() {
    let err = Frame::request("board:join", json!({})).error("board id required");
    assert_eq!(err.error_message(), Some("board id required"));
    assert!(err.data.get(FRAME_CODE).is_none());
}

#[test]
fn error_message_absent_on_success_frames() {
    assert!(Frame::request("board:join", json!({ "message": 1 })).error_message().is_none());
}

#[test]
fn prefix_is_event_family() {
    assert_eq!(Frame::request("object:create", json!({})).prefix(), "object");
    assert_eq!(Frame::request("cursor:move", json!({})).prefix(), "cursor");
    assert_eq!(Frame::request("ping", json!({})).prefix(), "ping");
}

#[test]
fn status_uses_lowercase_json() {
    assert_eq!(serde_json::to_value(Status::Done).expect("serialize"), json!("done"));
    assert_eq!(serde_json::from_value::<Status>(json!("error")).expect("deserialize"), Status::Error);
    assert!(serde_json::from_value::<Status>(json!("Error")).is_err());
}

#[test]
fn clock_is_after_2020() {
    assert!(now_ms() > 1_577_836_800_000);
}
