#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use serde_json::{Map, json};

use super::*;
use crate::consts::{MAX_ZOOM, MIN_OBJECT_SIZE};
use crate::hit::ResizeAnchor;

// =============================================================
// Helpers
// =============================================================

fn make_object_at(id: &str, kind: ObjectKind, x: f64, y: f64, w: f64, h: f64) -> BoardObject {
    BoardObject {
        id: id.to_owned(),
        board_id: "b-1".to_owned(),
        kind,
        x,
        y,
        width: w,
        height: h,
        rotation: 0.0,
        z_index: 0,
        created_by: None,
        updated_at: None,
        props: Map::new(),
    }
}

fn connector(id: &str, from: &str, to: &str) -> BoardObject {
    let mut c = BoardObject::connector("b-1", from, to, None);
    c.id = id.to_owned();
    c
}

/// Engine with an identity camera and two 100×100 stickies at (0,0) and (200,0).
fn core_with_two() -> EngineCore {
    let mut core = EngineCore::for_board("b-1", Some("u-1".into()));
    core.load_snapshot(vec![
        make_object_at("a", ObjectKind::Sticky, 0.0, 0.0, 100.0, 100.0),
        make_object_at("b", ObjectKind::Sticky, 200.0, 0.0, 100.0, 100.0),
    ]);
    core
}

fn no_modifiers() -> Modifiers {
    Modifiers::default()
}

fn shift() -> Modifiers {
    Modifiers { shift: true, ..Default::default() }
}

fn ctrl() -> Modifiers {
    Modifiers { ctrl: true, ..Default::default() }
}

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn click(core: &mut EngineCore, at: Point, modifiers: Modifiers) -> Vec<Action> {
    let mut actions = core.on_pointer_down(at, Button::Primary, modifiers);
    actions.extend(core.on_pointer_up(at, Button::Primary, modifiers));
    actions
}

fn drag(core: &mut EngineCore, from: Point, to: Point) -> Vec<Action> {
    let mut actions = core.on_pointer_down(from, Button::Primary, no_modifiers());
    actions.extend(core.on_pointer_move(to, no_modifiers()));
    actions.extend(core.on_pointer_up(to, Button::Primary, no_modifiers()));
    actions
}

fn key(core: &mut EngineCore, name: &str, modifiers: Modifiers) -> Vec<Action> {
    core.on_key_down(Key(name.into()), modifiers)
}

fn created(actions: &[Action]) -> Vec<&BoardObject> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::ObjectCreated(obj) => Some(obj),
            _ => None,
        })
        .collect()
}

fn updated_ids(actions: &[Action]) -> Vec<&str> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::ObjectUpdated { id, .. } => Some(id.as_str()),
            _ => None,
        })
        .collect()
}

fn deleted_ids(actions: &[Action]) -> Vec<&str> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::ObjectDeleted { id } => Some(id.as_str()),
            _ => None,
        })
        .collect()
}

fn has_object_actions(actions: &[Action]) -> bool {
    actions.iter().any(|a| {
        matches!(a, Action::ObjectCreated(_) | Action::ObjectUpdated { .. } | Action::ObjectDeleted { .. })
    })
}

// =============================================================
// Defaults
// =============================================================

#[test]
fn core_new_is_empty_and_idle() {
    let core = EngineCore::new();
    assert!(core.doc.is_empty());
    assert!(core.ui.selection.is_empty());
    assert_eq!(core.ui.tool, Tool::Select);
    assert_eq!(core.camera(), Camera::default());
    assert!(matches!(core.input, InputState::Idle));
    assert!(!core.broadcast_undo);
}

// =============================================================
// Remote inputs
// =============================================================

#[test]
fn load_snapshot_replaces_and_prunes_selection() {
    let mut core = core_with_two();
    core.ui.selection.set(["a".to_owned(), "b".to_owned()]);
    core.load_snapshot(vec![make_object_at("b", ObjectKind::Rect, 0.0, 0.0, 10.0, 10.0)]);
    assert_eq!(core.doc.len(), 1);
    assert_eq!(core.ui.selection.ids(), vec!["b".to_owned()]);
}

#[test]
fn load_snapshot_without_viewport_defers_fit() {
    let mut core = EngineCore::new();
    let actions = core.load_snapshot(vec![make_object_at("a", ObjectKind::Rect, 1000.0, 1000.0, 100.0, 100.0)]);
    assert!(core.ui.fit_requested);
    assert!(!actions.iter().any(|a| matches!(a, Action::FitRequested(_))));
    assert_eq!(core.camera(), Camera::default());

    let actions = core.set_viewport(800.0, 600.0);
    assert!(!core.ui.fit_requested);
    assert!(actions.contains(&Action::FitRequested(Rect::new(1000.0, 1000.0, 100.0, 100.0))));
    let center = core.camera.world_to_screen(pt(1050.0, 1050.0));
    assert!((center.x - 400.0).abs() < 1e-9 && (center.y - 300.0).abs() < 1e-9);
}

#[test]
fn load_snapshot_with_viewport_fits_immediately() {
    let mut core = EngineCore::new();
    core.set_viewport(800.0, 600.0);
    let actions = core.load_snapshot(vec![make_object_at("a", ObjectKind::Rect, 0.0, 0.0, 50.0, 50.0)]);
    assert!(actions.iter().any(|a| matches!(a, Action::FitRequested(_))));
    assert_eq!(core.camera.zoom, crate::consts::FIT_MAX_ZOOM);
}

#[test]
fn remote_mutations_emit_nothing_and_apply() {
    let mut core = core_with_two();
    core.apply_create(make_object_at("c", ObjectKind::Text, 0.0, 0.0, 10.0, 10.0));
    core.apply_update("a", &ObjectPatch::position(7.0, 8.0));
    core.apply_update("ghost", &ObjectPatch::position(7.0, 8.0));
    assert_eq!(core.doc.len(), 3);
    assert_eq!(core.object("a").map(|o| (o.x, o.y)), Some((7.0, 8.0)));
    assert_eq!(core.doc.undo_depth(), 0);
}

#[test]
fn remote_delete_drops_selection_and_pending_connect() {
    let mut core = core_with_two();
    core.ui.selection.select_only("a");
    core.ui.connect = ConnectState::PendingSource("a".into());
    core.apply_delete("a");
    assert!(core.ui.selection.is_empty());
    assert_eq!(core.ui.connect, ConnectState::Idle);
}

#[test]
fn clear_keeps_tool_and_color() {
    let mut core = core_with_two();
    core.set_tool(Tool::Rect);
    core.set_active_color(Some("#123456".into()));
    core.ui.selection.select_only("a");
    core.clear();
    assert!(core.doc.is_empty());
    assert!(core.ui.selection.is_empty());
    assert_eq!(core.ui.tool, Tool::Rect);
    assert_eq!(core.ui.active_color.as_deref(), Some("#123456"));
}

// =============================================================
// Creation tools
// =============================================================

#[test]
fn creation_tool_click_creates_at_board_point() {
    let mut core = core_with_two();
    core.camera = Camera { pan_x: 100.0, pan_y: 50.0, zoom: 2.0 };
    core.set_tool(Tool::Rect);
    let actions = core.on_pointer_down(pt(300.0, 250.0), Button::Primary, no_modifiers());
    let objs = created(&actions);
    assert_eq!(objs.len(), 1);
    let obj = objs[0];
    assert_eq!(obj.kind, ObjectKind::Rect);
    assert_eq!((obj.x, obj.y), (100.0, 100.0));
    assert_eq!((obj.width, obj.height), (160.0, 100.0));
    assert_eq!(obj.created_by.as_deref(), Some("u-1"));
    assert_eq!(obj.z_index, 1);
    assert!(core.doc.contains(&obj.id));
}

#[test]
fn creation_tool_returns_to_select_and_selects_new_object() {
    let mut core = core_with_two();
    core.set_tool(Tool::Sticky);
    let actions = click(&mut core, pt(500.0, 500.0), no_modifiers());
    let id = created(&actions)[0].id.clone();
    assert_eq!(core.ui.tool, Tool::Select);
    assert_eq!(core.ui.selection.primary(), Some(id.as_str()));
}

#[test]
fn creation_uses_active_color() {
    let mut core = EngineCore::new();
    core.set_active_color(Some("#ff0000".into()));
    core.set_tool(Tool::Circle);
    let actions = core.on_pointer_down(pt(0.0, 0.0), Button::Primary, no_modifiers());
    assert_eq!(created(&actions)[0].props().fill(), Some("#ff0000"));
}

#[test]
fn three_creates_then_three_undos_is_empty() {
    let mut core = EngineCore::new();
    for i in 0..3 {
        core.create_object(ObjectKind::Sticky, f64::from(i) * 300.0, 0.0);
    }
    assert_eq!(core.doc.len(), 3);
    for _ in 0..3 {
        core.undo();
    }
    assert!(core.doc.is_empty());
}

// =============================================================
// Connect tool
// =============================================================

#[test]
fn connect_two_objects_creates_connector() {
    let mut core = core_with_two();
    core.set_tool(Tool::Connect);
    click(&mut core, pt(50.0, 50.0), no_modifiers());
    assert_eq!(core.ui.connect, ConnectState::PendingSource("a".into()));
    let actions = click(&mut core, pt(250.0, 50.0), no_modifiers());
    let conn = created(&actions)[0];
    assert!(conn.kind.is_connector());
    assert_eq!(conn.props().from_id(), Some("a"));
    assert_eq!(conn.props().to_id(), Some("b"));
    assert_eq!(core.ui.connect, ConnectState::Idle);
    assert_eq!(core.ui.tool, Tool::Select);
}

#[test]
fn connect_same_object_twice_is_noop() {
    let mut core = core_with_two();
    core.set_tool(Tool::Connect);
    click(&mut core, pt(50.0, 50.0), no_modifiers());
    let actions = click(&mut core, pt(60.0, 60.0), no_modifiers());
    assert!(!has_object_actions(&actions));
    assert_eq!(core.ui.connect, ConnectState::PendingSource("a".into()));
    assert_eq!(core.ui.tool, Tool::Connect);
}

#[test]
fn connect_empty_canvas_resets() {
    let mut core = core_with_two();
    core.set_tool(Tool::Connect);
    click(&mut core, pt(50.0, 50.0), no_modifiers());
    let actions = click(&mut core, pt(150.0, 500.0), no_modifiers());
    assert!(!has_object_actions(&actions));
    assert_eq!(core.ui.connect, ConnectState::Idle);
}

#[test]
fn switching_tools_resets_connect() {
    let mut core = core_with_two();
    core.set_tool(Tool::Connect);
    click(&mut core, pt(50.0, 50.0), no_modifiers());
    core.set_tool(Tool::Connect);
    assert_eq!(core.ui.connect, ConnectState::Idle);
}

#[test]
fn escape_resets_connect() {
    let mut core = core_with_two();
    core.set_tool(Tool::Connect);
    click(&mut core, pt(50.0, 50.0), no_modifiers());
    key(&mut core, "Escape", no_modifiers());
    assert_eq!(core.ui.connect, ConnectState::Idle);
}

// =============================================================
// Selection
// =============================================================

#[test]
fn plain_click_replaces_selection() {
    let mut core = core_with_two();
    core.ui.selection.select_only("b");
    click(&mut core, pt(50.0, 50.0), no_modifiers());
    assert_eq!(core.ui.selection.ids(), vec!["a".to_owned()]);
}

#[test]
fn shift_click_toggles_membership() {
    let mut core = core_with_two();
    click(&mut core, pt(50.0, 50.0), no_modifiers());
    click(&mut core, pt(250.0, 50.0), shift());
    assert_eq!(core.ui.selection.ids(), vec!["a".to_owned(), "b".to_owned()]);
    click(&mut core, pt(50.0, 50.0), shift());
    assert_eq!(core.ui.selection.ids(), vec!["b".to_owned()]);
}

#[test]
fn shift_click_does_not_move_or_push_undo() {
    let mut core = core_with_two();
    let actions = click(&mut core, pt(50.0, 50.0), shift());
    assert!(!has_object_actions(&actions));
    assert_eq!(core.doc.undo_depth(), 0);
}

#[test]
fn empty_click_clears_selection() {
    let mut core = core_with_two();
    core.ui.selection.set(["a".to_owned(), "b".to_owned()]);
    click(&mut core, pt(150.0, 500.0), no_modifiers());
    assert!(core.ui.selection.is_empty());
}

#[test]
fn empty_click_with_modifier_keeps_selection() {
    let mut core = core_with_two();
    core.ui.selection.select_only("a");
    click(&mut core, pt(150.0, 500.0), shift());
    assert_eq!(core.ui.selection.len(), 1);
}

#[test]
fn rubber_band_selects_intersecting_non_connectors() {
    let mut core = core_with_two();
    core.apply_create(connector("c", "a", "b"));
    drag(&mut core, pt(-10.0, -10.0), pt(210.0, 50.0));
    assert_eq!(core.ui.selection.ids(), vec!["a".to_owned(), "b".to_owned()]);
}

#[test]
fn rubber_band_edge_touch_does_not_select() {
    let mut core = core_with_two();
    drag(&mut core, pt(100.0, 150.0), pt(200.0, -50.0));
    assert!(core.ui.selection.is_empty());
}

#[test]
fn drag_rect_visible_only_past_threshold() {
    let mut core = core_with_two();
    core.on_pointer_down(pt(150.0, 300.0), Button::Primary, no_modifiers());
    core.on_pointer_move(pt(152.0, 303.0), no_modifiers());
    assert!(core.drag_rect().is_none());
    core.on_pointer_move(pt(180.0, 303.0), no_modifiers());
    assert_eq!(core.drag_rect(), Some(Rect::new(150.0, 300.0, 30.0, 3.0)));
}

// =============================================================
// Dragging objects
// =============================================================

#[test]
fn drag_moves_every_selected_object() {
    let mut core = core_with_two();
    core.ui.selection.set(["a".to_owned(), "b".to_owned()]);
    let actions = drag(&mut core, pt(50.0, 50.0), pt(80.0, 90.0));
    assert_eq!(core.object("a").map(|o| (o.x, o.y)), Some((30.0, 40.0)));
    assert_eq!(core.object("b").map(|o| (o.x, o.y)), Some((230.0, 40.0)));
    assert_eq!(updated_ids(&actions), vec!["a", "b"]);
}

#[test]
fn drag_emits_position_patches() {
    let mut core = core_with_two();
    let actions = drag(&mut core, pt(50.0, 50.0), pt(60.0, 55.0));
    let patch = actions.iter().find_map(|a| match a {
        Action::ObjectUpdated { patch, .. } => Some(patch.clone()),
        _ => None,
    });
    assert_eq!(patch, Some(ObjectPatch::position(10.0, 5.0)));
}

#[test]
fn zero_delta_release_still_emits() {
    let mut core = core_with_two();
    let actions = click(&mut core, pt(50.0, 50.0), no_modifiers());
    assert_eq!(updated_ids(&actions), vec!["a"]);
}

#[test]
fn drag_does_not_emit_until_release() {
    let mut core = core_with_two();
    core.on_pointer_down(pt(50.0, 50.0), Button::Primary, no_modifiers());
    let actions = core.on_pointer_move(pt(70.0, 70.0), no_modifiers());
    assert!(!has_object_actions(&actions));
}

#[test]
fn escape_mid_drag_reverts() {
    let mut core = core_with_two();
    core.on_pointer_down(pt(50.0, 50.0), Button::Primary, no_modifiers());
    core.on_pointer_move(pt(90.0, 90.0), no_modifiers());
    let actions = key(&mut core, "Escape", no_modifiers());
    assert!(!has_object_actions(&actions));
    assert_eq!(core.object("a").map(|o| (o.x, o.y)), Some((0.0, 0.0)));
    assert_eq!(core.doc.undo_depth(), 0);
    assert!(matches!(core.input, InputState::Idle));
}

#[test]
fn escape_mid_drag_keeps_remote_edits() {
    let mut core = core_with_two();
    core.on_pointer_down(pt(50.0, 50.0), Button::Primary, no_modifiers());
    core.on_pointer_move(pt(90.0, 90.0), no_modifiers());

    core.apply_create(make_object_at("peer", ObjectKind::Rect, 500.0, 500.0, 50.0, 50.0));
    core.apply_update("b", &ObjectPatch::default().with_prop("text", "peer text"));
    key(&mut core, "Escape", no_modifiers());

    assert!(core.object("peer").is_some());
    assert_eq!(core.object("b").unwrap().props().text(), "peer text");
    assert_eq!(core.object("a").map(|o| (o.x, o.y)), Some((0.0, 0.0)));
    assert_eq!(core.doc.undo_depth(), 0);
}

#[test]
fn escape_mid_resize_restores_geometry() {
    let mut core = core_with_two();
    core.ui.selection.set(["a".to_owned(), "b".to_owned()]);
    core.on_pointer_down(pt(300.0, 100.0), Button::Primary, no_modifiers());
    core.on_pointer_move(pt(600.0, 200.0), no_modifiers());
    assert_eq!(core.object("b").map(|o| o.width), Some(200.0));

    key(&mut core, "Escape", no_modifiers());
    let b = core.object("b").unwrap();
    assert_eq!((b.x, b.y, b.width, b.height), (200.0, 0.0, 100.0, 100.0));
    assert_eq!(core.doc.undo_depth(), 0);
}

#[test]
fn plain_clicks_leave_undo_history_alone() {
    let mut core = core_with_two();
    core.update_object("a", ObjectPatch::default().with_prop("text", "edited"));
    for _ in 0..30 {
        click(&mut core, pt(50.0, 50.0), no_modifiers());
    }
    assert_eq!(core.doc.undo_depth(), 1);
    key(&mut core, "z", ctrl());
    assert_eq!(core.object("a").unwrap().props().text(), "");
}

#[test]
fn drag_pushes_one_undo_snapshot() {
    let mut core = core_with_two();
    core.on_pointer_down(pt(50.0, 50.0), Button::Primary, no_modifiers());
    core.on_pointer_move(pt(60.0, 60.0), no_modifiers());
    core.on_pointer_move(pt(70.0, 70.0), no_modifiers());
    core.on_pointer_up(pt(70.0, 70.0), Button::Primary, no_modifiers());
    assert_eq!(core.doc.undo_depth(), 1);
    key(&mut core, "z", ctrl());
    assert_eq!(core.object("a").map(|o| (o.x, o.y)), Some((0.0, 0.0)));
}

#[test]
fn moving_endpoint_reroutes_connector_without_patch() {
    let mut core = core_with_two();
    core.apply_create(connector("c", "a", "b"));
    let actions = drag(&mut core, pt(50.0, 50.0), pt(50.0, 250.0));
    assert_eq!(updated_ids(&actions), vec!["a"]);
    let route = core.connector_routes().pop().unwrap();
    assert_eq!(route.from, pt(50.0, 250.0));
}

// =============================================================
// Group transform
// =============================================================

#[test]
fn resize_handle_scales_group_on_release() {
    let mut core = core_with_two();
    core.ui.selection.set(["a".to_owned(), "b".to_owned()]);
    // Group box is (0,0)-(300,100); drag the SE corner to (600, 200).
    let actions = drag(&mut core, pt(300.0, 100.0), pt(600.0, 200.0));
    assert_eq!(updated_ids(&actions), vec!["a", "b"]);
    let b = core.object("b").unwrap();
    assert_eq!((b.x, b.y, b.width, b.height), (400.0, 0.0, 200.0, 200.0));
    assert!(matches!(core.input, InputState::Idle));
}

#[test]
fn resize_clamps_to_minimum() {
    let mut core = core_with_two();
    core.ui.selection.select_only("a");
    drag(&mut core, pt(100.0, 100.0), pt(5.0, 5.0));
    let a = core.object("a").unwrap();
    assert_eq!((a.width, a.height), (MIN_OBJECT_SIZE, MIN_OBJECT_SIZE));
}

#[test]
fn resize_handle_is_found_before_body() {
    let mut core = core_with_two();
    core.ui.selection.select_only("a");
    core.on_pointer_down(pt(100.0, 100.0), Button::Primary, no_modifiers());
    assert!(matches!(core.input, InputState::Resizing { anchor: ResizeAnchor::Se, .. }));
}

#[test]
fn rotate_handle_rotates_selection() {
    let mut core = core_with_two();
    core.ui.selection.select_only("a");
    let handle = crate::hit::rotate_handle_position(Rect::new(0.0, 0.0, 100.0, 100.0), &core.camera);
    let actions = drag(&mut core, handle, pt(150.0, 50.0));
    assert_eq!(updated_ids(&actions), vec!["a"]);
    let a = core.object("a").unwrap();
    assert!((a.rotation - 90.0).abs() < 1e-9);
    assert!(a.x.abs() < 1e-9 && a.y.abs() < 1e-9);
}

// =============================================================
// Pan / zoom
// =============================================================

#[test]
fn middle_button_pans_regardless_of_tool() {
    let mut core = core_with_two();
    core.set_tool(Tool::Rect);
    core.on_pointer_down(pt(10.0, 10.0), Button::Middle, no_modifiers());
    core.on_pointer_move(pt(40.0, 30.0), no_modifiers());
    core.on_pointer_up(pt(40.0, 30.0), Button::Middle, no_modifiers());
    assert_eq!((core.camera.pan_x, core.camera.pan_y), (30.0, 20.0));
    assert_eq!(core.doc.len(), 2);
}

#[test]
fn ctrl_drag_pans_instead_of_selecting() {
    let mut core = core_with_two();
    core.on_pointer_down(pt(50.0, 50.0), Button::Primary, ctrl());
    core.on_pointer_move(pt(60.0, 50.0), ctrl());
    let actions = core.on_pointer_up(pt(60.0, 50.0), Button::Primary, ctrl());
    assert!(!has_object_actions(&actions));
    assert_eq!(core.camera.pan_x, 10.0);
    assert!(core.ui.selection.is_empty());
}

#[test]
fn secondary_button_is_noop() {
    let mut core = core_with_two();
    let actions = core.on_pointer_down(pt(50.0, 50.0), Button::Secondary, no_modifiers());
    assert!(actions.is_empty());
    assert!(matches!(core.input, InputState::Idle));
}

#[test]
fn plain_wheel_pans() {
    let mut core = EngineCore::new();
    core.on_wheel(pt(0.0, 0.0), WheelDelta { dx: 5.0, dy: 20.0 }, no_modifiers());
    assert_eq!((core.camera.pan_x, core.camera.pan_y), (-5.0, -20.0));
    assert_eq!(core.camera.zoom, 1.0);
}

#[test]
fn ctrl_wheel_zooms_around_pointer() {
    let mut core = EngineCore::new();
    let cursor = pt(300.0, 200.0);
    let before = core.camera.screen_to_world(cursor);
    core.on_wheel(cursor, WheelDelta { dx: 0.0, dy: -200.0 }, ctrl());
    assert!(core.camera.zoom > 1.0);
    let after = core.camera.screen_to_world(cursor);
    assert!((after.x - before.x).abs() < 1e-9 && (after.y - before.y).abs() < 1e-9);
}

#[test]
fn ctrl_wheel_zoom_is_clamped() {
    let mut core = EngineCore::new();
    for _ in 0..50 {
        core.on_wheel(pt(0.0, 0.0), WheelDelta { dx: 0.0, dy: -1000.0 }, ctrl());
    }
    assert_eq!(core.camera.zoom, MAX_ZOOM);
}

// =============================================================
// Cursor
// =============================================================

#[test]
fn pointer_move_reports_board_space_cursor() {
    let mut core = EngineCore::new();
    core.camera = Camera { pan_x: 100.0, pan_y: 0.0, zoom: 2.0 };
    let actions = core.on_pointer_move(pt(300.0, 50.0), no_modifiers());
    assert_eq!(actions.first(), Some(&Action::CursorMoved(pt(100.0, 25.0))));
}

// =============================================================
// Keys
// =============================================================

#[test]
fn delete_removes_selection_and_attached_connectors() {
    let mut core = core_with_two();
    core.apply_create(connector("c", "a", "b"));
    core.ui.selection.select_only("a");
    let actions = key(&mut core, "Delete", no_modifiers());
    assert_eq!(deleted_ids(&actions), vec!["a", "c"]);
    assert_eq!(core.doc.len(), 1);
    assert!(core.ui.selection.is_empty());
}

#[test]
fn backspace_deletes_multi_selection() {
    let mut core = core_with_two();
    core.ui.selection.set(["a".to_owned(), "b".to_owned()]);
    let actions = key(&mut core, "Backspace", no_modifiers());
    assert_eq!(deleted_ids(&actions), vec!["a", "b"]);
    assert!(core.doc.is_empty());
}

#[test]
fn delete_without_selection_is_noop() {
    let mut core = core_with_two();
    assert!(key(&mut core, "Delete", no_modifiers()).is_empty());
    assert_eq!(core.doc.undo_depth(), 0);
}

#[test]
fn escape_clears_selection() {
    let mut core = core_with_two();
    core.ui.selection.select_only("a");
    key(&mut core, "Escape", no_modifiers());
    assert!(core.ui.selection.is_empty());
}

#[test]
fn unknown_key_is_noop() {
    let mut core = core_with_two();
    assert!(key(&mut core, "F13", no_modifiers()).is_empty());
    assert!(key(&mut core, "q", ctrl()).is_empty());
}

// =============================================================
// Undo
// =============================================================

#[test]
fn ctrl_z_undo_is_local_only_by_default() {
    let mut core = core_with_two();
    core.update_object("a", ObjectPatch::default().with_prop("text", "edited"));
    let actions = key(&mut core, "z", ctrl());
    assert!(!has_object_actions(&actions));
    assert_eq!(core.object("a").unwrap().props().text(), "");
}

#[test]
fn broadcast_undo_emits_diff() {
    let mut core = core_with_two();
    core.broadcast_undo = true;
    core.update_object("a", ObjectPatch::default().with_prop("text", "edited"));
    core.create_object(ObjectKind::Rect, 500.0, 500.0);
    core.undo();
    let actions = core.undo();
    assert_eq!(updated_ids(&actions), vec!["a"]);
    let actions_after_second = core.undo();
    assert!(actions_after_second.is_empty());
}

#[test]
fn broadcast_undo_deletes_created_object() {
    let mut core = core_with_two();
    core.broadcast_undo = true;
    let created_id = created(&core.create_object(ObjectKind::Rect, 500.0, 500.0))[0].id.clone();
    let actions = core.undo();
    assert_eq!(deleted_ids(&actions), vec![created_id.as_str()]);
}

#[test]
fn undo_with_empty_stack_is_noop() {
    let mut core = core_with_two();
    assert!(core.undo().is_empty());
}

#[test]
fn update_missing_object_emits_nothing() {
    let mut core = core_with_two();
    assert!(core.update_object("ghost", ObjectPatch::position(1.0, 1.0)).is_empty());
    assert_eq!(core.doc.undo_depth(), 0);
}

// =============================================================
// Duplicate / copy / paste
// =============================================================

#[test]
fn duplicate_offsets_and_selects_copies() {
    let mut core = core_with_two();
    core.ui.selection.select_only("a");
    let actions = key(&mut core, "d", ctrl());
    let copies = created(&actions);
    assert_eq!(copies.len(), 1);
    let copy = copies[0];
    assert_ne!(copy.id, "a");
    assert_eq!((copy.x, copy.y), (20.0, 20.0));
    assert_eq!(core.ui.selection.primary(), Some(copy.id.as_str()));
    assert_eq!(core.doc.len(), 3);
}

#[test]
fn duplicate_remaps_connectors_between_selected() {
    let mut core = core_with_two();
    core.apply_create(connector("c", "a", "b"));
    core.ui.selection.set(["a".to_owned(), "b".to_owned()]);
    let actions = key(&mut core, "d", ctrl());
    let copies = created(&actions);
    assert_eq!(copies.len(), 3);
    let conn = copies.iter().find(|o| o.kind.is_connector()).unwrap();
    let new_ids: Vec<&str> = copies.iter().filter(|o| !o.kind.is_connector()).map(|o| o.id.as_str()).collect();
    assert!(new_ids.contains(&conn.props().from_id().unwrap()));
    assert!(new_ids.contains(&conn.props().to_id().unwrap()));
    assert_eq!((conn.x, conn.y), (0.0, 0.0));
}

#[test]
fn duplicate_drops_connector_with_unselected_end() {
    let mut core = core_with_two();
    core.apply_create(connector("c", "a", "b"));
    core.ui.selection.select_only("a");
    let actions = key(&mut core, "d", ctrl());
    assert!(created(&actions).iter().all(|o| !o.kind.is_connector()));
}

#[test]
fn copy_paste_cascades_offsets() {
    let mut core = core_with_two();
    core.ui.selection.select_only("b");
    key(&mut core, "c", ctrl());
    let first = created(&key(&mut core, "v", ctrl()))[0].clone();
    let second = created(&key(&mut core, "v", ctrl()))[0].clone();
    assert_eq!((first.x, first.y), (220.0, 20.0));
    assert_eq!((second.x, second.y), (240.0, 40.0));
    assert_ne!(first.id, second.id);
}

#[test]
fn paste_with_empty_clipboard_is_noop() {
    let mut core = core_with_two();
    assert!(key(&mut core, "v", ctrl()).is_empty());
}

#[test]
fn pasted_objects_stack_on_top() {
    let mut core = core_with_two();
    core.ui.selection.select_only("a");
    let actions = key(&mut core, "d", ctrl());
    assert_eq!(created(&actions)[0].z_index, 1);
}

// =============================================================
// Hit-testing through the camera
// =============================================================

#[test]
fn object_at_screen_maps_through_camera() {
    let mut core = EngineCore::new();
    core.apply_create(make_object_at("s", ObjectKind::Sticky, 100.0, 100.0, 160.0, 100.0));
    core.camera = Camera { pan_x: -40.0, pan_y: 60.0, zoom: 1.5 };
    let screen = core.camera.world_to_screen(pt(150.0, 150.0));
    assert_eq!(core.object_at_screen(screen).as_deref(), Some("s"));
}

#[test]
fn created_object_resolves_on_a_peer() {
    let mut local = EngineCore::for_board("b-1", Some("u-a".into()));
    let mut peer = EngineCore::for_board("b-1", Some("u-b".into()));
    let actions = local.apply_batch(&serde_json::from_value(json!({"actions": [
        {"action": "create", "object_type": "sticky", "props": {"x": 100, "y": 100, "width": 160, "height": 100}},
    ]})).unwrap()).actions;
    let obj = created(&actions)[0].clone();
    peer.apply_create(obj.clone());
    peer.camera = Camera { pan_x: 25.0, pan_y: -10.0, zoom: 0.8 };
    let screen = peer.camera.world_to_screen(pt(150.0, 150.0));
    assert_eq!(peer.object_at_screen(screen), Some(obj.id));
}

// =============================================================
// diff_snapshots
// =============================================================

#[test]
fn diff_detects_create_update_delete() {
    let a = make_object_at("a", ObjectKind::Rect, 0.0, 0.0, 10.0, 10.0);
    let b = make_object_at("b", ObjectKind::Rect, 0.0, 0.0, 10.0, 10.0);
    let mut a2 = a.clone();
    a2.x = 50.0;
    let c = make_object_at("c", ObjectKind::Rect, 0.0, 0.0, 10.0, 10.0);
    let actions = diff_snapshots(&[a, b], &[a2, c.clone()]);
    assert_eq!(deleted_ids(&actions), vec!["b"]);
    assert_eq!(updated_ids(&actions), vec!["a"]);
    assert_eq!(created(&actions), vec![&c]);
}

#[test]
fn diff_nulls_removed_props() {
    let mut before = make_object_at("a", ObjectKind::Sticky, 0.0, 0.0, 10.0, 10.0);
    before.props.insert("text".into(), json!("x"));
    let after = make_object_at("a", ObjectKind::Sticky, 0.0, 0.0, 10.0, 10.0);
    let actions = diff_snapshots(&[before.clone()], &[after.clone()]);
    let Some(Action::ObjectUpdated { patch, .. }) = actions.first() else {
        panic!("expected update");
    };
    let mut replayed = before;
    replayed.apply(patch);
    assert_eq!(replayed, after);
}

#[test]
fn diff_of_identical_is_empty() {
    let a = make_object_at("a", ObjectKind::Rect, 0.0, 0.0, 10.0, 10.0);
    assert!(diff_snapshots(&[a.clone()], &[a]).is_empty());
}
