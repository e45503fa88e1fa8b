//! Interaction engine: turns pointer, wheel, and key input into board mutations.
//!
//! SYSTEM CONTEXT
//! ==============
//! `EngineCore` owns one board session's Object Store, camera, and UI state.
//! Every handler runs to completion, mutates the store optimistically, and
//! returns the [`Action`]s the host must forward: object actions go to the
//! transport, `CursorMoved` goes through the cursor throttle, and the rest
//! drive the render surface.
//!
//! Remote events enter through `load_snapshot` / `apply_*` and never produce
//! object actions, so nothing received is echoed back.
//!
//! DESIGN
//! ======
//! Gestures that change geometry push one undo snapshot on their first move,
//! so a plain click leaves the history alone. Escape during such a gesture
//! patches the touched objects back to their starting geometry and discards
//! that snapshot; remote edits that landed mid-gesture stay.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use uuid::Uuid;

use crate::camera::{Camera, Point, Rect};
use crate::consts::{PASTE_OFFSET, WHEEL_ZOOM_STEP};
use crate::doc::{BoardObject, DocStore, ObjectId, ObjectKind, ObjectPatch};
use crate::hit::{self, Hit};
use crate::input::{Button, ConnectState, InputState, Key, Modifiers, Tool, UiState, WheelDelta};
use crate::layout::{self, ConnectorRoute};
use crate::select::{self, DragSelect};
use crate::transform::GroupTransform;

/// Actions returned from handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// A new object exists locally; broadcast `object:create`.
    ObjectCreated(BoardObject),
    /// An object changed locally; broadcast `object:update`.
    ObjectUpdated { id: ObjectId, patch: ObjectPatch },
    /// An object was removed locally; broadcast `object:delete`.
    ObjectDeleted { id: ObjectId },
    /// Local pointer moved, in board-space.
    CursorMoved(Point),
    /// Content bounds a view fit centered on. Offset layouts scroll to it.
    FitRequested(Rect),
    RenderNeeded,
}

/// Core engine state. Holds no I/O handles so it can be driven from tests.
pub struct EngineCore {
    pub board_id: String,
    /// Stamped as `created_by` on locally created objects.
    pub user_id: Option<String>,
    pub doc: DocStore,
    pub camera: Camera,
    pub ui: UiState,
    pub input: InputState,
    pub viewport_width: f64,
    pub viewport_height: f64,
    /// Emit the snapshot diff after an undo so peers converge.
    pub broadcast_undo: bool,
    clipboard: Vec<BoardObject>,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self {
            board_id: String::new(),
            user_id: None,
            doc: DocStore::new(),
            camera: Camera::default(),
            ui: UiState::default(),
            input: InputState::default(),
            viewport_width: 0.0,
            viewport_height: 0.0,
            broadcast_undo: false,
            clipboard: Vec::new(),
        }
    }
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine for `board_id`, acting as `user_id`.
    #[must_use]
    pub fn for_board(board_id: impl Into<String>, user_id: Option<String>) -> Self {
        Self { board_id: board_id.into(), user_id, ..Self::default() }
    }

    // --- Remote inputs ---

    /// Replace the document with a full snapshot and request a view fit.
    pub fn load_snapshot(&mut self, objects: Vec<BoardObject>) -> Vec<Action> {
        self.doc.replace_all(objects);
        self.ui.selection.retain_existing(&self.doc);
        self.reset_connect_if_missing();
        self.input = InputState::Idle;
        self.request_fit()
    }

    /// Apply a remote `object:create`.
    pub fn apply_create(&mut self, object: BoardObject) {
        self.doc.upsert(object);
    }

    /// Apply a remote `object:update`. Missing ids are ignored.
    pub fn apply_update(&mut self, id: &str, patch: &ObjectPatch) {
        self.doc.patch(id, patch);
    }

    /// Apply a remote `object:delete`. Missing ids are ignored.
    pub fn apply_delete(&mut self, id: &str) {
        self.doc.remove(id);
        self.ui.selection.remove(id);
        self.reset_connect_if_missing();
    }

    /// Drop everything held for the session.
    pub fn clear(&mut self) {
        self.doc.clear();
        self.ui = UiState { tool: self.ui.tool, active_color: self.ui.active_color.take(), ..UiState::default() };
        self.input = InputState::Idle;
        self.clipboard.clear();
    }

    // --- Tool / viewport ---

    /// Set the active tool. Any half-built connector is abandoned.
    pub fn set_tool(&mut self, tool: Tool) {
        self.ui.tool = tool;
        self.ui.connect = ConnectState::Idle;
    }

    pub fn set_active_color(&mut self, color: Option<String>) {
        self.ui.active_color = color;
    }

    /// Update viewport dimensions, applying any pending view fit.
    pub fn set_viewport(&mut self, width: f64, height: f64) -> Vec<Action> {
        self.viewport_width = width;
        self.viewport_height = height;
        if self.ui.fit_requested { self.fit_view() } else { Vec::new() }
    }

    /// Ask for a view fit. Applied now if the viewport is known, else on the next `set_viewport`.
    pub fn request_fit(&mut self) -> Vec<Action> {
        self.ui.fit_requested = true;
        self.fit_view()
    }

    fn fit_view(&mut self) -> Vec<Action> {
        if self.viewport_width <= 0.0 || self.viewport_height <= 0.0 {
            return vec![Action::RenderNeeded];
        }
        self.ui.fit_requested = false;
        let Some(bounds) = layout::content_bounds(self.doc.iter()) else {
            return vec![Action::RenderNeeded];
        };
        self.camera = self.camera.fit(bounds, self.viewport_width, self.viewport_height);
        vec![Action::FitRequested(bounds), Action::RenderNeeded]
    }

    // --- Programmatic edits ---

    /// Create an object of `kind` at board point `(x, y)` with variant defaults.
    pub fn create_object(&mut self, kind: ObjectKind, x: f64, y: f64) -> Vec<Action> {
        let obj = BoardObject::new(kind, self.board_id.clone(), x, y, self.ui.active_color.as_deref());
        self.doc.push_undo();
        self.insert_local(obj)
    }

    /// Create a connector between two existing objects.
    pub fn create_connector(&mut self, from_id: &str, to_id: &str) -> Vec<Action> {
        let obj = BoardObject::connector(self.board_id.clone(), from_id, to_id, self.ui.active_color.as_deref());
        self.doc.push_undo();
        self.insert_local(obj)
    }

    /// Patch an object. Returns no actions if it does not exist.
    pub fn update_object(&mut self, id: &str, patch: ObjectPatch) -> Vec<Action> {
        if !self.doc.contains(id) {
            return Vec::new();
        }
        self.doc.push_undo();
        self.doc.patch(id, &patch);
        vec![Action::ObjectUpdated { id: id.to_owned(), patch }, Action::RenderNeeded]
    }

    /// Delete objects and the connectors attached to them.
    pub fn delete_objects(&mut self, ids: &[ObjectId]) -> Vec<Action> {
        if !ids.iter().any(|id| self.doc.contains(id)) {
            return Vec::new();
        }
        self.doc.push_undo();
        let mut actions = self.remove_cascade(ids);
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Remove `ids` and their attached connectors. Caller pushes undo.
    pub(crate) fn remove_cascade(&mut self, ids: &[ObjectId]) -> Vec<Action> {
        let mut removed = HashSet::new();
        let mut actions = Vec::new();
        for id in ids.iter().cloned() {
            let attached = self.doc.connectors_touching(&id);
            for victim in std::iter::once(id).chain(attached) {
                if removed.contains(&victim) {
                    continue;
                }
                if self.doc.remove(&victim).is_some() {
                    self.ui.selection.remove(&victim);
                    actions.push(Action::ObjectDeleted { id: victim.clone() });
                    removed.insert(victim);
                }
            }
        }
        self.reset_connect_if_missing();
        actions
    }

    /// Restore the most recent undo snapshot.
    ///
    /// Local-only unless `broadcast_undo` is set, in which case the diff
    /// between the current and restored states is returned as object actions.
    pub fn undo(&mut self) -> Vec<Action> {
        let before = self.broadcast_undo.then(|| self.doc.snapshot());
        if !self.doc.undo() {
            return Vec::new();
        }
        self.input = InputState::Idle;
        self.ui.selection.retain_existing(&self.doc);
        self.reset_connect_if_missing();
        let mut actions = match before {
            Some(before) => diff_snapshots(&before, &self.doc.snapshot()),
            None => Vec::new(),
        };
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Copy the selection, plus connectors with both ends selected, to the clipboard.
    pub fn copy_selection(&mut self) {
        self.clipboard = self.selected_with_connectors();
    }

    /// Paste the clipboard offset by [`PASTE_OFFSET`]. Repeated pastes cascade.
    pub fn paste(&mut self) -> Vec<Action> {
        if self.clipboard.is_empty() {
            return Vec::new();
        }
        let sources = std::mem::take(&mut self.clipboard);
        let (copies, actions) = self.clone_objects(&sources);
        self.clipboard = copies;
        actions
    }

    /// Duplicate the selection in place, offset by [`PASTE_OFFSET`].
    pub fn duplicate_selection(&mut self) -> Vec<Action> {
        let sources = self.selected_with_connectors();
        if sources.is_empty() {
            return Vec::new();
        }
        self.clone_objects(&sources).1
    }

    fn selected_with_connectors(&self) -> Vec<BoardObject> {
        let selected: HashSet<&str> = self.ui.selection.iter().map(String::as_str).collect();
        self.doc
            .iter()
            .filter(|o| {
                if o.kind.is_connector() {
                    let props = o.props();
                    props.from_id().is_some_and(|id| selected.contains(id))
                        && props.to_id().is_some_and(|id| selected.contains(id))
                } else {
                    selected.contains(o.id.as_str())
                }
            })
            .cloned()
            .collect()
    }

    /// Insert fresh copies of `sources`, remapping connector endpoints to the copies.
    fn clone_objects(&mut self, sources: &[BoardObject]) -> (Vec<BoardObject>, Vec<Action>) {
        let id_map: HashMap<&str, String> = sources
            .iter()
            .filter(|o| !o.kind.is_connector())
            .map(|o| (o.id.as_str(), Uuid::new_v4().to_string()))
            .collect();

        let mut copies = Vec::new();
        for src in sources {
            let mut copy = src.clone();
            if src.kind.is_connector() {
                let props = src.props();
                let (Some(from), Some(to)) = (
                    props.from_id().and_then(|id| id_map.get(id)),
                    props.to_id().and_then(|id| id_map.get(id)),
                ) else {
                    continue;
                };
                copy.id = Uuid::new_v4().to_string();
                copy.props.insert("from_id".into(), Value::String(from.clone()));
                copy.props.insert("to_id".into(), Value::String(to.clone()));
            } else {
                let Some(new_id) = id_map.get(src.id.as_str()) else {
                    continue;
                };
                copy.id.clone_from(new_id);
                copy.x += PASTE_OFFSET;
                copy.y += PASTE_OFFSET;
            }
            copy.board_id.clone_from(&self.board_id);
            copy.created_by.clone_from(&self.user_id);
            copy.updated_at = None;
            copies.push(copy);
        }
        if copies.is_empty() {
            return (copies, Vec::new());
        }

        self.doc.push_undo();
        let mut z = self.doc.max_z_index();
        let mut actions = Vec::with_capacity(copies.len() + 1);
        for copy in &mut copies {
            z += 1;
            copy.z_index = z;
            self.doc.upsert(copy.clone());
            actions.push(Action::ObjectCreated(copy.clone()));
        }
        self.ui.selection.set(copies.iter().filter(|o| !o.kind.is_connector()).map(|o| o.id.clone()));
        actions.push(Action::RenderNeeded);
        (copies, actions)
    }

    /// Stamp, insert, and select a locally created object. Caller pushes undo.
    fn insert_local(&mut self, mut obj: BoardObject) -> Vec<Action> {
        obj.z_index = self.doc.max_z_index() + 1;
        obj.created_by.clone_from(&self.user_id);
        if !obj.kind.is_connector() {
            self.ui.selection.select_only(obj.id.clone());
        }
        self.doc.upsert(obj.clone());
        vec![Action::ObjectCreated(obj), Action::RenderNeeded]
    }

    fn reset_connect_if_missing(&mut self) {
        if let ConnectState::PendingSource(ref id) = self.ui.connect {
            if !self.doc.contains(id) {
                self.ui.connect = ConnectState::Idle;
            }
        }
    }

    // --- Pointer input ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        if button == Button::Middle || (button == Button::Primary && modifiers.command()) {
            self.input = InputState::Panning { last_screen: screen_pt };
            return Vec::new();
        }
        if button != Button::Primary {
            return Vec::new();
        }
        let world = self.camera.screen_to_world(screen_pt);

        if let Some(kind) = self.ui.tool.creates() {
            let actions = self.create_object(kind, world.x, world.y);
            self.set_tool(Tool::Select);
            return actions;
        }
        match self.ui.tool {
            Tool::Connect => self.connect_click(world),
            _ => self.select_down(screen_pt, world, modifiers),
        }
    }

    fn connect_click(&mut self, world: Point) -> Vec<Action> {
        let Some(target) = hit::object_at(world, &self.doc) else {
            self.ui.connect = ConnectState::Idle;
            return vec![Action::RenderNeeded];
        };
        match std::mem::take(&mut self.ui.connect) {
            ConnectState::Idle => {
                self.ui.connect = ConnectState::PendingSource(target);
                vec![Action::RenderNeeded]
            }
            ConnectState::PendingSource(source) if source == target => {
                self.ui.connect = ConnectState::PendingSource(source);
                Vec::new()
            }
            ConnectState::PendingSource(source) => {
                let actions = self.create_connector(&source, &target);
                self.ui.tool = Tool::Select;
                actions
            }
        }
    }

    fn select_down(&mut self, screen_pt: Point, world: Point, modifiers: Modifiers) -> Vec<Action> {
        let sel_box = self.selection_box();
        match hit::hit_test(world, &self.doc, &self.camera, sel_box) {
            Some(Hit::ResizeHandle(anchor)) => {
                let (originals, origin) = self.transform_targets(sel_box);
                self.input = InputState::Resizing {
                    anchor,
                    originals,
                    transform: GroupTransform::identity(origin),
                    moved: false,
                };
                Vec::new()
            }
            Some(Hit::RotateHandle) => {
                let (originals, origin) = self.transform_targets(sel_box);
                self.input = InputState::Rotating {
                    start_world: world,
                    originals,
                    transform: GroupTransform::identity(origin),
                    moved: false,
                };
                Vec::new()
            }
            Some(Hit::Body(id)) => {
                if modifiers.shift {
                    self.ui.selection.toggle(id);
                    return vec![Action::RenderNeeded];
                }
                if !self.ui.selection.contains(&id) {
                    self.ui.selection.select_only(id);
                }
                let originals = self
                    .ui
                    .selection
                    .iter()
                    .filter_map(|id| self.doc.get(id))
                    .filter(|o| !o.kind.is_connector())
                    .map(|o| (o.id.clone(), Point::new(o.x, o.y)))
                    .collect();
                self.input = InputState::DraggingObjects { start_world: world, originals, moved: false };
                vec![Action::RenderNeeded]
            }
            None => {
                if modifiers.none() {
                    self.input = InputState::DragSelecting(DragSelect::new(screen_pt, world));
                }
                Vec::new()
            }
        }
    }

    fn transform_targets(&self, sel_box: Option<Rect>) -> (Vec<BoardObject>, Rect) {
        let originals: Vec<BoardObject> = self
            .ui
            .selection
            .iter()
            .filter_map(|id| self.doc.get(id))
            .filter(|o| !o.kind.is_connector())
            .cloned()
            .collect();
        let origin = sel_box.unwrap_or_else(|| Rect::new(0.0, 0.0, 0.0, 0.0));
        (originals, origin)
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point, _modifiers: Modifiers) -> Vec<Action> {
        let world = self.camera.screen_to_world(screen_pt);
        let mut actions = vec![Action::CursorMoved(world)];
        match &mut self.input {
            InputState::Idle => {}
            InputState::Panning { last_screen } => {
                let (dx, dy) = (screen_pt.x - last_screen.x, screen_pt.y - last_screen.y);
                *last_screen = screen_pt;
                self.camera.pan_by(dx, dy);
                actions.push(Action::RenderNeeded);
            }
            InputState::DraggingObjects { start_world, originals, moved } => {
                if !std::mem::replace(moved, true) {
                    self.doc.push_undo();
                }
                let (dx, dy) = (world.x - start_world.x, world.y - start_world.y);
                for (id, orig) in originals.iter() {
                    self.doc.patch(id, &ObjectPatch::position(orig.x + dx, orig.y + dy));
                }
                actions.push(Action::RenderNeeded);
            }
            InputState::DragSelecting(drag) => {
                drag.update(screen_pt, world);
                actions.push(Action::RenderNeeded);
            }
            InputState::Resizing { anchor, originals, transform, moved } => {
                if !std::mem::replace(moved, true) {
                    self.doc.push_undo();
                }
                *transform = GroupTransform::resize(transform.origin, *anchor, world);
                for obj in originals.iter() {
                    self.doc.patch(&obj.id, &transform.patch_for(obj));
                }
                actions.push(Action::RenderNeeded);
            }
            InputState::Rotating { start_world, originals, transform, moved } => {
                if !std::mem::replace(moved, true) {
                    self.doc.push_undo();
                }
                *transform = GroupTransform::rotate(transform.origin, *start_world, world);
                for obj in originals.iter() {
                    self.doc.patch(&obj.id, &transform.patch_for(obj));
                }
                actions.push(Action::RenderNeeded);
            }
        }
        actions
    }

    pub fn on_pointer_up(&mut self, _screen_pt: Point, _button: Button, _modifiers: Modifiers) -> Vec<Action> {
        match std::mem::take(&mut self.input) {
            InputState::Idle | InputState::Panning { .. } => Vec::new(),
            InputState::DraggingObjects { originals, .. } => {
                let mut actions: Vec<Action> = originals
                    .iter()
                    .filter_map(|(id, _)| self.doc.get(id))
                    .map(|o| Action::ObjectUpdated { id: o.id.clone(), patch: ObjectPatch::position(o.x, o.y) })
                    .collect();
                actions.push(Action::RenderNeeded);
                actions
            }
            InputState::DragSelecting(drag) => {
                match drag.visible_rect() {
                    Some(rect) => self.ui.selection.set(select::rubber_band(&self.doc, rect)),
                    None => self.ui.selection.clear(),
                }
                vec![Action::RenderNeeded]
            }
            InputState::Resizing { originals, transform, .. } | InputState::Rotating { originals, transform, .. } => {
                let mut actions = Vec::with_capacity(originals.len() + 1);
                for obj in &originals {
                    let patch = transform.patch_for(obj);
                    if self.doc.patch(&obj.id, &patch) {
                        actions.push(Action::ObjectUpdated { id: obj.id.clone(), patch });
                    }
                }
                actions.push(Action::RenderNeeded);
                actions
            }
        }
    }

    /// Ctrl/Cmd + wheel zooms around the pointer; plain wheel pans.
    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta, modifiers: Modifiers) -> Vec<Action> {
        if modifiers.command() {
            let zoom = self.camera.zoom * (-delta.dy * WHEEL_ZOOM_STEP).exp();
            self.camera.zoom_at(screen_pt, zoom);
        } else {
            self.camera.pan_by(-delta.dx, -delta.dy);
        }
        vec![Action::RenderNeeded]
    }

    // --- Keyboard input ---

    pub fn on_key_down(&mut self, key: Key, modifiers: Modifiers) -> Vec<Action> {
        if modifiers.command() {
            return if key.is("z") {
                self.undo()
            } else if key.is("d") {
                self.duplicate_selection()
            } else if key.is("c") {
                self.copy_selection();
                Vec::new()
            } else if key.is("v") {
                self.paste()
            } else {
                Vec::new()
            };
        }
        match key.0.as_str() {
            "Delete" | "Backspace" => {
                let ids = self.ui.selection.ids();
                self.delete_objects(&ids)
            }
            "Escape" => self.cancel(),
            _ => Vec::new(),
        }
    }

    /// Abort the gesture in progress, the pending connector, and the selection.
    fn cancel(&mut self) -> Vec<Action> {
        match std::mem::take(&mut self.input) {
            InputState::DraggingObjects { originals, moved, .. } => {
                for (id, orig) in &originals {
                    self.doc.patch(id, &ObjectPatch::position(orig.x, orig.y));
                }
                if moved {
                    self.doc.discard_undo();
                }
            }
            InputState::Resizing { originals, moved, .. } | InputState::Rotating { originals, moved, .. } => {
                for obj in &originals {
                    let patch = ObjectPatch::transform(obj.x, obj.y, obj.width, obj.height, obj.rotation);
                    self.doc.patch(&obj.id, &patch);
                }
                if moved {
                    self.doc.discard_undo();
                }
            }
            InputState::Idle | InputState::Panning { .. } | InputState::DragSelecting(_) => {}
        }
        self.ui.connect = ConnectState::Idle;
        self.ui.selection.clear();
        vec![Action::RenderNeeded]
    }

    // --- Queries ---

    /// The object under a screen point, if any.
    #[must_use]
    pub fn object_at_screen(&self, screen_pt: Point) -> Option<ObjectId> {
        hit::object_at(self.camera.screen_to_world(screen_pt), &self.doc)
    }

    /// Box the transform handles are drawn on.
    #[must_use]
    pub fn selection_box(&self) -> Option<Rect> {
        select::selection_bounds(&self.doc, &self.ui.selection)
    }

    /// Rubber-band rectangle to draw, if one is showing.
    #[must_use]
    pub fn drag_rect(&self) -> Option<Rect> {
        match &self.input {
            InputState::DragSelecting(drag) => drag.visible_rect(),
            _ => None,
        }
    }

    /// Connector lines to draw this frame.
    #[must_use]
    pub fn connector_routes(&self) -> Vec<ConnectorRoute> {
        layout::connector_routes(&self.doc)
    }

    #[must_use]
    pub fn object(&self, id: &str) -> Option<&BoardObject> {
        self.doc.get(id)
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.camera
    }
}

/// Object actions that turn `before` into `after`.
///
/// Changed objects get a full patch, with explicit nulls for variant fields
/// that `after` no longer has.
#[must_use]
pub fn diff_snapshots(before: &[BoardObject], after: &[BoardObject]) -> Vec<Action> {
    let old: HashMap<&str, &BoardObject> = before.iter().map(|o| (o.id.as_str(), o)).collect();
    let new: HashSet<&str> = after.iter().map(|o| o.id.as_str()).collect();

    let mut actions: Vec<Action> = before
        .iter()
        .filter(|o| !new.contains(o.id.as_str()))
        .map(|o| Action::ObjectDeleted { id: o.id.clone() })
        .collect();

    for obj in after {
        match old.get(obj.id.as_str()) {
            None => actions.push(Action::ObjectCreated(obj.clone())),
            Some(prev) if *prev != obj => {
                let mut patch = ObjectPatch::full(obj);
                for key in prev.props.keys().filter(|k| !obj.props.contains_key(*k)) {
                    patch.props.insert(key.clone(), Value::Null);
                }
                actions.push(Action::ObjectUpdated { id: obj.id.clone(), patch });
            }
            Some(_) => {}
        }
    }
    actions
}
