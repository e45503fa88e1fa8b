//! Document model: board objects, their properties, and the in-memory store.
//!
//! This module defines the data that describes what is on the board
//! (`BoardObject`, `ObjectKind`), the flat shallow-merge update type used on
//! the wire (`ObjectPatch`), a typed accessor for the per-variant property bag
//! (`Props`), and the runtime replica that owns all live objects (`DocStore`).
//!
//! The store performs no I/O. Every mutation here is local and optimistic;
//! broadcasting the matching event is the caller's job. Conflicts between
//! peers resolve by arrival order: whichever patch reaches this replica last
//! wins for the fields it names.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::VecDeque;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::camera::{Point, Rect};
use crate::consts::UNDO_LIMIT;

/// Unique identifier for a board object. Opaque to the client.
pub type ObjectId = String;

/// Keys a patch may never change, plus the typed fields that must not leak
/// into the property bag.
const RESERVED_KEYS: &[&str] = &[
    "id",
    "board_id",
    "type",
    "created_by",
    "x",
    "y",
    "width",
    "height",
    "rotation",
    "z_index",
    "updated_at",
];

/// The kind of a board object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Colored note with text.
    Sticky,
    /// Rectangle with fill and stroke.
    Rect,
    /// Ellipse inscribed in the bounding box.
    Circle,
    /// Free-standing text.
    Text,
    /// Titled container drawn behind other objects.
    Frame,
    /// Line between two other objects, routed at render time.
    Connector,
}

/// Per-variant defaults. This is the single table every creation path reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantSpec {
    pub width: f64,
    pub height: f64,
    /// Property the active color is written to.
    pub color_key: &'static str,
    pub default_color: &'static str,
}

impl ObjectKind {
    pub const ALL: [Self; 6] = [Self::Sticky, Self::Rect, Self::Circle, Self::Text, Self::Frame, Self::Connector];

    /// Default size and color slot for this variant.
    #[must_use]
    pub fn spec(self) -> VariantSpec {
        match self {
            Self::Sticky => VariantSpec { width: 200.0, height: 200.0, color_key: "color", default_color: "#FEF08A" },
            Self::Rect => VariantSpec { width: 160.0, height: 100.0, color_key: "fill", default_color: "#93C5FD" },
            Self::Circle => VariantSpec { width: 120.0, height: 120.0, color_key: "fill", default_color: "#93C5FD" },
            Self::Text => VariantSpec { width: 200.0, height: 32.0, color_key: "color", default_color: "#e2e8f0" },
            Self::Frame => {
                VariantSpec { width: 400.0, height: 300.0, color_key: "fill", default_color: "rgba(255,255,255,0.05)" }
            }
            Self::Connector => VariantSpec { width: 0.0, height: 0.0, color_key: "color", default_color: "#6366f1" },
        }
    }

    /// Default property bag for a new object of this variant.
    ///
    /// `color` overrides the variant's default in its color slot.
    #[must_use]
    pub fn default_props(self, color: Option<&str>) -> Map<String, Value> {
        let spec = self.spec();
        let mut props = match self {
            Self::Sticky => json!({ "text": "", "font_size": 14 }),
            Self::Rect | Self::Circle => json!({ "stroke": "#1e40af", "stroke_width": 2 }),
            Self::Text => json!({ "text": "Text", "font_size": 16 }),
            Self::Frame => json!({ "title": "Frame" }),
            Self::Connector => json!({ "style": "solid" }),
        };
        if let Some(map) = props.as_object_mut() {
            map.insert(spec.color_key.to_owned(), Value::String(color.unwrap_or(spec.default_color).to_owned()));
        }
        match props {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Whether this variant is a connector (no stored geometry).
    #[must_use]
    pub fn is_connector(self) -> bool {
        matches!(self, Self::Connector)
    }
}

/// A board object as stored in the replica and on the wire.
///
/// Variant-specific fields (`text`, `fill`, `from_id`, ...) are flattened
/// into `props` so a patch can shallow-merge them without knowing the
/// variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardObject {
    /// Unique identifier for this object.
    pub id: ObjectId,
    /// The board this object belongs to.
    #[serde(default)]
    pub board_id: String,
    /// Variant tag.
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    /// Left edge of the bounding box in board-space.
    #[serde(default)]
    pub x: f64,
    /// Top edge of the bounding box in board-space.
    #[serde(default)]
    pub y: f64,
    /// Width of the bounding box in board-space.
    #[serde(default)]
    pub width: f64,
    /// Height of the bounding box in board-space.
    #[serde(default)]
    pub height: f64,
    /// Clockwise rotation in degrees around the bounding-box center.
    #[serde(default)]
    pub rotation: f64,
    /// Paint order; ties are broken by insertion order.
    #[serde(default, deserialize_with = "int_from_number")]
    pub z_index: i64,
    /// User who created the object, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// ISO timestamp of the last edit. Advisory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Variant-specific fields.
    #[serde(flatten)]
    pub props: Map<String, Value>,
}

impl BoardObject {
    /// Build a new object of `kind` at board point `(x, y)` using the variant table.
    #[must_use]
    pub fn new(kind: ObjectKind, board_id: impl Into<String>, x: f64, y: f64, color: Option<&str>) -> Self {
        let spec = kind.spec();
        let (x, y) = if kind.is_connector() { (0.0, 0.0) } else { (x, y) };
        Self {
            id: Uuid::new_v4().to_string(),
            board_id: board_id.into(),
            kind,
            x,
            y,
            width: spec.width,
            height: spec.height,
            rotation: 0.0,
            z_index: 0,
            created_by: None,
            updated_at: None,
            props: kind.default_props(color),
        }
    }

    /// Build a connector from `from_id` to `to_id` with degenerate geometry.
    #[must_use]
    pub fn connector(board_id: impl Into<String>, from_id: &str, to_id: &str, color: Option<&str>) -> Self {
        let mut obj = Self::new(ObjectKind::Connector, board_id, 0.0, 0.0, color);
        obj.props.insert("from_id".into(), Value::String(from_id.to_owned()));
        obj.props.insert("to_id".into(), Value::String(to_id.to_owned()));
        obj
    }

    /// Typed view of the property bag.
    #[must_use]
    pub fn props(&self) -> Props<'_> {
        Props::new(&self.props)
    }

    /// Axis-aligned bounding box, ignoring rotation.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Center of the bounding box.
    #[must_use]
    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    /// Apply a patch in place. Idempotent.
    pub fn apply(&mut self, patch: &ObjectPatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(w) = patch.width {
            self.width = w;
        }
        if let Some(h) = patch.height {
            self.height = h;
        }
        if let Some(r) = patch.rotation {
            self.rotation = r;
        }
        if let Some(z) = patch.z_index {
            self.z_index = z;
        }
        if let Some(ref ts) = patch.updated_at {
            self.updated_at = Some(ts.clone());
        }
        for (k, v) in &patch.props {
            if RESERVED_KEYS.contains(&k.as_str()) {
                continue;
            }
            if v.is_null() {
                self.props.remove(k);
            } else {
                self.props.insert(k.clone(), v.clone());
            }
        }
    }
}

/// Sparse update for a board object. Only present fields are applied.
///
/// Serializes flat: geometry fields and variant fields side by side, the way
/// `object:update` carries them. A `null` variant field removes that key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int_from_number")]
    pub z_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Variant fields to merge or remove.
    #[serde(flatten)]
    pub props: Map<String, Value>,
}

impl ObjectPatch {
    /// Patch that moves an object.
    #[must_use]
    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Default::default() }
    }

    /// Patch that sets the full transform of an object.
    #[must_use]
    pub fn transform(x: f64, y: f64, width: f64, height: f64, rotation: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            width: Some(width),
            height: Some(height),
            rotation: Some(rotation),
            ..Default::default()
        }
    }

    /// Patch carrying every mutable field of `obj`, used to converge peers on a restored state.
    #[must_use]
    pub fn full(obj: &BoardObject) -> Self {
        Self {
            x: Some(obj.x),
            y: Some(obj.y),
            width: Some(obj.width),
            height: Some(obj.height),
            rotation: Some(obj.rotation),
            z_index: Some(obj.z_index),
            updated_at: obj.updated_at.clone(),
            props: obj.props.clone(),
        }
    }

    /// Add one variant field.
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if the patch names no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.rotation.is_none()
            && self.z_index.is_none()
            && self.updated_at.is_none()
            && self.props.is_empty()
    }
}

/// Typed access to common variant fields.
pub struct Props<'a> {
    value: &'a Map<String, Value>,
}

impl<'a> Props<'a> {
    #[must_use]
    pub fn new(value: &'a Map<String, Value>) -> Self {
        Self { value }
    }

    fn str_field(&self, key: &str) -> Option<&'a str> {
        self.value.get(key).and_then(Value::as_str)
    }

    /// Label or body text. Empty string when absent.
    #[must_use]
    pub fn text(&self) -> &'a str {
        self.str_field("text").unwrap_or("")
    }

    /// Text/note color (sticky, text, connector).
    #[must_use]
    pub fn color(&self) -> Option<&'a str> {
        self.str_field("color")
    }

    /// Fill color (rect, circle, frame).
    #[must_use]
    pub fn fill(&self) -> Option<&'a str> {
        self.str_field("fill")
    }

    /// Stroke color. Defaults to `"#1e40af"`.
    #[must_use]
    pub fn stroke(&self) -> &'a str {
        self.str_field("stroke").unwrap_or("#1e40af")
    }

    /// Stroke width in board units. Defaults to `2.0`.
    #[must_use]
    pub fn stroke_width(&self) -> f64 {
        self.value
            .get("stroke_width")
            .and_then(Value::as_f64)
            .unwrap_or(2.0)
    }

    /// Font size in board units. Defaults to `14.0`.
    #[must_use]
    pub fn font_size(&self) -> f64 {
        self.value
            .get("font_size")
            .and_then(Value::as_f64)
            .unwrap_or(14.0)
    }

    /// Frame title. Empty string when absent.
    #[must_use]
    pub fn title(&self) -> &'a str {
        self.str_field("title").unwrap_or("")
    }

    /// Connector source object id.
    #[must_use]
    pub fn from_id(&self) -> Option<&'a str> {
        self.str_field("from_id")
    }

    /// Connector target object id.
    #[must_use]
    pub fn to_id(&self) -> Option<&'a str> {
        self.str_field("to_id")
    }

    /// Connector line style. Defaults to `"solid"`.
    #[must_use]
    pub fn style(&self) -> &'a str {
        self.str_field("style").unwrap_or("solid")
    }
}

/// In-memory replica of one board's objects, plus the local undo window.
///
/// Iteration order is insertion order, which also breaks `z_index` ties.
pub struct DocStore {
    objects: IndexMap<ObjectId, BoardObject>,
    undo: VecDeque<Vec<BoardObject>>,
}

impl DocStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { objects: IndexMap::new(), undo: VecDeque::new() }
    }

    /// Replace all objects with a full snapshot. Wipes the undo stack.
    pub fn replace_all(&mut self, objects: Vec<BoardObject>) {
        self.undo.clear();
        self.load(objects);
    }

    fn load(&mut self, objects: Vec<BoardObject>) {
        self.objects.clear();
        for obj in objects {
            self.objects.insert(obj.id.clone(), obj);
        }
    }

    /// Insert or replace an object by id. A replaced object keeps its insertion slot.
    pub fn upsert(&mut self, obj: BoardObject) {
        self.objects.insert(obj.id.clone(), obj);
    }

    /// Shallow-merge a patch into an existing object.
    ///
    /// Returns `false` and leaves the store untouched if the object is absent.
    pub fn patch(&mut self, id: &str, patch: &ObjectPatch) -> bool {
        let Some(obj) = self.objects.get_mut(id) else {
            return false;
        };
        obj.apply(patch);
        true
    }

    /// Remove an object by id, returning it if it was present.
    pub fn remove(&mut self, id: &str) -> Option<BoardObject> {
        self.objects.shift_remove(id)
    }

    /// Return a reference to an object by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BoardObject> {
        self.objects.get(id)
    }

    /// Returns `true` if an object with `id` is present.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    /// Copy of every object, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<BoardObject> {
        self.objects.values().cloned().collect()
    }

    /// Iterate objects in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &BoardObject> {
        self.objects.values()
    }

    /// Return all objects in paint order: `z_index`, then insertion order.
    #[must_use]
    pub fn sorted_objects(&self) -> Vec<&BoardObject> {
        let mut objs: Vec<&BoardObject> = self.objects.values().collect();
        objs.sort_by_key(|o| o.z_index);
        objs
    }

    /// Highest `z_index` in the store, or `0` when empty.
    #[must_use]
    pub fn max_z_index(&self) -> i64 {
        self.objects.values().map(|o| o.z_index).max().unwrap_or(0)
    }

    /// Connectors that reference `id` from either end.
    #[must_use]
    pub fn connectors_touching(&self, id: &str) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.kind.is_connector())
            .filter(|o| {
                let props = o.props();
                props.from_id() == Some(id) || props.to_id() == Some(id)
            })
            .map(|o| o.id.clone())
            .collect()
    }

    /// Push the current state onto the undo stack, dropping the oldest entry past the limit.
    pub fn push_undo(&mut self) {
        self.undo.push_back(self.snapshot());
        while self.undo.len() > UNDO_LIMIT {
            self.undo.pop_front();
        }
    }

    /// Restore the most recent undo snapshot. Returns `false` if there is none.
    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.undo.pop_back() else {
            return false;
        };
        self.load(snapshot);
        true
    }

    /// Drop the most recent undo snapshot without restoring it.
    pub fn discard_undo(&mut self) {
        self.undo.pop_back();
    }

    /// Number of snapshots on the undo stack.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    /// Drop all objects and undo history.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.undo.clear();
    }

    /// Number of objects currently in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the store contains no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Default for DocStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_possible_truncation)]
    fn into_i64(self) -> i64 {
        match self {
            Self::Int(v) => v,
            Self::Float(v) => v.round() as i64,
        }
    }
}

/// Accept integral JSON numbers encoded as floats, as the protobuf transport produces.
fn int_from_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Number::deserialize(deserializer).map(Number::into_i64)
}

fn opt_int_from_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Option::<Number>::deserialize(deserializer).map(|n| n.map(Number::into_i64))
}
