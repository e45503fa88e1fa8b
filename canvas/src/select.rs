//! Selection set and rubber-band selection.

#[cfg(test)]
#[path = "select_test.rs"]
mod select_test;

use indexmap::IndexSet;

use crate::camera::{Point, Rect};
use crate::consts::DRAG_SELECT_THRESHOLD_PX;
use crate::doc::{DocStore, ObjectId};

/// Ordered set of selected object ids. Client-local.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: IndexSet<ObjectId>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectId> {
        self.ids.iter()
    }

    /// Selected ids in selection order.
    #[must_use]
    pub fn ids(&self) -> Vec<ObjectId> {
        self.ids.iter().cloned().collect()
    }

    /// The single selected id. `None` when zero or several are selected.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        if self.ids.len() == 1 { self.ids.first().map(String::as_str) } else { None }
    }

    /// Replace the selection with exactly `id`.
    pub fn select_only(&mut self, id: impl Into<ObjectId>) {
        self.ids.clear();
        self.ids.insert(id.into());
    }

    /// Replace the selection with `ids`.
    pub fn set(&mut self, ids: impl IntoIterator<Item = ObjectId>) {
        self.ids = ids.into_iter().collect();
    }

    /// Flip membership of `id`. Returns `true` if it is now selected.
    pub fn toggle(&mut self, id: impl Into<ObjectId>) -> bool {
        let id = id.into();
        if self.ids.shift_remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    /// Drop `id` if selected. Returns `true` if it was.
    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.shift_remove(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids the store no longer holds.
    pub fn retain_existing(&mut self, doc: &DocStore) {
        self.ids.retain(|id| doc.contains(id));
    }
}

/// Rubber-band rectangle in progress, tracked in both screen and board space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSelect {
    pub start_screen: Point,
    pub start_world: Point,
    pub current_screen: Point,
    pub current_world: Point,
}

impl DragSelect {
    #[must_use]
    pub fn new(screen: Point, world: Point) -> Self {
        Self { start_screen: screen, start_world: world, current_screen: screen, current_world: world }
    }

    pub fn update(&mut self, screen: Point, world: Point) {
        self.current_screen = screen;
        self.current_world = world;
    }

    /// Whether the drag has grown past the threshold in either screen axis.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        (self.current_screen.x - self.start_screen.x).abs() > DRAG_SELECT_THRESHOLD_PX
            || (self.current_screen.y - self.start_screen.y).abs() > DRAG_SELECT_THRESHOLD_PX
    }

    /// Board-space rectangle to display, once visible.
    #[must_use]
    pub fn visible_rect(&self) -> Option<Rect> {
        self.is_visible().then(|| Rect::from_corners(self.start_world, self.current_world))
    }
}

/// Non-connector objects whose bounding box overlaps `rect`, in paint order.
///
/// Uses the strict AABB test, so an object that only touches an edge of
/// `rect` is not selected.
#[must_use]
pub fn rubber_band(doc: &DocStore, rect: Rect) -> Vec<ObjectId> {
    doc.sorted_objects()
        .into_iter()
        .filter(|o| !o.kind.is_connector())
        .filter(|o| rect.intersects(&o.bounds()))
        .map(|o| o.id.clone())
        .collect()
}

/// Bounding box of the selected non-connectors, ignoring rotation.
#[must_use]
pub fn selection_bounds(doc: &DocStore, selection: &Selection) -> Option<Rect> {
    Rect::enclosing(
        selection
            .iter()
            .filter_map(|id| doc.get(id))
            .filter(|o| !o.kind.is_connector())
            .map(crate::doc::BoardObject::bounds),
    )
}
