//! Hit resolution: which object, or which selection handle, is under a point.
//!
//! Two resolvers live here. [`resolve_target`] walks a host-supplied chain
//! of element ids from the event target outward and returns the first one
//! the store knows. [`hit_test`] is the geometric equivalent for surfaces
//! that only report coordinates: it checks the selection's transform handles
//! first, then the topmost object body in paint order. Connectors have no
//! body of their own and are never hit.

#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::camera::{Camera, Point, Rect};
use crate::consts::{HANDLE_RADIUS_PX, ROTATE_HANDLE_OFFSET_PX};
use crate::doc::{BoardObject, DocStore, ObjectId};

/// Anchor position for resize handles on the selection box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeAnchor {
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
}

impl ResizeAnchor {
    pub const ALL: [Self; 8] = [Self::N, Self::Ne, Self::E, Self::Se, Self::S, Self::Sw, Self::W, Self::Nw];

    /// Handle location on `rect`.
    #[must_use]
    pub fn position(self, rect: Rect) -> Point {
        let c = rect.center();
        match self {
            Self::N => Point::new(c.x, rect.y),
            Self::Ne => Point::new(rect.right(), rect.y),
            Self::E => Point::new(rect.right(), c.y),
            Self::Se => Point::new(rect.right(), rect.bottom()),
            Self::S => Point::new(c.x, rect.bottom()),
            Self::Sw => Point::new(rect.x, rect.bottom()),
            Self::W => Point::new(rect.x, c.y),
            Self::Nw => Point::new(rect.x, rect.y),
        }
    }

    /// The handle that stays fixed while this one is dragged.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::N => Self::S,
            Self::Ne => Self::Sw,
            Self::E => Self::W,
            Self::Se => Self::Nw,
            Self::S => Self::N,
            Self::Sw => Self::Ne,
            Self::W => Self::E,
            Self::Nw => Self::Se,
        }
    }

    /// Whether dragging this handle changes the horizontal extent.
    #[must_use]
    pub fn moves_x(self) -> bool {
        !matches!(self, Self::N | Self::S)
    }

    /// Whether dragging this handle changes the vertical extent.
    #[must_use]
    pub fn moves_y(self) -> bool {
        !matches!(self, Self::E | Self::W)
    }
}

/// Result of a hit test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hit {
    /// Body of an object.
    Body(ObjectId),
    /// Resize handle on the selection box.
    ResizeHandle(ResizeAnchor),
    /// Rotate handle above the selection box.
    RotateHandle,
}

/// Walk an event target's ancestor chain and return the first id present in the store.
///
/// `None` means the event landed on empty canvas.
pub fn resolve_target<'a>(chain: impl IntoIterator<Item = &'a str>, doc: &DocStore) -> Option<ObjectId> {
    chain.into_iter().find(|id| doc.contains(id)).map(str::to_owned)
}

/// Whether `p` lies inside the object's rotated bounding box.
#[must_use]
pub fn object_contains(obj: &BoardObject, p: Point) -> bool {
    let local = if obj.rotation == 0.0 { p } else { p.rotate_around(obj.center(), -obj.rotation) };
    obj.bounds().contains(local)
}

/// Topmost non-connector whose rotated box contains `world_pt`.
#[must_use]
pub fn object_at(world_pt: Point, doc: &DocStore) -> Option<ObjectId> {
    doc.sorted_objects()
        .into_iter()
        .rev()
        .filter(|o| !o.kind.is_connector())
        .find(|o| object_contains(o, world_pt))
        .map(|o| o.id.clone())
}

/// Rotate handle position for a selection box under `camera`.
#[must_use]
pub fn rotate_handle_position(selection_box: Rect, camera: &Camera) -> Point {
    let c = selection_box.center();
    Point::new(c.x, selection_box.y - camera.screen_dist_to_world(ROTATE_HANDLE_OFFSET_PX))
}

/// Transform handle of `selection_box` under `world_pt`, if any.
#[must_use]
pub fn handle_at(world_pt: Point, selection_box: Rect, camera: &Camera) -> Option<Hit> {
    let radius = camera.screen_dist_to_world(HANDLE_RADIUS_PX);
    let near = |p: Point| (p.x - world_pt.x).hypot(p.y - world_pt.y) <= radius;

    if near(rotate_handle_position(selection_box, camera)) {
        return Some(Hit::RotateHandle);
    }
    ResizeAnchor::ALL
        .into_iter()
        .find(|a| near(a.position(selection_box)))
        .map(Hit::ResizeHandle)
}

/// Test what is under `world_pt`, checking the selection handles before object bodies.
#[must_use]
pub fn hit_test(world_pt: Point, doc: &DocStore, camera: &Camera, selection_box: Option<Rect>) -> Option<Hit> {
    if let Some(hit) = selection_box.and_then(|b| handle_at(world_pt, b, camera)) {
        return Some(hit);
    }
    object_at(world_pt, doc).map(Hit::Body)
}
