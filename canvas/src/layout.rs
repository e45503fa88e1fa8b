//! Derived board geometry: connector routes, content bounds, and snapshot renormalization.
//!
//! Connectors store no geometry. Their endpoints are looked up by id each
//! time they are needed, so moving an endpoint object re-routes every
//! connector attached to it without any message for the connector itself.
//! A connector with a dangling endpoint simply has no route.

#[cfg(test)]
#[path = "layout_test.rs"]
mod layout_test;

use crate::camera::{Point, Rect};
use crate::consts::RENORMALIZE_MARGIN;
use crate::doc::{BoardObject, DocStore, ObjectId};

/// Line a render surface should draw for one connector.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorRoute {
    pub id: ObjectId,
    pub from: Point,
    pub to: Point,
}

/// Endpoints of `connector`: the centers of its `from_id` and `to_id` objects.
///
/// `None` if `connector` is not a connector or either endpoint is missing.
#[must_use]
pub fn connector_endpoints(connector: &BoardObject, doc: &DocStore) -> Option<(Point, Point)> {
    if !connector.kind.is_connector() {
        return None;
    }
    let props = connector.props();
    let from = doc.get(props.from_id()?)?;
    let to = doc.get(props.to_id()?)?;
    Some((from.center(), to.center()))
}

/// Routes for every resolvable connector, in paint order.
#[must_use]
pub fn connector_routes(doc: &DocStore) -> Vec<ConnectorRoute> {
    doc.sorted_objects()
        .into_iter()
        .filter_map(|c| {
            let (from, to) = connector_endpoints(c, doc)?;
            Some(ConnectorRoute { id: c.id.clone(), from, to })
        })
        .collect()
}

/// Bounding box of every non-connector, or `None` for a board with none.
#[must_use]
pub fn content_bounds<'a>(objects: impl IntoIterator<Item = &'a BoardObject>) -> Option<Rect> {
    Rect::enclosing(
        objects
            .into_iter()
            .filter(|o| !o.kind.is_connector())
            .map(BoardObject::bounds),
    )
}

/// Shift a snapshot out of negative coordinates.
///
/// If any non-connector has a negative `x` or `y`, every non-connector is
/// moved by `(|min_x| + margin, |min_y| + margin)`, both axes at once.
/// Returns the applied shift, or `None` when nothing moved.
pub fn renormalize(objects: &mut [BoardObject]) -> Option<(f64, f64)> {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    for o in objects.iter().filter(|o| !o.kind.is_connector()) {
        min_x = min_x.min(o.x);
        min_y = min_y.min(o.y);
    }
    if min_x >= 0.0 && min_y >= 0.0 {
        return None;
    }
    let dx = min_x.abs() + RENORMALIZE_MARGIN;
    let dy = min_y.abs() + RENORMALIZE_MARGIN;
    for o in objects.iter_mut().filter(|o| !o.kind.is_connector()) {
        o.x += dx;
        o.y += dy;
    }
    Some((dx, dy))
}
