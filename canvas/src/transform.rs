//! Group transform: resize and rotate every selected object as one box.
//!
//! A [`GroupTransform`] maps the selection box at gesture start (`origin`)
//! onto a new box (`target`) plus a rotation delta around the target's
//! center. It is recomputed from the gesture start on every pointer move, so
//! the preview never accumulates error. On release, [`GroupTransform::patch_for`]
//! produces the final per-object patch with scale folded into width/height.

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;

use crate::camera::{Point, Rect};
use crate::consts::MIN_OBJECT_SIZE;
use crate::doc::{BoardObject, ObjectPatch};
use crate::hit::ResizeAnchor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupTransform {
    pub origin: Rect,
    pub target: Rect,
    /// Clockwise degrees added to every member.
    pub rotation: f64,
}

impl GroupTransform {
    /// No-op transform on `origin`.
    #[must_use]
    pub fn identity(origin: Rect) -> Self {
        Self { origin, target: origin, rotation: 0.0 }
    }

    /// Resize `origin` by dragging `anchor` to `pointer`; the opposite handle stays put.
    #[must_use]
    pub fn resize(origin: Rect, anchor: ResizeAnchor, pointer: Point) -> Self {
        let fixed = anchor.opposite().position(origin);
        let far = Point::new(
            if anchor.moves_x() { pointer.x } else { origin.right() },
            if anchor.moves_y() { pointer.y } else { origin.bottom() },
        );
        let fixed = Point::new(
            if anchor.moves_x() { fixed.x } else { origin.x },
            if anchor.moves_y() { fixed.y } else { origin.y },
        );
        Self { origin, target: Rect::from_corners(fixed, far), rotation: 0.0 }
    }

    /// Rotate `origin` around its center by the angle swept from `start` to `pointer`.
    #[must_use]
    pub fn rotate(origin: Rect, start: Point, pointer: Point) -> Self {
        let c = origin.center();
        let angle = |p: Point| (p.y - c.y).atan2(p.x - c.x).to_degrees();
        Self { origin, target: origin, rotation: angle(pointer) - angle(start) }
    }

    /// Horizontal scale factor. `1.0` for a zero-width origin.
    #[must_use]
    pub fn scale_x(&self) -> f64 {
        if self.origin.width > 0.0 { self.target.width / self.origin.width } else { 1.0 }
    }

    /// Vertical scale factor. `1.0` for a zero-height origin.
    #[must_use]
    pub fn scale_y(&self) -> f64 {
        if self.origin.height > 0.0 { self.target.height / self.origin.height } else { 1.0 }
    }

    /// Final geometry for one member, with scale absorbed into its size.
    ///
    /// Width and height are clamped to [`MIN_OBJECT_SIZE`].
    #[must_use]
    pub fn patch_for(&self, obj: &BoardObject) -> ObjectPatch {
        let (sx, sy) = (self.scale_x(), self.scale_y());
        let w = obj.width * sx;
        let h = obj.height * sy;
        let mut x = self.target.x + (obj.x - self.origin.x) * sx;
        let mut y = self.target.y + (obj.y - self.origin.y) * sy;
        if self.rotation != 0.0 {
            let c = Point::new(x + w / 2.0, y + h / 2.0).rotate_around(self.target.center(), self.rotation);
            x = c.x - w / 2.0;
            y = c.y - h / 2.0;
        }
        ObjectPatch::transform(
            x,
            y,
            w.max(MIN_OBJECT_SIZE),
            h.max(MIN_OBJECT_SIZE),
            (obj.rotation + self.rotation).rem_euclid(360.0),
        )
    }
}
