//! Board-space geometry and the two screen mappings.
//!
//! [`Camera`] is the pan/zoom affine transform used by the infinite canvas.
//! [`CanvasOffset`] is the alternative layout: a fixed large canvas scrolled
//! inside a container, where screen and board differ only by a translation.

#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use crate::consts::{FIT_MAX_ZOOM, FIT_PADDING_PX, MAX_ZOOM, MIN_ZOOM};

/// A point in either screen or world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rotate this point around `pivot` by `degrees` clockwise (screen y-down).
    #[must_use]
    pub fn rotate_around(self, pivot: Point, degrees: f64) -> Point {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let dx = self.x - pivot.x;
        let dy = self.y - pivot.y;
        Point { x: pivot.x + dx * cos - dy * sin, y: pivot.y + dx * sin + dy * cos }
    }
}

/// Axis-aligned rectangle: min corner plus extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Normalized rectangle spanned by two extreme points, in any order.
    #[must_use]
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self { x: a.x.min(b.x), y: a.y.min(b.y), width: (a.x - b.x).abs(), height: (a.y - b.y).abs() }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point { x: self.x + self.width / 2.0, y: self.y + self.height / 2.0 }
    }

    /// Strict overlap test. Rectangles that only share an edge do not intersect.
    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        other.x < self.right() && other.right() > self.x && other.y < self.bottom() && other.bottom() > self.y
    }

    /// Inclusive point containment.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Smallest rectangle covering both.
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect { x, y, width: self.right().max(other.right()) - x, height: self.bottom().max(other.bottom()) - y }
    }

    /// Bounding box of a set of rectangles, or `None` when empty.
    pub fn enclosing(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
        rects.into_iter().reduce(|acc, r| acc.union(&r))
    }
}

/// Camera state for pan/zoom on the infinite canvas.
///
/// `pan_x` / `pan_y` are in CSS pixels.
/// `zoom` is a scale factor (1.0 = no zoom).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0 }
    }
}

impl Camera {
    /// Convert a screen-space point (CSS pixels) to world coordinates.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point { x: (screen.x - self.pan_x) / self.zoom, y: (screen.y - self.pan_y) / self.zoom }
    }

    /// Convert a world-space point to screen coordinates (CSS pixels).
    #[must_use]
    pub fn world_to_screen(&self, world: Point) -> Point {
        Point { x: world.x * self.zoom + self.pan_x, y: world.y * self.zoom + self.pan_y }
    }

    /// Convert a screen-space distance (pixels) to world-space distance.
    #[must_use]
    pub fn screen_dist_to_world(&self, screen_dist: f64) -> f64 {
        screen_dist / self.zoom
    }

    /// Shift the view by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    /// Set zoom (clamped) while keeping the world point under `screen` fixed.
    pub fn zoom_at(&mut self, screen: Point, zoom: f64) {
        let world = self.screen_to_world(screen);
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan_x = screen.x - world.x * self.zoom;
        self.pan_y = screen.y - world.y * self.zoom;
    }

    /// Camera that centers `bounds` in a `viewport_w` × `viewport_h` viewport.
    ///
    /// Keeps [`FIT_PADDING_PX`] on every side and never zooms past
    /// [`FIT_MAX_ZOOM`]. A degenerate viewport leaves the camera unchanged.
    #[must_use]
    pub fn fit(&self, bounds: Rect, viewport_w: f64, viewport_h: f64) -> Camera {
        let avail_w = viewport_w - 2.0 * FIT_PADDING_PX;
        let avail_h = viewport_h - 2.0 * FIT_PADDING_PX;
        if avail_w <= 0.0 || avail_h <= 0.0 {
            return *self;
        }
        let scale_w = if bounds.width > 0.0 { avail_w / bounds.width } else { FIT_MAX_ZOOM };
        let scale_h = if bounds.height > 0.0 { avail_h / bounds.height } else { FIT_MAX_ZOOM };
        let zoom = scale_w.min(scale_h).min(FIT_MAX_ZOOM).max(MIN_ZOOM);
        let center = bounds.center();
        Camera { pan_x: viewport_w / 2.0 - center.x * zoom, pan_y: viewport_h / 2.0 - center.y * zoom, zoom }
    }
}

/// Translation-only mapping for a fixed large canvas inside a scroll container.
///
/// `origin_*` is where board `(0, 0)` sits inside the canvas element;
/// `scroll_*` is the container's current scroll position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CanvasOffset {
    pub origin_x: f64,
    pub origin_y: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl CanvasOffset {
    /// Container-relative point to board coordinates.
    #[must_use]
    pub fn screen_to_board(&self, screen: Point) -> Point {
        Point { x: screen.x + self.scroll_x - self.origin_x, y: screen.y + self.scroll_y - self.origin_y }
    }

    /// Board point to container-relative coordinates.
    #[must_use]
    pub fn board_to_screen(&self, board: Point) -> Point {
        Point { x: board.x - self.scroll_x + self.origin_x, y: board.y - self.scroll_y + self.origin_y }
    }

    /// Scroll so the center of `bounds` sits in the middle of the viewport. Scroll never goes negative.
    pub fn center_on(&mut self, bounds: Rect, viewport_w: f64, viewport_h: f64) {
        let c = bounds.center();
        self.scroll_x = (c.x + self.origin_x - viewport_w / 2.0).max(0.0);
        self.scroll_y = (c.y + self.origin_y - viewport_h / 2.0).max(0.0);
    }
}
