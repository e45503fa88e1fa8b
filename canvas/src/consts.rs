//! Shared numeric constants for the canvas crate.

// ── Geometry ────────────────────────────────────────────────────

/// Smallest width or height an interactive resize may produce, in board units.
pub const MIN_OBJECT_SIZE: f64 = 20.0;

/// Margin added when shifting a snapshot out of negative coordinates.
pub const RENORMALIZE_MARGIN: f64 = 100.0;

/// Offset applied to duplicated and pasted objects, in board units.
pub const PASTE_OFFSET: f64 = 20.0;

// ── Camera ──────────────────────────────────────────────────────

/// Lower zoom bound for wheel zoom.
pub const MIN_ZOOM: f64 = 0.1;

/// Upper zoom bound for wheel zoom.
pub const MAX_ZOOM: f64 = 5.0;

/// View fit never zooms in past this factor.
pub const FIT_MAX_ZOOM: f64 = 2.0;

/// Screen-space padding kept around content by a view fit.
pub const FIT_PADDING_PX: f64 = 40.0;

/// Zoom change per wheel pixel.
pub const WHEEL_ZOOM_STEP: f64 = 0.001;

// ── Interaction ─────────────────────────────────────────────────

/// A rubber-band rectangle is shown only once it exceeds this size in either axis.
pub const DRAG_SELECT_THRESHOLD_PX: f64 = 4.0;

/// Screen-space hit slop in pixels for transform handles.
pub const HANDLE_RADIUS_PX: f64 = 8.0;

/// Distance from the bounding box edge to the rotate handle, in screen pixels.
pub const ROTATE_HANDLE_OFFSET_PX: f64 = 24.0;

// ── History / presence ──────────────────────────────────────────

/// Maximum number of snapshots kept on the undo stack.
pub const UNDO_LIMIT: usize = 20;

/// Minimum spacing between local cursor emits (~60Hz).
pub const CURSOR_EMIT_INTERVAL_MS: i64 = 16;
