//! Input model: tools, modifier keys, mouse buttons, UI state, and the gesture state machine.
//!
//! `Tool` and `Modifiers` capture the user's intent at the time of a pointer
//! event. `UiState` is the client-local state the renderer shows (tool,
//! color, selection, pending connector). `InputState` is the active gesture
//! being tracked between pointer-down and pointer-up, carrying what is needed
//! to preview it and to emit final patches on release.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::doc::{BoardObject, ObjectId, ObjectKind};
use crate::hit::ResizeAnchor;
use crate::select::{DragSelect, Selection};
use crate::transform::GroupTransform;

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Pointer / selection tool (default).
    #[default]
    Select,
    Sticky,
    Rect,
    Circle,
    Text,
    Frame,
    /// Two-click connector tool.
    Connect,
}

impl Tool {
    /// Object variant a single click creates, for creation tools.
    #[must_use]
    pub fn creates(self) -> Option<ObjectKind> {
        match self {
            Self::Sticky => Some(ObjectKind::Sticky),
            Self::Rect => Some(ObjectKind::Rect),
            Self::Circle => Some(ObjectKind::Circle),
            Self::Text => Some(ObjectKind::Text),
            Self::Frame => Some(ObjectKind::Frame),
            Self::Select | Self::Connect => None,
        }
    }
}

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    /// Meta / Command key.
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Command on macOS.
    #[must_use]
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }

    #[must_use]
    pub fn none(self) -> bool {
        !(self.shift || self.ctrl || self.alt || self.meta)
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Primary,
    Middle,
    Secondary,
}

/// A keyboard key, named as the host reports it (e.g. `"Delete"`, `"Escape"`, `"z"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    /// Case-insensitive comparison for letter shortcuts.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.0.eq_ignore_ascii_case(name)
    }
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

/// Connect-tool progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectState {
    #[default]
    Idle,
    /// First endpoint chosen; waiting for a different second one.
    PendingSource(ObjectId),
}

/// Persistent UI state visible to the renderer.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub tool: Tool,
    /// Color new objects get in their variant's color slot. `None` uses the variant default.
    pub active_color: Option<String>,
    pub selection: Selection,
    pub connect: ConnectState,
    /// A view fit was asked for and has not been applied yet.
    pub fit_requested: bool,
}

/// Internal state for the input state machine.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// Dragging the view.
    Panning { last_screen: Point },
    /// Moving every selected object together.
    DraggingObjects {
        start_world: Point,
        /// Id and original position of each moved object.
        originals: Vec<(ObjectId, Point)>,
        /// Set on the first move, when the undo snapshot is taken.
        moved: bool,
    },
    /// Rubber-band selection on empty canvas.
    DragSelecting(DragSelect),
    /// Resizing the selection box from one handle.
    Resizing {
        anchor: ResizeAnchor,
        originals: Vec<BoardObject>,
        transform: GroupTransform,
        moved: bool,
    },
    /// Rotating the selection box around its center.
    Rotating {
        start_world: Point,
        originals: Vec<BoardObject>,
        transform: GroupTransform,
        moved: bool,
    },
}
