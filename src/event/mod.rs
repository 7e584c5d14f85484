//! Semantic input events: the closed set the engine understands.
//!
//! Platform adapters translate raw device events into [`InputEvent`]
//! values; anything they cannot classify is dropped before it reaches
//! the dispatcher.

pub mod click;

use serde::{Deserialize, Serialize};

/// Screen-space coordinate (root window, y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Width and height of a surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Axis-aligned rectangle with its origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.origin.x
            && p.y >= self.origin.y
            && p.x < self.origin.x + self.size.width
            && p.y < self.origin.y + self.size.height
    }
}

bitflags::bitflags! {
    /// Keyboard modifiers held when the event was generated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
        const SUPER = 1 << 3;
    }
}

/// Platform key code (X11 keycode on the reference adapter).
pub type KeyCode = u32;

/// Scroll amount in wheel notches. Positive `dy` scrolls up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollDelta {
    pub dx: f64,
    pub dy: f64,
}

/// Variant-specific part of an input event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Primary button pressed. `click_count` is 1 for a single press,
    /// 2 for the second press of a double-click, and so on.
    PointerDown { click_count: u32 },
    /// Pointer moved with the primary button held.
    PointerDrag,
    /// Primary button released.
    PointerUp,
    /// Pointer moved with no button held.
    PointerMove,
    Scroll { delta: ScrollDelta },
    KeyDown { code: KeyCode, repeat: bool },
    KeyUp { code: KeyCode },
}

/// A semantic input event. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub kind: EventKind,
    /// Pointer location when the event was generated.
    pub position: Point,
    pub modifiers: Modifiers,
    /// Monotonic milliseconds since the producing monitor started.
    pub timestamp_ms: u64,
}

impl InputEvent {
    pub fn new(kind: EventKind, position: Point, timestamp_ms: u64) -> Self {
        Self {
            kind,
            position,
            modifiers: Modifiers::empty(),
            timestamp_ms,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn is_pointer_move(&self) -> bool {
        matches!(self.kind, EventKind::PointerMove)
    }

    /// Events that dismiss a visible surface: everything except
    /// pointer-up and plain pointer motion.
    pub fn is_dismissal(&self) -> bool {
        match self.kind {
            EventKind::PointerDown { .. }
            | EventKind::PointerDrag
            | EventKind::Scroll { .. }
            | EventKind::KeyDown { .. }
            | EventKind::KeyUp { .. } => true,
            EventKind::PointerUp | EventKind::PointerMove => false,
        }
    }

    /// Short name for log fields.
    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::PointerDown { .. } => "pointer_down",
            EventKind::PointerDrag => "pointer_drag",
            EventKind::PointerUp => "pointer_up",
            EventKind::PointerMove => "pointer_move",
            EventKind::Scroll { .. } => "scroll",
            EventKind::KeyDown { .. } => "key_down",
            EventKind::KeyUp { .. } => "key_up",
        }
    }
}
