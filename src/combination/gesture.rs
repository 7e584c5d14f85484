//! Built-in recognizers for selection gestures.

use crate::event::{EventKind, InputEvent, KeyCode};

use super::Combination;

/// Drag events required before a pointer-up counts as a drag-select.
pub const DEFAULT_DRAG_THRESHOLD: usize = 3;

/// Matches the second (or later) press of a multi-click.
#[derive(Debug)]
pub struct DoubleClick {
    identifier: String,
}

impl DoubleClick {
    pub fn new() -> Self {
        Self {
            identifier: "DoubleClick".into(),
        }
    }
}

impl Default for DoubleClick {
    fn default() -> Self {
        Self::new()
    }
}

impl Combination for DoubleClick {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn consume(&mut self, event: &InputEvent) -> bool {
        matches!(event.kind, EventKind::PointerDown { click_count } if click_count >= 2)
    }
}

/// Matches a pointer-up that ends a drag of at least `threshold` steps.
///
/// A pointer-down clears the drag history, including one that arrives
/// mid-drag: the count always restarts from the latest press. Any event
/// outside down/drag/up is an interruption and clears it too.
#[derive(Debug)]
pub struct DragThreshold {
    identifier: String,
    threshold: usize,
    drags: Vec<InputEvent>,
}

impl DragThreshold {
    pub fn new(threshold: usize) -> Self {
        Self {
            identifier: "DragThreshold".into(),
            threshold,
            drags: Vec::new(),
        }
    }
}

impl Default for DragThreshold {
    fn default() -> Self {
        Self::new(DEFAULT_DRAG_THRESHOLD)
    }
}

impl Combination for DragThreshold {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn consume(&mut self, event: &InputEvent) -> bool {
        match event.kind {
            EventKind::PointerDown { .. } => {
                self.drags.clear();
                false
            }
            EventKind::PointerDrag => {
                self.drags.push(*event);
                false
            }
            EventKind::PointerUp => self.drags.len() >= self.threshold,
            _ => {
                self.drags.clear();
                false
            }
        }
    }
}

/// Matches every scroll event.
#[derive(Debug)]
pub struct ScrollDismiss {
    identifier: String,
}

impl ScrollDismiss {
    pub fn new() -> Self {
        Self {
            identifier: "ScrollDismiss".into(),
        }
    }
}

impl Default for ScrollDismiss {
    fn default() -> Self {
        Self::new()
    }
}

impl Combination for ScrollDismiss {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn consume(&mut self, event: &InputEvent) -> bool {
        matches!(event.kind, EventKind::Scroll { .. })
    }
}

/// Matches the first key-down of a single key code. Auto-repeat while
/// the key is held does not match again.
#[derive(Debug)]
pub struct KeyPress {
    identifier: String,
    code: KeyCode,
}

impl KeyPress {
    pub fn new(code: KeyCode) -> Self {
        Self {
            identifier: format!("KeyPress({code})"),
            code,
        }
    }
}

impl Combination for KeyPress {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn consume(&mut self, event: &InputEvent) -> bool {
        matches!(event.kind, EventKind::KeyDown { code, repeat: false } if code == self.code)
    }
}
