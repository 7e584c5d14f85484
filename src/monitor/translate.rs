//! Raw device input → [`InputEvent`] translation.
//!
//! Platform-neutral so it can be tested without a display: the X11
//! thread decodes each event into a [`RawInput`] and a
//! [`PointerSnapshot`], and this module decides what, if anything, the
//! engine gets to see.

use crate::event::click::ClickCounter;
use crate::event::{EventKind, InputEvent, KeyCode, Modifiers, Point, ScrollDelta};

/// Primary (left) button.
const BUTTON_PRIMARY: u32 = 1;
const BUTTON_WHEEL_UP: u32 = 4;
const BUTTON_WHEEL_DOWN: u32 = 5;
const BUTTON_WHEEL_LEFT: u32 = 6;
const BUTTON_WHEEL_RIGHT: u32 = 7;

/// Device input before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    ButtonPress(u32),
    ButtonRelease(u32),
    Motion,
    KeyPress { code: KeyCode, repeat: bool },
    KeyRelease(KeyCode),
}

/// Pointer state sampled alongside a raw event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSnapshot {
    pub position: Point,
    pub modifiers: Modifiers,
    pub primary_held: bool,
}

/// Stateful translator. One per event source.
#[derive(Debug, Default)]
pub struct Translator {
    clicks: ClickCounter,
    last_motion: Option<Point>,
}

impl Translator {
    /// Classify one raw input. `None` means the input is dropped.
    pub fn translate(
        &mut self,
        raw: RawInput,
        pointer: PointerSnapshot,
        at_ms: u64,
    ) -> Option<InputEvent> {
        let kind = match raw {
            RawInput::ButtonPress(BUTTON_PRIMARY) => EventKind::PointerDown {
                click_count: self.clicks.press(at_ms, pointer.position),
            },
            RawInput::ButtonRelease(BUTTON_PRIMARY) => EventKind::PointerUp,
            RawInput::ButtonPress(button) => EventKind::Scroll {
                delta: wheel_delta(button)?,
            },
            // Wheel releases carry nothing; other buttons are not ours.
            RawInput::ButtonRelease(_) => return None,
            RawInput::Motion => {
                // Raw motion also fires for sub-pixel movement.
                if self.last_motion == Some(pointer.position) {
                    return None;
                }
                self.last_motion = Some(pointer.position);
                if pointer.primary_held {
                    self.clicks.reset();
                    EventKind::PointerDrag
                } else {
                    EventKind::PointerMove
                }
            }
            RawInput::KeyPress { code, repeat } => EventKind::KeyDown { code, repeat },
            RawInput::KeyRelease(code) => EventKind::KeyUp { code },
        };

        Some(InputEvent::new(kind, pointer.position, at_ms).with_modifiers(pointer.modifiers))
    }
}

fn wheel_delta(button: u32) -> Option<ScrollDelta> {
    let (dx, dy) = match button {
        BUTTON_WHEEL_UP => (0.0, 1.0),
        BUTTON_WHEEL_DOWN => (0.0, -1.0),
        BUTTON_WHEEL_LEFT => (-1.0, 0.0),
        BUTTON_WHEEL_RIGHT => (1.0, 0.0),
        _ => return None,
    };
    Some(ScrollDelta { dx, dy })
}
