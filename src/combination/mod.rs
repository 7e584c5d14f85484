//! Combinations: stateful gesture recognizers.
//!
//! A combination consumes one [`InputEvent`] at a time and reports
//! whether the event completes its gesture. Each combination owns its
//! history exclusively; the dispatcher never shares one between
//! registrations.

mod custom;
mod gesture;

pub use custom::CustomPredicate;
pub use gesture::{DEFAULT_DRAG_THRESHOLD, DoubleClick, DragThreshold, KeyPress, ScrollDismiss};

use crate::event::InputEvent;

/// A gesture recognizer.
///
/// `consume` must not block. Mutating private history is its only side
/// effect.
pub trait Combination: Send {
    /// Stable name used in logs.
    fn identifier(&self) -> &str;

    /// Feed one event. Returns `true` when the event completes the
    /// gesture.
    fn consume(&mut self, event: &InputEvent) -> bool;
}
