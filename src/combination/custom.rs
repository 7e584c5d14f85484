//! Predicate-backed combination for ad-hoc routing.

use crate::event::InputEvent;

use super::Combination;

/// Delegates matching to a caller-supplied classification function.
///
/// The engine uses these to route dismissal events and pointer motion
/// without writing a dedicated recognizer for each.
pub struct CustomPredicate {
    identifier: String,
    predicate: Box<dyn FnMut(&InputEvent) -> bool + Send>,
}

impl CustomPredicate {
    pub fn new(
        identifier: impl Into<String>,
        predicate: impl FnMut(&InputEvent) -> bool + Send + 'static,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            predicate: Box::new(predicate),
        }
    }
}

impl std::fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomPredicate")
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

impl Combination for CustomPredicate {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn consume(&mut self, event: &InputEvent) -> bool {
        (self.predicate)(event)
    }
}
