//! Selection capture: the asynchronous collaborator that reads the
//! currently selected text.
//!
//! The engine never talks to a platform clipboard directly; it holds a
//! [`SelectionSource`] and bounds every call with a timeout.

pub mod command;

use std::future::Future;

/// Why a capture produced no text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("no selection")]
    NoSelection,
    #[error("capture timed out")]
    Timeout,
    /// The focused application is on the ignore list.
    #[error("focused application excluded: {0}")]
    Excluded(String),
    /// The reader could not be run or failed in an unexpected way.
    #[error("reader: {0}")]
    Reader(String),
}

impl CaptureError {
    /// Machine-readable kind for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied => "permission_denied",
            CaptureError::NoSelection => "no_selection",
            CaptureError::Timeout => "timeout",
            CaptureError::Excluded(_) => "excluded",
            CaptureError::Reader(_) => "reader",
        }
    }
}

/// Reads the current text selection.
///
/// `Send + Sync + 'static` because the engine spawns each capture as
/// its own task so the event loop stays responsive while it runs.
pub trait SelectionSource: Send + Sync + 'static {
    fn capture_selected_text(&self) -> impl Future<Output = Result<String, CaptureError>> + Send;
}

/// Always yields the same text. Backs `replay --capture-text`.
#[derive(Debug, Clone)]
pub struct FixedSelection(pub String);

impl SelectionSource for FixedSelection {
    async fn capture_selected_text(&self) -> Result<String, CaptureError> {
        Ok(self.0.clone())
    }
}
