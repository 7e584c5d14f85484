//! Command-backed selection reader: `xclip -selection primary -o` by
//! default.
//!
//! Same mechanism as writing the clipboard through `xclip`, reversed:
//! spawn the reader, collect stdout, classify the exit.

use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;

use super::{CaptureError, SelectionSource};

/// Default reader program.
pub const DEFAULT_READER: &str = "xclip";

/// Default reader arguments: print the PRIMARY selection.
pub const DEFAULT_READER_ARGS: [&str; 3] = ["-selection", "primary", "-o"];

/// Reports the class of the application that currently has focus.
pub trait FocusProbe: Send + Sync + 'static {
    /// `None` when no window has focus or it carries no class.
    fn focused_class(&self) -> Option<String>;
}

/// Reads the selection by running an external program.
pub struct CommandSelection {
    program: String,
    args: Vec<String>,
    ignore: Vec<String>,
    probe: Option<Arc<dyn FocusProbe>>,
}

impl CommandSelection {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            ignore: Vec::new(),
            probe: None,
        }
    }

    /// `xclip -selection primary -o`.
    pub fn xclip_primary() -> Self {
        Self::new(
            DEFAULT_READER,
            DEFAULT_READER_ARGS.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Refuse to capture while an application with one of `classes`
    /// has focus. Class comparison is case-insensitive.
    pub fn with_ignore_list(mut self, classes: Vec<String>, probe: Arc<dyn FocusProbe>) -> Self {
        self.ignore = classes;
        self.probe = Some(probe);
        self
    }

    async fn check_focus(&self) -> Result<(), CaptureError> {
        let Some(probe) = self.probe.as_ref().filter(|_| !self.ignore.is_empty()) else {
            return Ok(());
        };
        let probe = Arc::clone(probe);
        let class = tokio::task::spawn_blocking(move || probe.focused_class())
            .await
            .map_err(|e| CaptureError::Reader(format!("focus probe: {e}")))?;

        match class {
            Some(class) if self.ignore.iter().any(|c| c.eq_ignore_ascii_case(&class)) => {
                Err(CaptureError::Excluded(class))
            }
            _ => Ok(()),
        }
    }
}

impl SelectionSource for CommandSelection {
    async fn capture_selected_text(&self) -> Result<String, CaptureError> {
        self.check_focus().await?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
                ErrorKind::NotFound => CaptureError::Reader(format!("{} not found", self.program)),
                _ => CaptureError::Reader(format!("failed to spawn {}: {e}", self.program)),
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        classify_failure(&self.program, output.status, &output.stderr)
    }
}

/// Map a non-zero reader exit to an error.
///
/// Readers report "nothing selected" either silently or with a
/// "not available" message; anything else is a reader failure.
fn classify_failure(
    program: &str,
    status: std::process::ExitStatus,
    stderr: &[u8],
) -> Result<String, CaptureError> {
    let stderr = String::from_utf8_lossy(stderr);
    let first = stderr.lines().next().unwrap_or("").trim();

    if first.is_empty() || first.contains("not available") {
        return Err(CaptureError::NoSelection);
    }
    if first.to_ascii_lowercase().contains("permission denied") {
        return Err(CaptureError::PermissionDenied);
    }
    Err(CaptureError::Reader(format!(
        "{program} exited with {status}: {first}"
    )))
}
