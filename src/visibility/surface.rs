//! Surface egress: the commands the controller sends to the UI shell.

use std::io::Write;
use std::time::Duration;

use crate::event::{Point, Size};

/// The popup the controller shows and hides.
///
/// Rendering is the UI shell's business; the controller only needs the
/// surface size for placement and hit-testing.
pub trait Surface {
    fn size(&self) -> Size;
    /// Show the surface with its top-left corner at `origin`.
    fn show_at(&mut self, origin: Point, text: &str);
    fn hide(&mut self);
    fn hide_animated(&mut self, fade: Duration);
}

/// Writes one tab-separated command per line to a writer (stdout by
/// default) for a UI shell to consume:
///
/// ```text
/// show\t<x>\t<y>\t<escaped text>
/// hide
/// fade\t<ms>
/// ```
pub struct LineSurface<W: Write> {
    out: W,
    size: Size,
}

impl LineSurface<std::io::Stdout> {
    pub fn stdout(size: Size) -> Self {
        Self::new(std::io::stdout(), size)
    }
}

impl<W: Write> LineSurface<W> {
    pub fn new(out: W, size: Size) -> Self {
        Self { out, size }
    }

    fn emit(&mut self, line: std::fmt::Arguments<'_>) {
        // Best-effort: a vanished shell must not take the engine down.
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            tracing::warn!(error = %e, "surface write failed");
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Surface for LineSurface<W> {
    fn size(&self) -> Size {
        self.size
    }

    fn show_at(&mut self, origin: Point, text: &str) {
        let text = escape(text);
        self.emit(format_args!(
            "show\t{}\t{}\t{text}",
            origin.x.round() as i64,
            origin.y.round() as i64
        ));
    }

    fn hide(&mut self) {
        self.emit(format_args!("hide"));
    }

    fn hide_animated(&mut self, fade: Duration) {
        self.emit(format_args!("fade\t{}", fade.as_millis()));
    }
}

/// Escape backslash, tab, CR and newline so a command stays on one line.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}
