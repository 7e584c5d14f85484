//! Visibility controller: decides when the popup appears and disappears.
//!
//! State machine:
//!
//! ```text
//! Hidden ──gesture──▶ PendingShow ──novel text──▶ Visible
//!    ▲                    │                          │
//!    └──fail/empty/dup────┘◀──dismissal / idle timeout┘
//! ```
//!
//! All methods are synchronous state transitions driven by the engine
//! loop. The only timer is the hide countdown, represented as a
//! deadline plus a token; the engine sleeps on the deadline and hands
//! the token back, so a countdown that was replaced or cancelled while
//! its wake-up was already queued is recognised and ignored.

pub mod surface;

use std::time::Duration;

use tokio::time::Instant;

use crate::capture::CaptureError;
use crate::event::{Point, Rect};

use surface::Surface;

/// Default time the pointer may stay outside a visible surface.
pub const DEFAULT_HIDE_IDLE: Duration = Duration::from_millis(1000);

/// Default fade-out duration for animated hides.
pub const DEFAULT_FADE: Duration = Duration::from_millis(200);

/// Default gap between the pointer and the bottom edge of the surface.
pub const DEFAULT_OFFSET: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    /// A capture is outstanding.
    PendingShow,
    Visible,
}

/// Timing and placement parameters.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityConfig {
    pub hide_idle: Duration,
    pub fade: Duration,
    pub offset: f64,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            hide_idle: DEFAULT_HIDE_IDLE,
            fade: DEFAULT_FADE,
            offset: DEFAULT_OFFSET,
        }
    }
}

/// An armed hide countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HideCountdown {
    pub deadline: Instant,
    pub token: u64,
}

/// How a capture completion was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Shown,
    /// Superseded by a later gesture or dismissal; ignored.
    Stale,
    Failed(CaptureError),
    Empty,
    /// Same text as the last surface shown; not an error.
    Duplicate,
    /// Neither a pointer-up nor any pointer location is known.
    NoAnchor,
}

pub struct VisibilityController<U> {
    surface: U,
    config: VisibilityConfig,
    state: Visibility,
    /// Bumped whenever an outstanding capture is superseded.
    generation: u64,
    bounds: Option<Rect>,
    pointer: Option<Point>,
    last_shown: Option<String>,
    countdown: Option<HideCountdown>,
    next_token: u64,
}

impl<U: Surface> VisibilityController<U> {
    pub fn new(surface: U, config: VisibilityConfig) -> Self {
        Self {
            surface,
            config,
            state: Visibility::Hidden,
            generation: 0,
            bounds: None,
            pointer: None,
            last_shown: None,
            countdown: None,
            next_token: 0,
        }
    }

    pub fn state(&self) -> Visibility {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(test)]
    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    #[cfg(test)]
    pub fn last_shown(&self) -> Option<&str> {
        self.last_shown.as_deref()
    }

    pub fn hide_countdown(&self) -> Option<HideCountdown> {
        self.countdown
    }

    #[cfg(test)]
    pub fn surface(&self) -> &U {
        &self.surface
    }

    /// Record the latest pointer location without acting on it.
    pub fn observe_pointer(&mut self, p: Point) {
        self.pointer = Some(p);
    }

    /// Enter `PendingShow` for a new capture and return its generation.
    ///
    /// Any earlier outstanding capture becomes stale.
    pub fn begin_capture(&mut self) -> u64 {
        if self.state == Visibility::Visible {
            self.surface.hide();
        }
        self.countdown = None;
        self.generation += 1;
        self.state = Visibility::PendingShow;
        tracing::debug!(generation = self.generation, "capture pending");
        self.generation
    }

    /// Resolve the capture issued as `generation`.
    ///
    /// `anchor` is the pointer-up location the surface is placed against;
    /// the last observed pointer location is used when it is unknown.
    pub fn complete_capture(
        &mut self,
        generation: u64,
        result: Result<String, CaptureError>,
        anchor: Option<Point>,
    ) -> CaptureOutcome {
        if self.state != Visibility::PendingShow || generation != self.generation {
            tracing::debug!(
                generation,
                current = self.generation,
                state = ?self.state,
                "stale capture discarded"
            );
            return CaptureOutcome::Stale;
        }

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "capture failed");
                self.state = Visibility::Hidden;
                return CaptureOutcome::Failed(e);
            }
        };

        if text.is_empty() {
            tracing::debug!("empty selection");
            self.state = Visibility::Hidden;
            return CaptureOutcome::Empty;
        }

        if self.last_shown.as_deref() == Some(text.as_str()) {
            tracing::info!(len = text.len(), "duplicate selection suppressed");
            self.state = Visibility::Hidden;
            return CaptureOutcome::Duplicate;
        }

        let Some(anchor) = anchor.or(self.pointer) else {
            tracing::warn!("no pointer location to anchor the surface");
            self.state = Visibility::Hidden;
            return CaptureOutcome::NoAnchor;
        };

        let bounds = self.place(anchor);
        self.surface.show_at(bounds.origin, &text);
        self.bounds = Some(bounds);
        self.countdown = None;
        self.state = Visibility::Visible;
        tracing::debug!(
            x = bounds.origin.x,
            y = bounds.origin.y,
            len = text.len(),
            "surface shown"
        );
        self.last_shown = Some(text);
        CaptureOutcome::Shown
    }

    /// Centered horizontally on `anchor`, bottom edge `offset` above it.
    fn place(&self, anchor: Point) -> Rect {
        let size = self.surface.size();
        let origin = Point::new(
            anchor.x - size.width / 2.0,
            anchor.y - self.config.offset - size.height,
        );
        Rect::new(origin, size)
    }

    /// Immediate dismissal (pointer-down, drag, scroll, key).
    ///
    /// A pending capture is superseded: its completion will be stale.
    pub fn dismiss(&mut self) {
        match self.state {
            Visibility::Visible => {
                self.surface.hide();
                tracing::debug!("surface dismissed");
            }
            Visibility::PendingShow => {
                self.generation += 1;
                tracing::debug!(
                    generation = self.generation,
                    "pending capture superseded by dismissal"
                );
            }
            Visibility::Hidden => {}
        }
        self.countdown = None;
        self.state = Visibility::Hidden;
    }

    /// Fade the surface out if it is showing.
    pub fn hide_animated(&mut self) {
        if self.state != Visibility::Visible {
            return;
        }
        self.surface.hide_animated(self.config.fade);
        self.countdown = None;
        self.state = Visibility::Hidden;
        tracing::debug!("surface faded out");
    }

    /// Fade requested by a gesture seen at `generation`.
    ///
    /// Only fades the surface that was showing when the gesture happened;
    /// a surface shown by a later capture is left alone.
    pub fn fade_out(&mut self, generation: u64) {
        if generation != self.generation {
            tracing::trace!(
                generation,
                current = self.generation,
                "fade from an earlier episode dropped"
            );
            return;
        }
        self.hide_animated();
    }

    /// Re-check the hide countdown against the last pointer location.
    ///
    /// Outside the bounds the countdown restarts; inside it is cancelled.
    pub fn reevaluate_hide(&mut self) {
        if self.state != Visibility::Visible {
            return;
        }
        let (Some(bounds), Some(pointer)) = (self.bounds, self.pointer) else {
            return;
        };

        if bounds.contains(pointer) {
            if self.countdown.take().is_some() {
                tracing::trace!("hide countdown cancelled");
            }
        } else {
            self.next_token += 1;
            self.countdown = Some(HideCountdown {
                deadline: Instant::now() + self.config.hide_idle,
                token: self.next_token,
            });
            tracing::trace!(token = self.next_token, "hide countdown started");
        }
    }

    /// The countdown identified by `token` expired.
    pub fn hide_timer_fired(&mut self, token: u64) {
        match self.countdown {
            Some(c) if c.token == token => {}
            _ => {
                tracing::trace!(token, "expired countdown no longer armed");
                return;
            }
        }
        self.countdown = None;

        if self.state != Visibility::Visible {
            return;
        }
        let inside = match (self.bounds, self.pointer) {
            (Some(b), Some(p)) => b.contains(p),
            _ => false,
        };
        if inside {
            return;
        }
        self.hide_animated();
    }
}
