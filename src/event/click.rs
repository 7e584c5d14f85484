//! Click-count synthesis for platforms that report bare button presses.
//!
//! X11 delivers every press independently; the desktop convention is
//! that a press close in time and space to the previous one continues
//! the same click sequence.

use std::time::Duration;

use super::Point;

/// Maximum gap between presses of one sequence.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Maximum pointer travel between presses of one sequence.
pub const DEFAULT_SLOP: f64 = 4.0;

#[derive(Debug, Clone, Copy)]
struct LastPress {
    at_ms: u64,
    position: Point,
    count: u32,
}

/// Tracks consecutive presses and assigns each a click count.
#[derive(Debug)]
pub struct ClickCounter {
    interval: Duration,
    slop: f64,
    last: Option<LastPress>,
}

impl Default for ClickCounter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, DEFAULT_SLOP)
    }
}

impl ClickCounter {
    pub fn new(interval: Duration, slop: f64) -> Self {
        Self {
            interval,
            slop,
            last: None,
        }
    }

    /// Register a press and return its click count (1-based).
    pub fn press(&mut self, at_ms: u64, position: Point) -> u32 {
        let count = match self.last {
            Some(last)
                if at_ms.saturating_sub(last.at_ms) <= self.interval.as_millis() as u64
                    && last.position.distance(position) <= self.slop =>
            {
                last.count + 1
            }
            _ => 1,
        };
        self.last = Some(LastPress {
            at_ms,
            position,
            count,
        });
        count
    }

    /// Forget the current sequence (e.g. after a drag).
    pub fn reset(&mut self) {
        self.last = None;
    }
}
