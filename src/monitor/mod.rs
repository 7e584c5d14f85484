//! Input monitor: turns the platform's device stream into
//! [`InputEvent`](crate::event::InputEvent)s on a channel.
//!
//! The reference adapter is X11: a dedicated thread reads XInput2 raw
//! events and marshals translated events onto the engine's serial
//! queue. The engine itself never touches the display connection.

pub mod focus;
pub mod keymap;
pub mod translate;
pub mod x11;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::event::InputEvent;

use focus::X11FocusProbe;
use x11::X11Context;

/// Monitor errors.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("X11: {0}")]
    X11(String),
    #[error("missing X extension: {0}")]
    MissingExtension(&'static str),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("input thread exited")]
    InputClosed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A running X11 monitor. Stops its thread on [`X11Monitor::stop`].
pub struct X11Monitor {
    ctx: X11Context,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl X11Monitor {
    /// Connect to the display and subscribe to raw input.
    pub fn connect() -> Result<Self, MonitorError> {
        let ctx = X11Context::connect()?;
        ctx.select_raw_events()?;
        tracing::info!(screen = ctx.screen_num(), "connected to X11 display");
        Ok(Self {
            ctx,
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        })
    }

    /// Resolve a key name such as `F8` to a keycode.
    pub fn resolve_key(&self, name: &str) -> Result<u32, MonitorError> {
        keymap::resolve_key(name, &**self.ctx.conn(), self.ctx.setup())
    }

    pub fn focus_probe(&self) -> Result<X11FocusProbe, MonitorError> {
        X11FocusProbe::new(&self.ctx)
    }

    /// Start the event thread. The returned channel closes when the
    /// thread exits.
    pub fn start(&mut self) -> Result<UnboundedReceiver<InputEvent>, MonitorError> {
        let (rx, handle) = x11::spawn_event_thread(
            Arc::clone(self.ctx.conn()),
            self.ctx.root(),
            Arc::clone(&self.stop),
        )?;
        self.thread = Some(handle);
        Ok(rx)
    }

    /// Signal the event thread and wait for it (at most one poll timeout).
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take()
            && let Err(e) = thread.join()
        {
            tracing::warn!("X11 event thread panicked: {e:?}");
        }
    }
}

impl Drop for X11Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}
