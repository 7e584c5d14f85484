//! Focused-application lookup via `_NET_ACTIVE_WINDOW` and `WM_CLASS`.

use std::sync::Arc;

use x11rb::protocol::xproto::{self, Atom, AtomEnum, Window};
use x11rb::rust_connection::RustConnection;

use crate::capture::command::FocusProbe;

use super::MonitorError;
use super::x11::X11Context;

/// Reports the `WM_CLASS` class of the active window.
pub struct X11FocusProbe {
    conn: Arc<RustConnection>,
    root: Window,
    net_active_window: Atom,
}

impl X11FocusProbe {
    pub fn new(ctx: &X11Context) -> Result<Self, MonitorError> {
        let net_active_window = xproto::intern_atom(&**ctx.conn(), false, b"_NET_ACTIVE_WINDOW")
            .map_err(|e| MonitorError::X11(format!("intern_atom: {e}")))?
            .reply()
            .map_err(|e| MonitorError::X11(format!("intern_atom reply: {e}")))?
            .atom;

        Ok(Self {
            conn: Arc::clone(ctx.conn()),
            root: ctx.root(),
            net_active_window,
        })
    }

    /// Read `_NET_ACTIVE_WINDOW` on the root window.
    fn active_window(&self) -> Result<Option<Window>, MonitorError> {
        let reply = xproto::get_property(
            &*self.conn,
            false,
            self.root,
            self.net_active_window,
            AtomEnum::WINDOW,
            0,
            1,
        )
        .map_err(|e| MonitorError::X11(format!("get_property _NET_ACTIVE_WINDOW: {e}")))?
        .reply()
        .map_err(|e| MonitorError::X11(format!("get_property reply: {e}")))?;

        let window = reply.value32().and_then(|mut v| v.next());
        Ok(window.filter(|&w| w != 0))
    }

    fn class_of(&self, window: Window) -> Result<Option<String>, MonitorError> {
        let reply = xproto::get_property(
            &*self.conn,
            false,
            window,
            AtomEnum::WM_CLASS,
            AtomEnum::STRING,
            0,
            256,
        )
        .map_err(|e| MonitorError::X11(format!("get_property WM_CLASS: {e}")))?
        .reply()
        .map_err(|e| MonitorError::X11(format!("get_property reply: {e}")))?;

        Ok(parse_wm_class(&reply.value))
    }
}

impl FocusProbe for X11FocusProbe {
    fn focused_class(&self) -> Option<String> {
        let lookup = || -> Result<Option<String>, MonitorError> {
            match self.active_window()? {
                Some(window) => self.class_of(window),
                None => Ok(None),
            }
        };
        match lookup() {
            Ok(class) => class,
            Err(e) => {
                tracing::debug!(error = %e, "focus lookup failed");
                None
            }
        }
    }
}

/// `WM_CLASS` is two NUL-terminated strings: instance, then class.
/// Prefer the class, fall back to the instance.
fn parse_wm_class(value: &[u8]) -> Option<String> {
    let mut parts = value
        .split(|&b| b == 0)
        .filter(|p| !p.is_empty())
        .map(|p| String::from_utf8_lossy(p).into_owned());
    let instance = parts.next()?;
    Some(parts.next().unwrap_or(instance))
}
