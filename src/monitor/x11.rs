//! X11 integration: XInput2 raw events, pointer queries, event thread.
//!
//! Raw events reach the root window regardless of which client owns the
//! pointer or keyboard, so the daemon sees every click and key without
//! grabbing anything. Raw events carry no coordinates; each one is paired
//! with a `QueryPointer` round trip.

use std::os::fd::{AsRawFd, BorrowedFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::Event;
use x11rb::protocol::xinput::{self, KeyEventFlags, XIEventMask};
use x11rb::protocol::xproto::{self, KeyButMask, Window};
use x11rb::rust_connection::RustConnection;

use crate::event::{InputEvent, Modifiers, Point};

use super::MonitorError;
use super::translate::{PointerSnapshot, RawInput, Translator};

/// XInput version with raw events delivered to the root window.
const XI_MAJOR: u16 = 2;
const XI_MINOR: u16 = 2;

/// X11 connection context for the input monitor.
pub struct X11Context {
    conn: Arc<RustConnection>,
    screen_num: usize,
    root: Window,
}

impl X11Context {
    /// Connect to the display and check for XInput 2.2.
    pub fn connect() -> Result<Self, MonitorError> {
        let (conn, screen_num) = RustConnection::connect(None)
            .map_err(|e| MonitorError::X11(format!("connect failed: {e}")))?;

        let root = conn.setup().roots[screen_num].root;

        if conn
            .extension_information(xinput::X11_EXTENSION_NAME)
            .map_err(|e| MonitorError::X11(format!("query extension: {e}")))?
            .is_none()
        {
            return Err(MonitorError::MissingExtension("XInputExtension"));
        }

        let version = xinput::xi_query_version(&conn, XI_MAJOR, XI_MINOR)
            .map_err(|e| MonitorError::X11(format!("xi_query_version: {e}")))?
            .reply()
            .map_err(|e| MonitorError::X11(format!("xi_query_version reply: {e}")))?;

        if (version.major_version, version.minor_version) < (XI_MAJOR, XI_MINOR) {
            return Err(MonitorError::MissingExtension("XInput 2.2"));
        }

        tracing::debug!(
            major = version.major_version,
            minor = version.minor_version,
            "XInput available"
        );

        Ok(Self {
            conn: Arc::new(conn),
            screen_num,
            root,
        })
    }

    /// Subscribe to raw button, motion and key events from all master
    /// devices on the root window.
    pub fn select_raw_events(&self) -> Result<(), MonitorError> {
        let mask = XIEventMask::RAW_BUTTON_PRESS
            | XIEventMask::RAW_BUTTON_RELEASE
            | XIEventMask::RAW_MOTION
            | XIEventMask::RAW_KEY_PRESS
            | XIEventMask::RAW_KEY_RELEASE;

        xinput::xi_select_events(
            &*self.conn,
            self.root,
            &[xinput::EventMask {
                deviceid: xinput::Device::ALL_MASTER.into(),
                mask: vec![mask],
            }],
        )
        .map_err(|e| MonitorError::X11(format!("xi_select_events send: {e}")))?
        .check()
        .map_err(|e| MonitorError::X11(format!("xi_select_events: {e}")))?;

        Ok(())
    }

    pub fn conn(&self) -> &Arc<RustConnection> {
        &self.conn
    }

    pub fn setup(&self) -> &xproto::Setup {
        self.conn.setup()
    }

    pub fn screen_num(&self) -> usize {
        self.screen_num
    }

    pub fn root(&self) -> Window {
        self.root
    }
}

/// Decode the raw events we subscribed to. Everything else is `None`.
fn decode(event: &Event) -> Option<RawInput> {
    match event {
        Event::XinputRawButtonPress(e) => Some(RawInput::ButtonPress(e.detail)),
        Event::XinputRawButtonRelease(e) => Some(RawInput::ButtonRelease(e.detail)),
        Event::XinputRawMotion(_) => Some(RawInput::Motion),
        Event::XinputRawKeyPress(e) => Some(RawInput::KeyPress {
            code: e.detail,
            repeat: e.flags.contains(KeyEventFlags::KEY_REPEAT),
        }),
        Event::XinputRawKeyRelease(e) => Some(RawInput::KeyRelease(e.detail)),
        _ => None,
    }
}

/// Sample pointer position, modifiers and primary button state.
fn query_pointer(conn: &RustConnection, root: Window) -> Result<PointerSnapshot, MonitorError> {
    let reply = xproto::query_pointer(conn, root)
        .map_err(|e| MonitorError::X11(format!("query_pointer: {e}")))?
        .reply()
        .map_err(|e| MonitorError::X11(format!("query_pointer reply: {e}")))?;

    let held = |bit: KeyButMask| reply.mask.contains(bit);

    let mut modifiers = Modifiers::empty();
    modifiers.set(Modifiers::SHIFT, held(KeyButMask::SHIFT));
    modifiers.set(Modifiers::CONTROL, held(KeyButMask::CONTROL));
    modifiers.set(Modifiers::ALT, held(KeyButMask::MOD1));
    modifiers.set(Modifiers::SUPER, held(KeyButMask::MOD4));

    Ok(PointerSnapshot {
        position: Point::new(f64::from(reply.root_x), f64::from(reply.root_y)),
        modifiers,
        primary_held: held(KeyButMask::BUTTON1),
    })
}

/// Spawn a dedicated thread that polls the X11 connection for raw input.
///
/// Uses `nix::poll()` on the connection fd with a 100ms timeout, drains
/// every queued event, translates it, and forwards the result. Checks
/// `stop` each iteration for clean shutdown. Dropping the sender when
/// the thread exits closes the engine's event channel.
pub fn spawn_event_thread(
    conn: Arc<RustConnection>,
    root: Window,
    stop: Arc<AtomicBool>,
) -> Result<(tokio::sync::mpsc::UnboundedReceiver<InputEvent>, JoinHandle<()>), MonitorError> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    let handle = std::thread::Builder::new()
        .name("x11-input".into())
        .spawn(move || {
            let raw_fd = conn.stream().as_raw_fd();
            let started = Instant::now();
            let mut translator = Translator::default();

            while !stop.load(Ordering::Relaxed) {
                // SAFETY: raw_fd is the X11 connection fd, valid while conn is alive.
                let borrowed = unsafe { BorrowedFd::borrow_raw(raw_fd) };
                let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];

                match poll(&mut fds, PollTimeout::from(100u16)) {
                    Ok(0) => continue,
                    Ok(_) => loop {
                        // QueryPointer replies may queue further events,
                        // so keep draining until the queue is empty.
                        let event = match conn.poll_for_event() {
                            Ok(Some(event)) => event,
                            Ok(None) => break,
                            Err(e) => {
                                tracing::error!(error = %e, "X11 connection error");
                                return;
                            }
                        };
                        let Some(raw) = decode(&event) else {
                            continue;
                        };
                        let pointer = match query_pointer(&conn, root) {
                            Ok(p) => p,
                            Err(e) => {
                                tracing::warn!(error = %e, "pointer query failed, event dropped");
                                continue;
                            }
                        };
                        let at_ms = started.elapsed().as_millis() as u64;
                        if let Some(input) = translator.translate(raw, pointer, at_ms)
                            && tx.send(input).is_err()
                        {
                            // Receiver dropped, shut down.
                            return;
                        }
                    },
                    Err(nix::Error::EINTR) => continue,
                    Err(e) => {
                        tracing::error!(error = %e, "poll error on X11 fd");
                        return;
                    }
                }
            }
        })
        .map_err(MonitorError::Io)?;

    Ok((rx, handle))
}
