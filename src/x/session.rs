//! The display session seen by the window manager core

use crate::{
    core::{decoration::CursorRef, Atom, Keycode, Window},
    error::WmResult,
    geometry::{Point, Rectangle},
    x::{
        event::{WindowChanges, XEvent},
        property::{Ewmh, Protocol, WindowProperties},
    },
};
use std::{io::Write, os::unix::net::UnixStream};
use x11rb::protocol::xproto::EventMask;

/// Which device a grab released by [`DisplaySession::allow_events`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Device {
    Keyboard,
    Pointer,
}

/// Requests and replies the manager needs from the display server.
///
/// Every method returns [`Error::Connection`](crate::error::Error) once the
/// connection is gone
pub(crate) trait DisplaySession {
    /// The root window of the managed screen
    fn root(&self) -> Window;

    /// Block until the next event arrives
    fn next_event(&self) -> WmResult<XEvent>;

    /// Send every buffered request
    fn flush(&self) -> WmResult<()>;

    /// Geometry of a window in root coordinates
    fn get_geometry(&self, window: Window) -> WmResult<Rectangle>;

    /// Apply a configure to a window
    fn configure_window(&self, window: Window, changes: &WindowChanges) -> WmResult<()>;

    /// Place a window on top of its siblings
    fn raise_window(&self, window: Window) -> WmResult<()>;

    /// Tell a client about its geometry with a synthetic `ConfigureNotify`
    fn send_configure_notify(&self, window: Window, rect: Rectangle) -> WmResult<()>;

    fn map_window(&self, window: Window) -> WmResult<()>;

    fn unmap_window(&self, window: Window) -> WmResult<()>;

    fn destroy_window(&self, window: Window) -> WmResult<()>;

    /// Create an unmapped decoration frame on the root window
    fn create_frame(&self, rect: Rectangle, color: u32) -> WmResult<Window>;

    /// Change the background of a frame and redraw it
    fn set_window_background(&self, window: Window, color: u32) -> WmResult<()>;

    /// Select events on a window
    fn subscribe(&self, window: Window, mask: EventMask) -> WmResult<()>;

    /// Give the input focus to a window
    fn set_input_focus(&self, window: Window) -> WmResult<()>;

    /// Return the input focus to the root window
    fn unfocus(&self) -> WmResult<()>;

    /// Send a `WM_PROTOCOLS` message
    fn send_protocol(&self, window: Window, protocol: Protocol) -> WmResult<()>;

    /// Destroy the client owning a window
    fn kill_client(&self, window: Window) -> WmResult<()>;

    /// Read the properties used to manage a window
    fn window_properties(&self, window: Window) -> WmResult<WindowProperties>;

    /// Mapped, non override-redirect children of the root window
    fn existing_windows(&self) -> WmResult<Vec<Window>>;

    /// Rectangles of the connected outputs, in server order
    fn query_heads(&self) -> WmResult<Vec<Rectangle>>;

    /// Pointer position relative to the root
    fn pointer_position(&self) -> WmResult<Point>;

    /// Keycodes producing a keysym
    fn keycodes_for(&self, keysym: u32) -> WmResult<Vec<Keycode>>;

    /// Passive grab of a key in synchronous keyboard mode
    fn grab_key(&self, window: Window, modifiers: u16, keycode: Keycode) -> WmResult<()>;

    /// Passive grab of a button in synchronous pointer mode
    fn grab_button(&self, window: Window, modifiers: u16, button: u8) -> WmResult<()>;

    /// Release every passive grab on a window
    fn ungrab_all(&self, window: Window) -> WmResult<()>;

    /// Thaw a device frozen by a passive grab, replaying the event or not
    fn allow_events(&self, device: Device, replay: bool, time: u32) -> WmResult<()>;

    fn intern_atom(&self, name: &str) -> WmResult<Atom>;

    fn atom_name(&self, atom: Atom) -> WmResult<String>;

    /// Show the named cursor over a window
    fn set_cursor(&self, window: Window, cursor: CursorRef) -> WmResult<()>;

    /// Update an EWMH or ICCCM property
    fn update_property(&self, property: &Ewmh) -> WmResult<()>;

    /// A handle background threads use to interrupt [`Self::next_event`]
    fn waker(&self) -> WmResult<Waker>;
}

// =============================== Waker ==============================

/// Write end of the socket pair polled next to the display connection
#[derive(Debug)]
pub(crate) struct Waker(Option<UnixStream>);

impl Waker {
    /// Create a [`Waker`] writing into `stream`
    pub(crate) const fn new(stream: UnixStream) -> Self {
        Self(Some(stream))
    }

    /// A [`Waker`] that does nothing
    pub(crate) const fn noop() -> Self {
        Self(None)
    }

    /// Interrupt the event loop
    pub(crate) fn wake(&self) {
        if let Some(mut stream) = self.0.as_ref() {
            if let Err(e) = stream.write_all(&[1]) {
                log::warn!("failed to wake the event loop: {}", e);
            }
        }
    }
}
