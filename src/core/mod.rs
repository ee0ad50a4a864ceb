//! Base types used throughout [`xwmd`]

#![allow(clippy::missing_docs_in_private_items)]

pub(crate) mod change;
pub(crate) mod decoration;

use crate::{
    error::WmResult,
    geometry::Rectangle,
    x::session::DisplaySession,
};
use std::fmt;
use x11rb::protocol::xproto::EventMask;

// Re-export
pub(crate) use x11rb::protocol::xproto::{Atom, Keycode, Window};

/// Default string for missing values
pub(crate) const MISSING_VALUE: &str = "N/A";

/// Window manager's name
pub(crate) const WM_NAME: &str = "xwmd";

/// Window manager's class name
pub(crate) const WM_CLASS_NAME: &str = "Xwmd";

// =========================== Identifiers ============================
// ====================================================================

/// Index of a [`Workspace`](crate::monitor::workspace::Workspace)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct WorkspaceId(pub(crate) usize);

/// Index of a [`Head`](crate::monitor::head::Head). Heads are numbered in the
/// order the server reports its outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct HeadId(pub(crate) usize);

/// Arena slot of a [`Client`](crate::monitor::client::Client).
///
/// The generation changes every time a slot is reused, so an old id never
/// resolves to a newer client
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ClientId {
    pub(crate) index:      u32,
    pub(crate) generation: u32,
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Workspace({})", self.0)
    }
}

impl fmt::Display for HeadId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Head({})", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Client({}v{})", self.index, self.generation)
    }
}

// ========================== WindowHandle ============================
// ====================================================================

/// Representation of an X-window with its last known geometry.
///
/// Roots, clients and decoration frames are all plain handles. Two handles
/// may name the same server window; neither owns it
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WindowHandle {
    /// The ID of the window
    id:     Window,
    /// Last geometry reported by the server
    cached: Rectangle,
}

impl WindowHandle {
    /// Create a new [`WindowHandle`]
    pub(crate) const fn new(id: Window, rect: Rectangle) -> Self {
        Self { id, cached: rect }
    }

    /// The server identifier
    pub(crate) const fn id(&self) -> Window {
        self.id
    }

    /// Query the server for the current geometry and refresh the cache.
    ///
    /// On failure the cached value is kept untouched
    pub(crate) fn geometry<S: DisplaySession>(&mut self, session: &S) -> WmResult<Rectangle> {
        let rect = session.get_geometry(self.id)?;
        self.cached = rect;
        Ok(rect)
    }

    /// The last known geometry, without a round trip
    pub(crate) const fn cached_geometry(&self) -> Rectangle {
        self.cached
    }

    /// Replace the cached geometry with one the server reported
    pub(crate) fn refresh(&mut self, rect: Rectangle) {
        self.cached = rect;
    }

    /// Request event delivery for this window
    pub(crate) fn listen<S: DisplaySession>(&self, session: &S, mask: EventMask) -> WmResult<()> {
        session.subscribe(self.id, mask)
    }
}

impl PartialEq for WindowHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WindowHandle {}

impl From<Window> for WindowHandle {
    fn from(w: Window) -> Self {
        Self {
            id:     w,
            cached: Rectangle::zeroed(),
        }
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Window({:#0x})", self.id)
    }
}
