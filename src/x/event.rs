//! X11 Events

use crate::{
    core::{Atom, Window},
    geometry::{Point, Rectangle},
};
use strum::EnumIter;
use x11rb::protocol::xproto::StackMode;

// ============================== XEvent ==============================

/// Low-level wrapper around X-server events.
///
/// Only the events the manager reacts to are translated; everything else
/// arrives as [`XEvent::Unknown`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum XEvent {
    /// A client is requesting to be mapped
    MapRequest(Window),
    /// A window was unmapped
    UnmapNotify {
        window:    Window,
        /// Sent by a client through `SendEvent` (ICCCM withdrawal)
        synthetic: bool,
    },
    /// A window was destroyed
    DestroyNotify(Window),
    /// A window has changed its configuration
    ConfigureNotify(ConfigureEvent),
    /// Request for configuration from a client
    ConfigureRequest(ConfigureRequestData),
    /// A key combination was pressed
    KeyPress(InputEvent),
    /// A mouse button was pressed
    ButtonPress(InputEvent),
    /// A client message was received
    ClientMessage(ClientMessage),
    /// The randr screen layout changed
    ScreenChange,
    /// The loop was woken up by a background worker
    Wakeup,
    /// Catchall for events the manager does not track
    Unknown,
}

/// Classification used to select a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub(crate) enum EventKind {
    MapRequest,
    UnmapNotify,
    DestroyNotify,
    ConfigureNotify,
    ConfigureRequest,
    KeyPress,
    ButtonPress,
    ClientMessage,
    ScreenChange,
    Wakeup,
    Unknown,
}

impl XEvent {
    /// The [`EventKind`] of the event
    pub(crate) const fn kind(&self) -> EventKind {
        match self {
            Self::MapRequest(_) => EventKind::MapRequest,
            Self::UnmapNotify { .. } => EventKind::UnmapNotify,
            Self::DestroyNotify(_) => EventKind::DestroyNotify,
            Self::ConfigureNotify(_) => EventKind::ConfigureNotify,
            Self::ConfigureRequest(_) => EventKind::ConfigureRequest,
            Self::KeyPress(_) => EventKind::KeyPress,
            Self::ButtonPress(_) => EventKind::ButtonPress,
            Self::ClientMessage(_) => EventKind::ClientMessage,
            Self::ScreenChange => EventKind::ScreenChange,
            Self::Wakeup => EventKind::Wakeup,
            Self::Unknown => EventKind::Unknown,
        }
    }
}

/// Data associated with a configure event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConfigureEvent {
    /// The window associated with the event
    pub(crate) id:      Window,
    /// The new geometry of the window
    pub(crate) geom:    Rectangle,
    /// Is the window the root window?
    pub(crate) is_root: bool,
}

/// Fields of a configure request. Absent fields were not asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct WindowChanges {
    pub(crate) x:            Option<i32>,
    pub(crate) y:            Option<i32>,
    pub(crate) width:        Option<u32>,
    pub(crate) height:       Option<u32>,
    pub(crate) border_width: Option<u32>,
    /// Sibling window. Used if `stack_mode` is set
    pub(crate) sibling:      Option<Window>,
    pub(crate) stack_mode:   Option<StackMode>,
}

impl WindowChanges {
    /// Does the request move or resize the window?
    pub(crate) const fn touches_geometry(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.width.is_some() || self.height.is_some()
    }

    /// Does the request change the size of the window?
    pub(crate) const fn touches_size(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }

    /// Combine with an `older` request; fields set here win
    pub(crate) fn over(self, older: Self) -> Self {
        Self {
            x:            self.x.or(older.x),
            y:            self.y.or(older.y),
            width:        self.width.or(older.width),
            height:       self.height.or(older.height),
            border_width: self.border_width.or(older.border_width),
            sibling:      self.sibling.or(older.sibling),
            stack_mode:   self.stack_mode.or(older.stack_mode),
        }
    }

    /// Fill the absent geometry fields from `current`
    pub(crate) fn merge(&self, current: Rectangle) -> Rectangle {
        Rectangle::new(
            self.x.unwrap_or(current.point.x),
            self.y.unwrap_or(current.point.y),
            self.width.unwrap_or(current.dimension.width),
            self.height.unwrap_or(current.dimension.height),
        )
    }
}

impl From<Rectangle> for WindowChanges {
    fn from(r: Rectangle) -> Self {
        Self {
            x: Some(r.point.x),
            y: Some(r.point.y),
            width: Some(r.dimension.width),
            height: Some(r.dimension.height),
            ..Self::default()
        }
    }
}

/// Data associated with a configure request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConfigureRequestData {
    /// The window associated with the event
    pub(crate) id:      Window,
    /// What the client asked for
    pub(crate) changes: WindowChanges,
}

/// Data associated with a key or button press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InputEvent {
    /// Window the event was reported relative to
    pub(crate) window: Window,
    /// Child of `window` the pointer was in, if any
    pub(crate) child:  Option<Window>,
    /// Pointer position relative to the root
    pub(crate) root:   Point,
    /// The raw modifier state
    pub(crate) state:  u16,
    /// Keycode or button number
    pub(crate) detail: u8,
    /// Server timestamp
    pub(crate) time:   u32,
}

// ========================== ClientMessage ===========================

/// A client message, already sorted by its type atom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClientMessage {
    /// The window the message is about
    pub(crate) window: Window,
    pub(crate) kind:   MessageKind,
}

/// The `_NET_WM_STATE` properties the manager understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NetWmState {
    Fullscreen,
    /// Either of the maximized atoms
    Maximized,
    Other,
}

/// The client messages the manager understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageKind {
    /// `_XWMD_COMMAND`; the raw format 32 payload
    Command([u32; 5]),
    /// `_NET_ACTIVE_WINDOW`
    ActiveWindow,
    /// `_NET_CLOSE_WINDOW`
    CloseWindow,
    /// `_NET_CURRENT_DESKTOP`
    CurrentDesktop(u32),
    /// `_NET_WM_DESKTOP`
    WmDesktop(u32),
    /// `_NET_WM_STATE` with its action and up to two properties
    WmState {
        action:     u32,
        properties: [NetWmState; 2],
    },
    /// ICCCM `WM_CHANGE_STATE`
    ChangeState(u32),
    /// Any other type
    Other(Atom),
}

#[cfg(test)]
mod tests {
    use super::{EventKind, WindowChanges, XEvent};
    use crate::geometry::Rectangle;
    use strum::IntoEnumIterator;

    #[test]
    fn merge_keeps_absent_fields() {
        let changes = WindowChanges {
            x: Some(5),
            height: Some(40),
            ..WindowChanges::default()
        };
        assert_eq!(
            changes.merge(Rectangle::new(1, 2, 30, 30)),
            Rectangle::new(5, 2, 30, 40)
        );
        assert!(changes.touches_geometry());
        assert!(changes.touches_size());
    }

    #[test]
    fn every_kind_is_reachable() {
        assert_eq!(EventKind::iter().count(), 11);
        assert_eq!(XEvent::Wakeup.kind(), EventKind::Wakeup);
        assert_eq!(XEvent::Unknown.kind(), EventKind::Unknown);
    }
}
