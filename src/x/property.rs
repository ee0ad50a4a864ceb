//! Properties on the server

use crate::core::{Window, MISSING_VALUE};
use x11rb::properties;

// ============================== Hints ===============================

/// The parts of `WM_HINTS` the manager acts on
#[derive(Debug, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Default)]
pub(crate) struct Hints {
    pub(crate) urgent:        bool,
    pub(crate) input:         Option<bool>,
    pub(crate) initial_state: Option<IcccmWindowState>,
    pub(crate) group:         Option<Window>,
}

// ============================ Protocols =============================

/// The `WM_PROTOCOLS` a client takes part in
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub(crate) struct Protocols {
    /// Client wants `WM_TAKE_FOCUS`
    pub(crate) take_focus:    bool,
    /// Client handles `WM_DELETE_WINDOW`
    pub(crate) delete_window: bool,
}

/// A message sent through `WM_PROTOCOLS`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Protocol {
    TakeFocus,
    DeleteWindow,
}

// ========================= WindowProperties =========================

/// Everything read from a window before it is managed
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WindowProperties {
    /// `_NET_WM_NAME`, else `WM_NAME`
    pub(crate) name:              String,
    /// Second half of `WM_CLASS`
    pub(crate) class:             String,
    /// First half of `WM_CLASS`
    pub(crate) instance:          String,
    pub(crate) hints:             Hints,
    pub(crate) protocols:         Protocols,
    pub(crate) override_redirect: bool,
}

impl WindowProperties {
    /// Can the client be given the input focus?
    ///
    /// ICCCM: the input hint defaults to true, and a client taking part in
    /// `WM_TAKE_FOCUS` can still be focused with a false hint
    pub(crate) fn accepts_input(&self) -> bool {
        self.hints.input.unwrap_or(true) || self.protocols.take_focus
    }
}

impl Default for WindowProperties {
    fn default() -> Self {
        Self {
            name:              String::from(MISSING_VALUE),
            class:             String::from(MISSING_VALUE),
            instance:          String::from(MISSING_VALUE),
            hints:             Hints::default(),
            protocols:         Protocols::default(),
            override_redirect: false,
        }
    }
}

// ======================= Icccm Window State ======================

/// Possible values for setting the `WM_STATE` property on a client.
///
/// See the [ICCCM docs][1] for more information.
///
/// [1]: https://tronche.com/gui/x/icccm/sec-4.html#s-4.1.3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum IcccmWindowState {
    /// Newly created windows
    Withdrawn,
    /// Window is visible
    Normal,
    /// Window's icon is visible
    Iconic,
}

impl From<properties::WmHintsState> for IcccmWindowState {
    fn from(u: properties::WmHintsState) -> Self {
        match u {
            properties::WmHintsState::Iconic => Self::Iconic,
            properties::WmHintsState::Normal => Self::Normal,
        }
    }
}

impl From<IcccmWindowState> for u32 {
    fn from(u: IcccmWindowState) -> Self {
        match u {
            IcccmWindowState::Withdrawn => 0,
            IcccmWindowState::Normal => 1,
            IcccmWindowState::Iconic => 3,
        }
    }
}

// ============================ EWMH ==================================

/// A root or client property the manager keeps up to date
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Ewmh {
    /// `_NET_ACTIVE_WINDOW`; `None` deletes it
    ActiveWindow(Option<Window>),
    /// `_NET_CLIENT_LIST`
    ClientList(Vec<Window>),
    /// `_NET_NUMBER_OF_DESKTOPS` and `_NET_DESKTOP_NAMES`
    Desktops(Vec<String>),
    /// `_NET_CURRENT_DESKTOP`
    CurrentDesktop(u32),
    /// `_NET_WM_DESKTOP` of a client
    WmDesktop(Window, u32),
    /// `_NET_WM_STATE` of a client
    WmState {
        window:     Window,
        fullscreen: bool,
        maximized:  bool,
    },
    /// `_NET_FRAME_EXTENTS` of a client, as left, right, top, bottom
    FrameExtents(Window, [u32; 4]),
    /// ICCCM `WM_STATE`
    IcccmState(Window, IcccmWindowState),
}
