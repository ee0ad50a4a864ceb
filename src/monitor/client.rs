//! Metadata about a managed X-window

use crate::{
    core::{WindowHandle, WorkspaceId},
    error::{Error, WmResult},
    geometry::Rectangle,
    x::{
        event::WindowChanges,
        property::{IcccmWindowState, Protocols, WindowProperties},
    },
};
use std::fmt;

// ============================ ClientState ===========================
// ====================================================================

/// Current state of a [`Client`].
///
/// Fullscreen and maximized clients carry the geometry they return to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClientState {
    /// Known, but not managed on any workspace
    Withdrawn,
    /// Minimized; belongs to a workspace but is never mapped
    Iconic,
    /// Placed wherever the client or the user put it
    Normal,
    /// Covering its head, without decorations
    Fullscreen {
        restore: Rectangle,
    },
    /// Covering its head, with borders only
    Maximized {
        restore: Rectangle,
    },
}

/// A request to move a [`Client`] between [`ClientState`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    /// The client asked to be mapped
    Map,
    /// The client asked to start minimized
    MapIconic,
    Iconify,
    Deiconify,
    /// The client unmapped itself
    Withdraw,
    /// Enter fullscreen, remembering `current`
    Fullscreen { current: Rectangle },
    /// Enter maximized, remembering `current`
    Maximize { current: Rectangle },
    /// Leave fullscreen or maximized
    Restore,
}

impl Transition {
    /// Name of the transition
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::MapIconic => "map-iconic",
            Self::Iconify => "iconify",
            Self::Deiconify => "deiconify",
            Self::Withdraw => "withdraw",
            Self::Fullscreen { .. } => "fullscreen",
            Self::Maximize { .. } => "maximize",
            Self::Restore => "restore",
        }
    }
}

impl ClientState {
    /// Name of the state
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::Withdrawn => "withdrawn",
            Self::Iconic => "iconic",
            Self::Normal => "normal",
            Self::Fullscreen { .. } => "fullscreen",
            Self::Maximized { .. } => "maximized",
        }
    }

    /// Compute the state reached through `via`.
    ///
    /// Entering fullscreen from maximized (and back) keeps the original
    /// restore geometry
    pub(crate) fn transition(self, via: Transition) -> WmResult<Self> {
        use ClientState::{Fullscreen, Iconic, Maximized, Normal, Withdrawn};

        let next = match (self, via) {
            (_, Transition::Withdraw) => Some(Withdrawn),

            (Withdrawn | Iconic, Transition::Map) => Some(Normal),
            (state, Transition::Map) => Some(state),
            (Withdrawn, Transition::MapIconic) => Some(Iconic),

            (Withdrawn, Transition::Iconify) => None,
            (_, Transition::Iconify) => Some(Iconic),

            (Withdrawn, Transition::Deiconify) => None,
            (Iconic, Transition::Deiconify) => Some(Normal),
            (state, Transition::Deiconify) => Some(state),

            (Normal, Transition::Fullscreen { current }) => Some(Fullscreen { restore: current }),
            (Maximized { restore } | Fullscreen { restore }, Transition::Fullscreen { .. }) =>
                Some(Fullscreen { restore }),

            (Normal, Transition::Maximize { current }) => Some(Maximized { restore: current }),
            (Fullscreen { restore } | Maximized { restore }, Transition::Maximize { .. }) =>
                Some(Maximized { restore }),

            (Normal | Fullscreen { .. } | Maximized { .. }, Transition::Restore) => Some(Normal),

            _ => None,
        };

        next.ok_or(Error::IllegalTransition {
            from: self.name(),
            via:  via.name(),
        })
    }

    /// Is the client mapped when its workspace is visible?
    pub(crate) const fn is_visible(&self) -> bool {
        matches!(
            self,
            Self::Normal | Self::Fullscreen { .. } | Self::Maximized { .. }
        )
    }

    /// Can a client in this state hold the input focus?
    pub(crate) const fn accepts_focus(&self) -> bool {
        matches!(self, Self::Normal | Self::Maximized { .. })
    }

    /// The geometry to return to, if any
    pub(crate) const fn restore(&self) -> Option<Rectangle> {
        match self {
            Self::Fullscreen { restore } | Self::Maximized { restore } => Some(*restore),
            _ => None,
        }
    }

    pub(crate) const fn is_fullscreen(&self) -> bool {
        matches!(self, Self::Fullscreen { .. })
    }

    pub(crate) const fn is_maximized(&self) -> bool {
        matches!(self, Self::Maximized { .. })
    }

    /// The ICCCM `WM_STATE` matching this state
    pub(crate) const fn icccm(&self) -> IcccmWindowState {
        match self {
            Self::Withdrawn => IcccmWindowState::Withdrawn,
            Self::Iconic => IcccmWindowState::Iconic,
            _ => IcccmWindowState::Normal,
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================== Client ==============================
// ====================================================================

/// Information about a top-level [`Window`](crate::core::Window).
///
/// Only the [`Registry`](super::registry::Registry) changes the state and
/// the workspace of a client
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Client {
    /// The client's own window
    pub(crate) handle:      WindowHandle,
    pub(super) state:       ClientState,
    pub(super) workspace:   Option<WorkspaceId>,
    /// Frames drawn around the client; empty while withdrawn
    pub(crate) decorations: Vec<WindowHandle>,
    /// Accepts the input focus (ICCCM input hint or `WM_TAKE_FOCUS`)
    pub(crate) focusable:   bool,
    /// Focus is set directly, not only through `WM_TAKE_FOCUS`
    pub(crate) input:       bool,
    /// The client window is mapped by the manager
    pub(super) mapped:      bool,

    pub(crate) name:     String,
    pub(crate) class:    String,
    pub(crate) instance: String,

    pub(crate) protocols: Protocols,

    /// Unmap notifies caused by the manager that are still to arrive
    pub(super) pending_unmaps: u32,
    /// Geometry asked for while fullscreen or maximized
    pub(super) stashed:        Option<WindowChanges>,
}

impl Client {
    /// Create a withdrawn [`Client`] from the properties of its window
    pub(crate) fn new(handle: WindowHandle, props: &WindowProperties) -> Self {
        Self {
            handle,
            state: ClientState::Withdrawn,
            workspace: None,
            decorations: vec![],
            focusable: props.accepts_input(),
            input: props.hints.input.unwrap_or(true),
            mapped: false,
            name: props.name.clone(),
            class: props.class.clone(),
            instance: props.instance.clone(),
            protocols: props.protocols,
            pending_unmaps: 0,
            stashed: None,
        }
    }

    pub(crate) const fn state(&self) -> ClientState {
        self.state
    }

    pub(crate) const fn workspace(&self) -> Option<WorkspaceId> {
        self.workspace
    }

    /// The decoration frame, if the client has one
    pub(crate) fn frame(&self) -> Option<WindowHandle> {
        self.decorations.first().copied()
    }

    /// Geometry changes waiting for the client to leave fullscreen or
    /// maximized
    pub(crate) const fn stashed(&self) -> Option<WindowChanges> {
        self.stashed
    }

    pub(crate) const fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Can the client be focused right now?
    pub(crate) const fn can_focus(&self) -> bool {
        self.focusable && self.state.accepts_focus()
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}] ({})", self.handle, self.class, self.state)
    }
}
