//! Everything that talks to the X-Server

pub(crate) mod event;
pub(crate) mod input;
pub(crate) mod keysym;
#[cfg(test)]
pub(crate) mod mock;
pub(crate) mod property;
pub(crate) mod session;
pub(crate) mod xconnection;

use x11rb::protocol::xproto::EventMask;

/// Events selected on the root window. Holding `SUBSTRUCTURE_REDIRECT` is
/// what makes a client the window manager
pub(crate) fn root_event_mask() -> EventMask {
    EventMask::SUBSTRUCTURE_REDIRECT
        | EventMask::SUBSTRUCTURE_NOTIFY
        | EventMask::STRUCTURE_NOTIFY
        | EventMask::PROPERTY_CHANGE
}

/// Events selected on a managed client.
///
/// Unmaps and destroys already arrive through the root's substructure mask
pub(crate) fn client_event_mask() -> EventMask {
    EventMask::PROPERTY_CHANGE | EventMask::FOCUS_CHANGE
}
