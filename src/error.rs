//! Errors found throughout this crate

use crate::core::{ClientId, Window};
use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

/// Errors that occur from interacting with the X-Server or from the data the
/// window manager is fed
#[derive(Debug, Error)]
pub(crate) enum Error {
    /// Failure to connect to the server
    #[error("failed to connect to the X11 server: {0}")]
    Connect(#[from] ConnectError),

    /// The connection to the server is gone. Every later request fails too
    #[error("the connection to the X11 server was lost: {0}")]
    Connection(String),

    /// A single request was rejected by the server
    #[error("request `{request}` failed: {reason}")]
    Protocol {
        /// Name of the request
        request: &'static str,
        /// What the server said
        reason:  String,
    },

    /// A geometry round trip failed; the cached value is kept
    #[error("failed to query the geometry of Window({0:#0x}): {1}")]
    Query(Window, String),

    /// The command channel received a name that is not an action
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A command was known, but its arguments were not
    #[error("invalid arguments for `{command}`: {reason}")]
    InvalidArguments {
        /// The command name
        command: String,
        /// What was wrong
        reason:  String,
    },

    /// A binding could not be resolved into a chord or an action
    #[error("unknown binding `{chord}`: {reason}")]
    UnknownBinding {
        /// The chord as written in the configuration
        chord:  String,
        /// What could not be resolved
        reason: String,
    },

    /// The client cannot receive input focus right now
    #[error("Window({0:#0x}) cannot be focused")]
    NotFocusable(Window),

    /// The client was removed after the id was handed out
    #[error("{0} no longer exists")]
    StaleClient(ClientId),

    /// The window is not managed by the window manager
    #[error("Window({0:#0x}) is not managed")]
    NotManaged(Window),

    /// An illegal client state transition was requested
    #[error("illegal state transition from {from} via {via}")]
    IllegalTransition {
        /// Name of the current state
        from: &'static str,
        /// Name of the transition
        via:  &'static str,
    },

    /// Another window manager already owns the root window
    #[error("another window manager is currently running")]
    AlreadyRunning,

    /// The configuration snapshot is unusable
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The theme could not be built
    #[error("invalid theme: {0}")]
    Theme(String),
}

impl Error {
    /// Build a [`Error::Protocol`] for the named request
    pub(crate) fn protocol(request: &'static str, reason: impl ToString) -> Self {
        Self::Protocol {
            request,
            reason: reason.to_string(),
        }
    }

    /// Is this error fatal to the event loop?
    pub(crate) const fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Connect(_))
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e.to_string())
    }
}

impl From<ReplyOrIdError> for Error {
    fn from(e: ReplyOrIdError) -> Self {
        match e {
            ReplyOrIdError::ConnectionError(e) => e.into(),
            ReplyOrIdError::IdsExhausted => Self::protocol("generate_id", "ids exhausted"),
            ReplyOrIdError::X11Error(e) => Self::protocol("generate_id", format!("{:?}", e)),
        }
    }
}

/// Lift a [`ReplyError`] into an [`Error`], keeping connection failures fatal
pub(crate) fn reply_error(request: &'static str, e: ReplyError) -> Error {
    match e {
        ReplyError::ConnectionError(e) => e.into(),
        ReplyError::X11Error(e) => Error::protocol(request, format!("{:?}", e.error_kind)),
    }
}

/// Shorthand result type for the window manager core
pub(crate) type WmResult<T> = Result<T, Error>;
