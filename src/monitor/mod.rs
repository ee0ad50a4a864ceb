//! The model of what is managed: clients, workspaces and the heads showing
//! them

pub(crate) mod client;
pub(crate) mod head;
pub(crate) mod invariants;
pub(crate) mod registry;
pub(crate) mod workspace;

use crate::{config::Config, core::decoration::Theme, x::session::DisplaySession};

/// Collaborators borrowed by the [`Registry`](registry::Registry) while it
/// handles one event
pub(crate) struct Env<'a, S: DisplaySession> {
    pub(crate) session: &'a S,
    pub(crate) theme:   &'a dyn Theme,
    pub(crate) config:  &'a Config,
}

impl<'a, S: DisplaySession> Env<'a, S> {
    pub(crate) fn new(session: &'a S, theme: &'a dyn Theme, config: &'a Config) -> Self {
        Self {
            session,
            theme,
            config,
        }
    }
}
