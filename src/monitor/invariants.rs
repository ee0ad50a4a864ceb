//! Consistency checks between the [`Registry`] and the [`Layout`]

use crate::monitor::{client::ClientState, registry::Registry, workspace::Layout};
use std::collections::HashSet;

/// Verify that clients and workspaces agree on membership.
///
/// Run after every event in debug builds; the first violation found is
/// returned
pub(crate) fn check(registry: &Registry, layout: &Layout) -> Result<(), String> {
    for (id, client) in registry.iter() {
        match client.workspace() {
            Some(ws) => {
                let holder = layout
                    .workspace(ws)
                    .ok_or_else(|| format!("{} is on the missing {}", id, ws))?;
                if !holder.members().contains(&id) {
                    return Err(format!("{} claims {} but is not a member", id, ws));
                }
            },
            None =>
                if client.state() != ClientState::Withdrawn {
                    return Err(format!("{} is {} without a workspace", id, client.state()));
                },
        }

        if client.state() == ClientState::Withdrawn && !client.decorations.is_empty() {
            return Err(format!("withdrawn {} still has decorations", id));
        }
    }

    let mut seen = HashSet::new();
    for ws in layout.workspaces() {
        for &member in ws.members() {
            let client = registry
                .get(member)
                .ok_or_else(|| format!("{} holds the removed {}", ws.id, member))?;
            if client.workspace() != Some(ws.id) {
                return Err(format!("{} holds {} which claims {:?}", ws.id, member, client.workspace()));
            }
            if !seen.insert(member) {
                return Err(format!("{} is a member of two workspaces", member));
            }
        }
    }

    let mut shown = HashSet::new();
    for head in layout.heads() {
        if !shown.insert(head.active) {
            return Err(format!("{} is active on two heads", head.active));
        }
        let ws = layout
            .workspace(head.active)
            .ok_or_else(|| format!("{} shows the missing {}", head.id, head.active))?;
        if ws.head() != Some(head.id) {
            return Err(format!("{} is shown on {} but placed on {:?}", ws.id, head.id, ws.head()));
        }
    }

    if let Some(id) = registry.focused() {
        if registry.get(id).map_or(true, |c| c.state() == ClientState::Withdrawn) {
            return Err(format!("focus points at the withdrawn {}", id));
        }
    }

    Ok(())
}
