//! Workspaces and the [`Layout`] that shows them on heads

use crate::{
    core::{ClientId, HeadId, WorkspaceId},
    error::{Error, WmResult},
    geometry::Rectangle,
    monitor::head::Head,
};
use indexmap::IndexSet;

// ============================= Workspace ============================
// ====================================================================

/// A named set of clients shown on at most one head at a time
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Workspace {
    pub(crate) id:      WorkspaceId,
    pub(crate) name:    String,
    /// Clients on the workspace, in the order they joined
    pub(super) members: IndexSet<ClientId>,
    /// Head the workspace was last placed on
    pub(super) head:    Option<HeadId>,
}

impl Workspace {
    pub(crate) fn new(id: WorkspaceId, name: String) -> Self {
        Self {
            id,
            name,
            members: IndexSet::new(),
            head: None,
        }
    }

    pub(crate) const fn members(&self) -> &IndexSet<ClientId> {
        &self.members
    }

    pub(crate) const fn head(&self) -> Option<HeadId> {
        self.head
    }
}

// ========================= VisibilityChange =========================
// ====================================================================

/// What has to happen on the server after the layout changed.
///
/// Workspaces in `unmap` are hidden before those in `map` are shown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct VisibilityChange {
    /// Workspaces leaving view
    pub(crate) unmap:     Vec<WorkspaceId>,
    /// Workspaces entering view
    pub(crate) map:       Vec<WorkspaceId>,
    /// Workspaces whose head moved, with the old and new head rectangles
    pub(crate) relocated: Vec<(WorkspaceId, Rectangle, Rectangle)>,
}

impl VisibilityChange {
    pub(crate) fn is_empty(&self) -> bool {
        self.unmap.is_empty() && self.map.is_empty() && self.relocated.is_empty()
    }
}

// ============================== Layout ==============================
// ====================================================================

/// Owner of every [`Head`] and [`Workspace`]
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    pub(super) heads:      Vec<Head>,
    pub(super) workspaces: Vec<Workspace>,
}

impl Layout {
    /// Create the workspaces and show the first ones on `heads`.
    ///
    /// Extra workspaces are created when there are more heads than names
    pub(crate) fn new(names: &[String], heads: &[Rectangle]) -> Self {
        let mut layout = Self {
            heads:      vec![],
            workspaces: names
                .iter()
                .enumerate()
                .map(|(i, name)| Workspace::new(WorkspaceId(i), name.clone()))
                .collect(),
        };

        if layout.workspaces.is_empty() {
            layout.add_workspace();
        }

        let heads = if heads.is_empty() {
            vec![Rectangle::new(0, 0, 1, 1)]
        } else {
            heads.to_vec()
        };

        for (i, rect) in heads.into_iter().enumerate() {
            let active = if i < layout.workspaces.len() {
                WorkspaceId(i)
            } else {
                layout.add_workspace()
            };
            layout.heads.push(Head::new(HeadId(i), rect, active));
            layout.workspaces[active.0].head = Some(HeadId(i));
        }

        // Hidden workspaces start out on the first head
        for ws in &mut layout.workspaces {
            ws.head.get_or_insert(HeadId(0));
        }

        layout
    }

    /// Append a workspace named after its position
    pub(super) fn add_workspace(&mut self) -> WorkspaceId {
        let id = WorkspaceId(self.workspaces.len());
        log::debug!("creating {}", id);
        self.workspaces
            .push(Workspace::new(id, (id.0 + 1).to_string()));
        id
    }

    pub(crate) fn workspaces(&self) -> &[Workspace] {
        &self.workspaces
    }

    /// Rename workspaces after `names`, appending the missing ones.
    ///
    /// Workspaces are never removed, so their members stay put
    pub(crate) fn rename(&mut self, names: &[String]) {
        let first_head = self.heads.first().map(|h| h.id);
        for (i, name) in names.iter().enumerate() {
            let id = if i < self.workspaces.len() {
                WorkspaceId(i)
            } else {
                let id = self.add_workspace();
                self.workspaces[id.0].head = first_head;
                id
            };
            self.workspaces[id.0].name = name.clone();
        }
    }

    pub(crate) fn workspace(&self, id: WorkspaceId) -> Option<&Workspace> {
        self.workspaces.get(id.0)
    }

    /// Find a workspace by name
    pub(crate) fn find(&self, name: &str) -> Option<WorkspaceId> {
        self.workspaces
            .iter()
            .find(|ws| ws.name == name)
            .map(|ws| ws.id)
    }

    /// Is the workspace shown on its head?
    pub(crate) fn is_visible(&self, id: WorkspaceId) -> bool {
        self.workspace(id)
            .and_then(|ws| ws.head)
            .and_then(|h| self.head(h))
            .map_or(false, |h| h.active == id)
    }

    /// Rectangle of the head a workspace is on
    pub(crate) fn workspace_rect(&self, id: WorkspaceId) -> Option<Rectangle> {
        self.workspace(id)
            .and_then(|ws| ws.head)
            .and_then(|h| self.head(h))
            .map(|h| h.rect)
    }

    // ============================ Membership ========================

    /// Detach `client` from `from` and attach it to `to` in one step
    pub(crate) fn move_client(
        &mut self,
        client: ClientId,
        from: Option<WorkspaceId>,
        to: Option<WorkspaceId>,
    ) -> WmResult<()> {
        if let Some(to) = to {
            if self.workspace(to).is_none() {
                return Err(Error::InvalidArguments {
                    command: String::from("workspace"),
                    reason:  format!("{} does not exist", to),
                });
            }
        }

        if let Some(ws) = from.and_then(|id| self.workspaces.get_mut(id.0)) {
            ws.members.shift_remove(&client);
        }
        if let Some(ws) = to.and_then(|id| self.workspaces.get_mut(id.0)) {
            ws.members.insert(client);
        }

        Ok(())
    }

    // ============================ Switching =========================

    /// Show `workspace` on `head`.
    ///
    /// A workspace already shown on another head trades places with the
    /// one on `head`, so nothing is unmapped
    pub(crate) fn switch_active_workspace(
        &mut self,
        head: HeadId,
        workspace: WorkspaceId,
    ) -> WmResult<VisibilityChange> {
        let target = self.head(head).ok_or_else(|| Error::InvalidArguments {
            command: String::from("workspace"),
            reason:  format!("{} does not exist", head),
        })?;
        let (old, rect) = (target.active, target.rect);

        let ws = self.workspace(workspace).ok_or_else(|| Error::InvalidArguments {
            command: String::from("workspace"),
            reason:  format!("{} does not exist", workspace),
        })?;
        let from_head = ws.head;

        let mut change = VisibilityChange::default();
        if old == workspace {
            return Ok(change);
        }

        log::debug!("showing {} on {}", workspace, head);

        match from_head.filter(|&h| self.is_visible(workspace) && h != head) {
            // Trade places
            Some(other) => {
                let other_rect = self.heads[other.0].rect;
                self.heads[other.0].active = old;
                self.heads[head.0].active = workspace;
                self.workspaces[old.0].head = Some(other);
                self.workspaces[workspace.0].head = Some(head);

                if other_rect != rect {
                    change.relocated.push((workspace, other_rect, rect));
                    change.relocated.push((old, rect, other_rect));
                }
            },
            None => {
                if let Some(prev) = from_head.filter(|&h| h != head).and_then(|h| self.head(h)) {
                    if prev.rect != rect {
                        change.relocated.push((workspace, prev.rect, rect));
                    }
                }

                self.heads[head.0].active = workspace;
                self.workspaces[workspace.0].head = Some(head);
                change.unmap.push(old);
                change.map.push(workspace);
            },
        }

        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::{Layout, VisibilityChange};
    use crate::{
        core::{ClientId, HeadId, WorkspaceId},
        geometry::Rectangle,
    };
    use pretty_assertions::assert_eq;

    const A: Rectangle = Rectangle::new(0, 0, 1920, 1080);
    const B: Rectangle = Rectangle::new(1920, 0, 1280, 1024);

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| i.to_string()).collect()
    }

    #[test]
    fn every_head_gets_a_workspace() {
        let layout = Layout::new(&names(1), &[A, B]);
        assert_eq!(layout.workspaces().len(), 2);
        assert_eq!(layout.workspaces()[1].name, "2");
        assert!(layout.is_visible(WorkspaceId(0)));
        assert!(layout.is_visible(WorkspaceId(1)));
    }

    #[test]
    fn switching_hides_the_old_workspace_first() {
        let mut layout = Layout::new(&names(3), &[A]);
        let change = layout
            .switch_active_workspace(HeadId(0), WorkspaceId(2))
            .unwrap();

        assert_eq!(change, VisibilityChange {
            unmap:     vec![WorkspaceId(0)],
            map:       vec![WorkspaceId(2)],
            relocated: vec![],
        });
        assert!(!layout.is_visible(WorkspaceId(0)));
        assert!(layout.is_visible(WorkspaceId(2)));
    }

    #[test]
    fn switching_to_the_shown_workspace_does_nothing() {
        let mut layout = Layout::new(&names(3), &[A]);
        assert!(layout
            .switch_active_workspace(HeadId(0), WorkspaceId(0))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn workspace_shown_elsewhere_trades_places() {
        let mut layout = Layout::new(&names(2), &[A, B]);
        let change = layout
            .switch_active_workspace(HeadId(0), WorkspaceId(1))
            .unwrap();

        assert!(change.unmap.is_empty() && change.map.is_empty());
        assert_eq!(change.relocated, vec![
            (WorkspaceId(1), B, A),
            (WorkspaceId(0), A, B)
        ]);
        assert_eq!(layout.heads()[0].active, WorkspaceId(1));
        assert_eq!(layout.heads()[1].active, WorkspaceId(0));
    }

    #[test]
    fn renaming_keeps_members_and_appends() {
        let mut layout = Layout::new(&names(2), &[Rectangle::new(0, 0, 100, 100)]);
        let id = ClientId {
            index:      0,
            generation: 0,
        };
        layout.move_client(id, None, Some(WorkspaceId(1))).unwrap();

        layout.rename(&[String::from("web"), String::from("mail"), String::from("chat")]);
        assert_eq!(layout.workspaces().len(), 3);
        assert_eq!(layout.find("mail"), Some(WorkspaceId(1)));
        assert!(layout.workspace(WorkspaceId(1)).unwrap().members().contains(&id));
        assert_eq!(layout.workspace_rect(WorkspaceId(2)), Some(Rectangle::new(0, 0, 100, 100)));
    }

    #[test]
    fn move_client_is_atomic() {
        let mut layout = Layout::new(&names(2), &[A]);
        let c = ClientId {
            index:      0,
            generation: 0,
        };
        layout.move_client(c, None, Some(WorkspaceId(0))).unwrap();
        layout
            .move_client(c, Some(WorkspaceId(0)), Some(WorkspaceId(1)))
            .unwrap();

        assert!(layout.workspaces()[0].members().is_empty());
        assert!(layout.workspaces()[1].members().contains(&c));

        // An unknown target leaves the client where it was
        assert!(layout
            .move_client(c, Some(WorkspaceId(1)), Some(WorkspaceId(9)))
            .is_err());
        assert!(layout.workspaces()[1].members().contains(&c));
    }
}
