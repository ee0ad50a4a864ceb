//! Physical outputs of the screen

use crate::{
    core::{HeadId, WorkspaceId},
    geometry::{Point, Rectangle},
    monitor::workspace::{Layout, VisibilityChange},
};
use std::collections::HashSet;

/// An output, always showing exactly one workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Head {
    pub(crate) id:     HeadId,
    pub(crate) rect:   Rectangle,
    /// The workspace shown
    pub(crate) active: WorkspaceId,
}

impl Head {
    pub(crate) const fn new(id: HeadId, rect: Rectangle, active: WorkspaceId) -> Self {
        Self { id, rect, active }
    }
}

impl Layout {
    pub(crate) fn heads(&self) -> &[Head] {
        &self.heads
    }

    pub(crate) fn head(&self, id: HeadId) -> Option<&Head> {
        self.heads.get(id.0)
    }

    /// The head containing `point`, else the first one
    pub(crate) fn head_at(&self, point: Point) -> HeadId {
        self.heads
            .iter()
            .find(|h| h.rect.is_inside(point))
            .map_or(HeadId(0), |h| h.id)
    }

    /// Workspace shown on a head
    pub(crate) fn active_on(&self, head: HeadId) -> Option<WorkspaceId> {
        self.head(head).map(|h| h.active)
    }

    /// Workspaces that are shown right now
    pub(crate) fn visible(&self) -> HashSet<WorkspaceId> {
        self.heads.iter().map(|h| h.active).collect()
    }

    /// The surviving head a workspace follows when its old head goes away.
    ///
    /// Greatest overlap with the old rectangle wins; ties go to the head
    /// with the old id, then to the lowest id. Without any overlap the
    /// first head is used
    fn successor(heads: &[Head], old: &Head) -> HeadId {
        heads
            .iter()
            .map(|h| (h.rect.overlap(old.rect), h.id == old.id, h.id))
            .filter(|&(overlap, ..)| overlap > 0)
            .max_by(|a, b| {
                a.0.cmp(&b.0)
                    .then(a.1.cmp(&b.1))
                    .then(b.2.cmp(&a.2))
            })
            .map_or(HeadId(0), |(.., id)| id)
    }

    /// Replace every head with `topology`, keeping workspaces on the
    /// closest surviving head.
    ///
    /// Returns what has to be hidden, moved and shown. An empty topology is
    /// ignored
    pub(crate) fn rebuild_heads(&mut self, topology: &[Rectangle]) -> VisibilityChange {
        let mut change = VisibilityChange::default();
        if topology.is_empty() {
            log::warn!("ignoring an empty head topology");
            return change;
        }

        let old_heads = std::mem::take(&mut self.heads);
        let was_visible = old_heads.iter().map(|h| h.active).collect::<HashSet<_>>();

        // Placeholder activity; every head is given its workspace below
        self.heads = topology
            .iter()
            .enumerate()
            .map(|(i, &rect)| Head::new(HeadId(i), rect, WorkspaceId(usize::MAX)))
            .collect();

        for ws in &mut self.workspaces {
            let old = match ws.head.and_then(|h| old_heads.get(h.0)) {
                Some(old) => old,
                None => {
                    ws.head = Some(HeadId(0));
                    continue;
                },
            };

            let new = Self::successor(&self.heads, old);
            let rect = self.heads[new.0].rect;
            if rect != old.rect {
                change.relocated.push((ws.id, old.rect, rect));
            }
            ws.head = Some(new);
        }

        let mut taken = HashSet::new();
        for idx in 0..self.heads.len() {
            let head = HeadId(idx);
            let previous = old_heads.get(idx).map(|h| h.active);

            let on_head = self
                .workspaces
                .iter()
                .filter(|ws| ws.head == Some(head) && !taken.contains(&ws.id))
                .map(|ws| ws.id)
                .collect::<Vec<_>>();

            let active = on_head
                .iter()
                .copied()
                .filter(|id| was_visible.contains(id))
                .find(|&id| Some(id) == previous)
                .or_else(|| {
                    on_head
                        .iter()
                        .copied()
                        .find(|id| was_visible.contains(id))
                })
                .or_else(|| on_head.first().copied());

            let active = match active {
                Some(id) => id,
                None => {
                    // Borrow a hidden workspace from another head, or make one
                    let spare = self
                        .workspaces
                        .iter()
                        .map(|ws| ws.id)
                        .find(|id| !taken.contains(id) && !was_visible.contains(id));
                    let id = match spare {
                        Some(id) => id,
                        None => self.add_workspace(),
                    };

                    // Members still sit where they were before the rebuild
                    let from = change
                        .relocated
                        .iter()
                        .position(|(ws, ..)| *ws == id)
                        .map(|i| change.relocated.remove(i).1)
                        .or_else(|| self.workspace_rect(id));
                    let to = self.heads[idx].rect;
                    if let Some(from) = from.filter(|&from| from != to) {
                        change.relocated.push((id, from, to));
                    }
                    self.workspaces[id.0].head = Some(head);
                    id
                },
            };

            taken.insert(active);
            self.heads[idx].active = active;
        }

        let visible = self.visible();
        change.unmap = self
            .workspaces
            .iter()
            .map(|ws| ws.id)
            .filter(|id| was_visible.contains(id) && !visible.contains(id))
            .collect();
        change.map = self
            .workspaces
            .iter()
            .map(|ws| ws.id)
            .filter(|id| !was_visible.contains(id) && visible.contains(id))
            .collect();

        log::debug!(
            "rebuilt {} heads: {} hidden, {} shown, {} moved",
            self.heads.len(),
            change.unmap.len(),
            change.map.len(),
            change.relocated.len()
        );

        change
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        core::{ClientId, HeadId, WorkspaceId},
        geometry::{Point, Rectangle},
        monitor::workspace::Layout,
    };
    use pretty_assertions::assert_eq;

    const A: Rectangle = Rectangle::new(0, 0, 1920, 1080);
    const B: Rectangle = Rectangle::new(1920, 0, 1280, 1024);

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| i.to_string()).collect()
    }

    #[test]
    fn removed_head_hands_its_workspace_over() {
        let mut layout = Layout::new(&names(2), &[A, B]);
        let c = ClientId {
            index:      3,
            generation: 1,
        };
        layout.move_client(c, None, Some(WorkspaceId(1))).unwrap();

        let change = layout.rebuild_heads(&[A]);

        assert_eq!(layout.heads().len(), 1);
        assert_eq!(layout.heads()[0].active, WorkspaceId(0));
        assert_eq!(layout.workspaces()[1].head(), Some(HeadId(0)));
        assert!(layout.workspaces()[1].members().contains(&c));
        assert_eq!(change.unmap, vec![WorkspaceId(1)]);
        assert!(change.map.is_empty());
        assert_eq!(change.relocated, vec![(WorkspaceId(1), B, A)]);
    }

    #[test]
    fn added_head_shows_a_hidden_workspace() {
        let mut layout = Layout::new(&names(3), &[A]);
        let change = layout.rebuild_heads(&[A, B]);

        assert_eq!(layout.heads()[0].active, WorkspaceId(0));
        assert_eq!(layout.heads()[1].active, WorkspaceId(1));
        assert_eq!(change.map, vec![WorkspaceId(1)]);
        assert!(change.unmap.is_empty());
    }

    #[test]
    fn added_head_without_spare_workspace_creates_one() {
        let mut layout = Layout::new(&names(1), &[A]);
        layout.rebuild_heads(&[A, B]);

        assert_eq!(layout.workspaces().len(), 2);
        assert_eq!(layout.heads()[1].active, WorkspaceId(1));
    }

    #[test]
    fn equal_overlap_prefers_the_same_head_id() {
        let left = Rectangle::new(0, 0, 100, 100);
        let right = Rectangle::new(100, 0, 100, 100);
        let mut layout = Layout::new(&names(2), &[left, right]);

        // Both heads grow to cover the old ones equally
        let wide = Rectangle::new(0, 0, 200, 100);
        layout.rebuild_heads(&[wide, wide]);

        assert_eq!(layout.heads()[0].active, WorkspaceId(0));
        assert_eq!(layout.heads()[1].active, WorkspaceId(1));
    }

    #[test]
    fn head_under_the_pointer() {
        let layout = Layout::new(&names(2), &[A, B]);
        assert_eq!(layout.head_at(Point::new(2000, 10)), HeadId(1));
        assert_eq!(layout.head_at(Point::new(-5, -5)), HeadId(0));
    }
}
