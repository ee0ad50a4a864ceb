//! The table of managed clients and their lifecycle

use crate::{
    core::{change::Toggle, ClientId, Window, WindowHandle, WorkspaceId},
    error::{Error, WmResult},
    geometry::{Extents, Rectangle},
    monitor::{
        client::{Client, ClientState, Transition},
        workspace::{Layout, VisibilityChange},
        Env,
    },
    rule::{self, StartState},
    x::{
        client_event_mask,
        event::WindowChanges,
        input::BindContext,
        property::{Ewmh, IcccmWindowState, Protocol},
        session::DisplaySession,
    },
};
use std::collections::HashMap;
use x11rb::protocol::xproto::StackMode;

/// Keep going when a request fails on a window that may already be gone
fn tolerate(result: WmResult<()>, what: &str) -> WmResult<()> {
    match result {
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            log::debug!("{}: {}", what, e);
            Ok(())
        },
        Ok(()) => Ok(()),
    }
}

/// Center `rect` inside `area` unless its origin already lies on it
fn fit_into(rect: Rectangle, area: Rectangle) -> Rectangle {
    if area.is_inside(rect.point) {
        return rect;
    }

    let width = rect.dimension.width.min(area.dimension.width);
    let height = rect.dimension.height.min(area.dimension.height);
    Rectangle::new(
        area.point.x + ((area.dimension.width - width) / 2) as i32,
        area.point.y + ((area.dimension.height - height) / 2) as i32,
        width,
        height,
    )
}

/// What [`Registry::on_map_request`] did with a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MapOutcome {
    /// The window is now managed
    Managed(ClientId),
    /// The window was already managed; nothing changed
    Remapped(ClientId),
    /// The window is mapped but not managed (frames, override-redirect,
    /// rules)
    Unmanaged,
}

/// Which notification removed a window from view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gone {
    Unmapped {
        /// Sent by the client itself to withdraw
        synthetic: bool,
    },
    Destroyed,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    client:     Option<Client>,
}

/// Generational arena of [`Client`]s.
///
/// The focus pointer and history hold [`ClientId`]s, so a removed client can
/// never be reached through them again
#[derive(Debug, Default)]
pub(crate) struct Registry {
    slots:     Vec<Slot>,
    free:      Vec<u32>,
    by_window: HashMap<Window, ClientId>,
    by_frame:  HashMap<Window, ClientId>,
    focus:     Option<ClientId>,
    /// Most recently focused last
    history:   Vec<ClientId>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // ============================= Lookup ===========================

    pub(crate) fn get(&self, id: ClientId) -> Option<&Client> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.client.as_ref())
    }

    fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.client.as_mut())
    }

    fn client(&self, id: ClientId) -> WmResult<&Client> {
        self.get(id).ok_or(Error::StaleClient(id))
    }

    fn client_mut(&mut self, id: ClientId) -> WmResult<&mut Client> {
        self.get_mut(id).ok_or(Error::StaleClient(id))
    }

    /// The client owning a window
    pub(crate) fn find(&self, window: Window) -> Option<ClientId> {
        self.by_window.get(&window).copied()
    }

    /// The client a decoration frame belongs to
    pub(crate) fn find_frame(&self, frame: Window) -> Option<ClientId> {
        self.by_frame.get(&frame).copied()
    }

    /// The focused client, if it still exists
    pub(crate) fn focused(&self) -> Option<ClientId> {
        self.focus.filter(|&id| self.get(id).is_some())
    }

    /// Every client, in arena order
    pub(crate) fn iter(&self) -> impl Iterator<Item = (ClientId, &Client)> + '_ {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.client.as_ref().map(|c| {
                (
                    ClientId {
                        index:      idx as u32,
                        generation: slot.generation,
                    },
                    c,
                )
            })
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.by_window.len()
    }

    fn insert(&mut self, client: Client) -> ClientId {
        let window = client.handle.id();
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.client = Some(client);
                ClientId {
                    index,
                    generation: slot.generation,
                }
            },
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    client:     Some(client),
                });
                ClientId {
                    index:      (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            },
        };

        self.by_window.insert(window, id);
        id
    }

    fn remove(&mut self, id: ClientId) -> Option<Client> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)?;
        let client = slot.client.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        self.by_window.remove(&client.handle.id());
        for frame in &client.decorations {
            self.by_frame.remove(&frame.id());
        }
        self.history.retain(|&h| h != id);
        if self.focus == Some(id) {
            self.focus = None;
        }

        Some(client)
    }

    // =========================== Lifecycle ==========================

    /// Start managing `window`, or leave a managed one as it is
    pub(crate) fn on_map_request<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        layout: &mut Layout,
        window: Window,
    ) -> WmResult<MapOutcome> {
        if self.by_frame.contains_key(&window) {
            return Ok(MapOutcome::Unmanaged);
        }

        let known = self.find(window);
        if let Some(id) = known {
            let state = self.client(id)?.state;
            if state != ClientState::Withdrawn {
                log::debug!("Window({:#0x}) asked to be mapped again", window);
                let next = state.transition(Transition::Map)?;
                self.client_mut(id)?.state = next;
                self.sync_visibility(env, layout, id)?;
                if next != state {
                    self.publish_state(env, id)?;
                }
                return Ok(MapOutcome::Remapped(id));
            }
        }

        let props = env.session.window_properties(window)?;
        if props.override_redirect {
            return Ok(MapOutcome::Unmanaged);
        }

        let effect = rule::apply(&env.config.rules, &props);
        if effect.state == Some(StartState::Withdrawn) {
            log::info!("leaving Window({:#0x}) unmanaged", window);
            env.session.map_window(window)?;
            return Ok(MapOutcome::Unmanaged);
        }

        let id = match known {
            Some(id) => {
                let fresh = Client::new(self.client(id)?.handle, &props);
                let client = self.client_mut(id)?;
                client.name = fresh.name;
                client.class = fresh.class;
                client.instance = fresh.instance;
                client.protocols = fresh.protocols;
                client.focusable = fresh.focusable;
                client.input = fresh.input;
                id
            },
            None => {
                let mut handle = WindowHandle::from(window);
                handle.geometry(env.session)?;
                handle.listen(env.session, client_event_mask())?;
                self.insert(Client::new(handle, &props))
            },
        };

        let iconic = match effect.state {
            Some(state) => state == StartState::Iconic,
            None => props.hints.initial_state == Some(IcccmWindowState::Iconic),
        };
        let workspace = Self::pick_workspace(env, layout, effect.workspace.as_deref())?;

        self.attach(env, layout, id, workspace, iconic)?;
        self.update_client_list(env)?;
        self.raise(env, id)?;

        Ok(MapOutcome::Managed(id))
    }

    /// Workspace for a new client: the rule's, the configured default, or
    /// the one shown under the pointer
    fn pick_workspace<S: DisplaySession>(
        env: &Env<'_, S>,
        layout: &Layout,
        ruled: Option<&str>,
    ) -> WmResult<WorkspaceId> {
        let named = ruled
            .or_else(|| env.config.global.default_workspace.as_deref())
            .and_then(|name| layout.find(name));
        if let Some(ws) = named {
            return Ok(ws);
        }

        let head = layout.head_at(env.session.pointer_position()?);
        Ok(layout.active_on(head).unwrap_or(WorkspaceId(0)))
    }

    /// Put a withdrawn client on `workspace`, decorate it and show it if
    /// the workspace is visible
    fn attach<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        layout: &mut Layout,
        id: ClientId,
        workspace: WorkspaceId,
        iconic: bool,
    ) -> WmResult<()> {
        let (state, from, rect, window) = {
            let c = self.client(id)?;
            (c.state, c.workspace, c.handle.cached_geometry(), c.handle.id())
        };

        let state = state.transition(if iconic {
            Transition::MapIconic
        } else {
            Transition::Map
        })?;
        layout.move_client(id, from, Some(workspace))?;
        {
            let c = self.client_mut(id)?;
            c.state = state;
            c.workspace = Some(workspace);
        }
        log::info!("managing Window({:#0x}) on {} as {}", window, workspace, state);

        self.decorate(env, id)?;
        match layout.workspace_rect(workspace) {
            Some(area) => self.apply_geometry(env, id, fit_into(rect, area))?,
            None => self.update_frame(env, id)?,
        }

        env.session
            .update_property(&Ewmh::WmDesktop(window, workspace.0 as u32))?;
        env.session
            .update_property(&Ewmh::IcccmState(window, state.icccm()))?;

        self.sync_visibility(env, layout, id)
    }

    /// Forget a client that unmapped itself or was destroyed.
    ///
    /// Unknown windows and unmaps the manager caused are ignored. Returns the
    /// affected client
    pub(crate) fn on_unmap_or_destroy<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        layout: &mut Layout,
        window: Window,
        gone: Gone,
    ) -> WmResult<Option<ClientId>> {
        let id = match self.find(window) {
            Some(id) => id,
            None => {
                log::trace!("ignoring {:?} of unknown Window({:#0x})", gone, window);
                return Ok(None);
            },
        };

        let withdrawn = self.client(id)?.state == ClientState::Withdrawn;
        match gone {
            Gone::Unmapped { synthetic } => {
                let client = self.client_mut(id)?;
                if !synthetic && client.pending_unmaps > 0 {
                    client.pending_unmaps -= 1;
                    return Ok(None);
                }
                if withdrawn {
                    return Ok(None);
                }
                self.withdraw(env, layout, id, true)?;
            },
            Gone::Destroyed => {
                let released = if withdrawn {
                    Ok(())
                } else {
                    self.withdraw(env, layout, id, false)
                };
                // The record goes even when releasing it failed
                self.remove(id);
                log::debug!("Window({:#0x}) destroyed", window);
                released?;
            },
        }

        Ok(Some(id))
    }

    /// Move a client to [`ClientState::Withdrawn`], releasing its workspace
    /// and decorations
    fn withdraw<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        layout: &mut Layout,
        id: ClientId,
        alive: bool,
    ) -> WmResult<()> {
        let (state, from, window) = {
            let c = self.client(id)?;
            (c.state, c.workspace, c.handle.id())
        };

        let state = state.transition(Transition::Withdraw)?;
        layout.move_client(id, from, None)?;
        {
            let c = self.client_mut(id)?;
            c.state = state;
            c.workspace = None;
            c.mapped = false;
            c.pending_unmaps = 0;
            c.stashed = None;
        }
        self.release_decorations(env, id)?;
        log::info!("Window({:#0x}) withdrawn", window);

        if alive {
            tolerate(
                env.session
                    .update_property(&Ewmh::IcccmState(window, IcccmWindowState::Withdrawn)),
                "setting WM_STATE",
            )?;
        }

        let had_focus = self.focus == Some(id);
        self.history.retain(|&h| h != id);
        if had_focus {
            self.focus = None;
            tolerate(self.focus_fallback(env, layout), "focusing the next client")?;
        }

        self.update_client_list(env)
    }

    /// Refresh the cached geometry of a client or frame
    pub(crate) fn on_configure_notify(&mut self, window: Window, rect: Rectangle) -> bool {
        if let Some(id) = self.find(window) {
            if let Some(c) = self.get_mut(id) {
                c.handle.refresh(rect);
                return true;
            }
        }

        if let Some(id) = self.find_frame(window) {
            if let Some(frame) = self
                .get_mut(id)
                .and_then(|c| c.decorations.iter_mut().find(|d| d.id() == window))
            {
                frame.refresh(rect);
                return true;
            }
        }

        false
    }

    // ========================== Decorations =========================

    fn decorate<S: DisplaySession>(&mut self, env: &Env<'_, S>, id: ClientId) -> WmResult<()> {
        let c = self.client(id)?;
        if !c.decorations.is_empty() {
            return Ok(());
        }

        let rect = c.handle.cached_geometry() + env.theme.decoration_geometry_for(&c.state);
        let frame = env
            .session
            .create_frame(rect, env.theme.frame_color(self.focus == Some(id)))?;
        env.session
            .set_cursor(frame, env.theme.cursor_for(BindContext::Frame))?;

        self.by_frame.insert(frame, id);
        self.client_mut(id)?
            .decorations
            .push(WindowHandle::new(frame, rect));

        Ok(())
    }

    fn release_decorations<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        id: ClientId,
    ) -> WmResult<()> {
        let frames = std::mem::take(&mut self.client_mut(id)?.decorations);
        for frame in frames {
            self.by_frame.remove(&frame.id());
            tolerate(env.session.destroy_window(frame.id()), "destroying a frame")?;
        }

        Ok(())
    }

    /// Fit the frame around the client, hiding it when the current state
    /// has no decorations
    fn update_frame<S: DisplaySession>(&mut self, env: &Env<'_, S>, id: ClientId) -> WmResult<()> {
        let c = self.client(id)?;
        let frame = match c.frame() {
            Some(frame) => frame,
            None => return Ok(()),
        };
        let extents = env.theme.decoration_geometry_for(&c.state);
        let (window, rect, mapped) = (c.handle.id(), c.handle.cached_geometry(), c.mapped);

        env.session.update_property(&Ewmh::FrameExtents(window, [
            extents.left,
            extents.right,
            extents.top,
            extents.bottom,
        ]))?;

        if extents == Extents::EMPTY || !mapped {
            return env.session.unmap_window(frame.id());
        }

        let outer = rect + extents;
        env.session
            .configure_window(frame.id(), &WindowChanges::from(outer))?;
        env.session.map_window(frame.id())?;
        // The client stays above its own frame
        env.session.configure_window(window, &WindowChanges {
            sibling: Some(frame.id()),
            stack_mode: Some(StackMode::ABOVE),
            ..WindowChanges::default()
        })?;

        if let Some(f) = self.client_mut(id)?.decorations.first_mut() {
            f.refresh(outer);
        }

        Ok(())
    }

    fn paint<S: DisplaySession>(&self, env: &Env<'_, S>, id: ClientId, focused: bool) -> WmResult<()> {
        match self.get(id).and_then(Client::frame) {
            Some(frame) => tolerate(
                env.session
                    .set_window_background(frame.id(), env.theme.frame_color(focused)),
                "painting a frame",
            ),
            None => Ok(()),
        }
    }

    /// Refit and repaint every frame after the theme changed
    pub(crate) fn redecorate<S: DisplaySession>(&mut self, env: &Env<'_, S>) -> WmResult<()> {
        let ids = self
            .iter()
            .filter(|(_, c)| c.state != ClientState::Withdrawn)
            .map(|(id, _)| id)
            .collect::<Vec<_>>();

        for id in ids {
            tolerate(self.update_frame(env, id), "refitting a frame")?;
            self.paint(env, id, self.focus == Some(id))?;
        }

        Ok(())
    }

    // ========================== Visibility ==========================

    /// Map or unmap a client so it is shown exactly when its state and its
    /// workspace allow it
    fn sync_visibility<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        layout: &Layout,
        id: ClientId,
    ) -> WmResult<()> {
        let c = self.client(id)?;
        let wanted = c.state.is_visible() && c.workspace.map_or(false, |ws| layout.is_visible(ws));
        let window = c.handle.id();

        match (wanted, c.mapped) {
            (true, false) => {
                env.session.map_window(window)?;
                self.client_mut(id)?.mapped = true;
                self.update_frame(env, id)
            },
            (false, true) => {
                env.session.unmap_window(window)?;
                {
                    let c = self.client_mut(id)?;
                    c.mapped = false;
                    c.pending_unmaps += 1;
                }
                self.update_frame(env, id)
            },
            _ => Ok(()),
        }
    }

    /// Put the client and its frame on top
    pub(crate) fn raise<S: DisplaySession>(&self, env: &Env<'_, S>, id: ClientId) -> WmResult<()> {
        let c = self.client(id)?;
        if let Some(frame) = c.frame() {
            env.session.raise_window(frame.id())?;
        }
        env.session.raise_window(c.handle.id())
    }

    /// Move and resize a client through the server, then its frame
    fn apply_geometry<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        id: ClientId,
        rect: Rectangle,
    ) -> WmResult<()> {
        let rect = Rectangle::new(
            rect.point.x,
            rect.point.y,
            rect.dimension.width.max(1),
            rect.dimension.height.max(1),
        );
        let window = self.client(id)?.handle.id();

        env.session.configure_window(window, &WindowChanges {
            border_width: Some(0),
            ..WindowChanges::from(rect)
        })?;
        self.client_mut(id)?.handle.refresh(rect);
        self.update_frame(env, id)
    }

    /// Carry a client from a head at `from` to a head at `to`
    fn relocate<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        id: ClientId,
        from: Rectangle,
        to: Rectangle,
    ) -> WmResult<()> {
        let c = self.client(id)?;
        let (state, target) = match c.state {
            ClientState::Fullscreen { restore } => (
                ClientState::Fullscreen {
                    restore: restore.translate(from.point, to.point),
                },
                to,
            ),
            ClientState::Maximized { restore } => {
                let state = ClientState::Maximized {
                    restore: restore.translate(from.point, to.point),
                };
                (state, to - env.theme.decoration_geometry_for(&state))
            },
            state => (
                state,
                c.handle.cached_geometry().translate(from.point, to.point),
            ),
        };

        self.client_mut(id)?.state = state;
        self.apply_geometry(env, id, target)
    }

    /// Carry out a change of the [`Layout`]: hide, relocate, then show
    pub(crate) fn apply_visibility<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        layout: &Layout,
        change: &VisibilityChange,
    ) -> WmResult<()> {
        let members = |ws: WorkspaceId| {
            layout
                .workspace(ws)
                .map(|w| w.members().iter().copied().collect::<Vec<_>>())
                .unwrap_or_default()
        };

        for &ws in &change.unmap {
            for id in members(ws) {
                tolerate(self.sync_visibility(env, layout, id), "hiding a client")?;
            }
        }
        for &(ws, from, to) in &change.relocated {
            for id in members(ws) {
                tolerate(self.relocate(env, id, from, to), "relocating a client")?;
            }
        }
        for &ws in &change.map {
            for id in members(ws) {
                tolerate(self.sync_visibility(env, layout, id), "showing a client")?;
            }
        }

        if let Some(id) = self.focused() {
            let visible = self
                .get(id)
                .and_then(Client::workspace)
                .map_or(false, |ws| layout.is_visible(ws));
            if !visible {
                self.lose_focus(env, id)?;
                self.focus_fallback(env, layout)?;
            }
        }

        Ok(())
    }

    // ============================= Focus ============================

    /// Give the input focus to a client
    pub(crate) fn focus<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        layout: &Layout,
        id: ClientId,
    ) -> WmResult<()> {
        let c = self.client(id)?;
        let window = c.handle.id();
        let shown = c.workspace.map_or(false, |ws| layout.is_visible(ws));
        if !c.can_focus() || !shown {
            return Err(Error::NotFocusable(window));
        }

        if c.input {
            env.session.set_input_focus(window)?;
        }
        if c.protocols.take_focus {
            env.session.send_protocol(window, Protocol::TakeFocus)?;
        }

        if let Some(old) = self.focused().filter(|&old| old != id) {
            self.paint(env, old, false)?;
        }
        self.paint(env, id, true)?;
        self.raise(env, id)?;

        self.focus = Some(id);
        self.history.retain(|&h| h != id);
        self.history.push(id);
        log::debug!("focused Window({:#0x})", window);

        env.session
            .update_property(&Ewmh::ActiveWindow(Some(window)))
    }

    /// Drop the focus pointer of a client that can no longer hold it
    fn lose_focus<S: DisplaySession>(&mut self, env: &Env<'_, S>, id: ClientId) -> WmResult<()> {
        if self.focus == Some(id) {
            self.focus = None;
            self.paint(env, id, false)?;
        }
        Ok(())
    }

    /// Return the input focus to the root window
    pub(crate) fn unfocus<S: DisplaySession>(&mut self, env: &Env<'_, S>) -> WmResult<()> {
        if let Some(id) = self.focused() {
            self.paint(env, id, false)?;
        }
        self.focus = None;
        env.session.unfocus()?;
        env.session.update_property(&Ewmh::ActiveWindow(None))
    }

    /// Focus the most recently focused client that can take it, or the root
    pub(crate) fn focus_fallback<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        layout: &Layout,
    ) -> WmResult<()> {
        let candidate = self.history.iter().rev().copied().find(|&id| {
            self.get(id).map_or(false, |c| {
                c.can_focus() && c.workspace.map_or(false, |ws| layout.is_visible(ws))
            })
        });

        match candidate {
            Some(id) => self.focus(env, layout, id),
            None => self.unfocus(env),
        }
    }

    /// The focusable, visible client after the focused one, wrapping around
    pub(crate) fn next_focusable(&self, layout: &Layout) -> Option<ClientId> {
        let candidates = self
            .iter()
            .filter(|(_, c)| c.can_focus() && c.workspace.map_or(false, |ws| layout.is_visible(ws)))
            .map(|(id, _)| id)
            .collect::<Vec<_>>();

        let next = self
            .focused()
            .and_then(|f| candidates.iter().position(|&id| id == f))
            .map_or(0, |pos| pos + 1);

        candidates
            .get(next)
            .or_else(|| candidates.first())
            .copied()
    }

    // ============================ Actions ===========================

    /// Minimize a client
    pub(crate) fn iconify<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        layout: &Layout,
        id: ClientId,
    ) -> WmResult<()> {
        let state = self.client(id)?.state;
        let next = state.transition(Transition::Iconify)?;
        if next == state {
            return Ok(());
        }

        self.client_mut(id)?.state = next;
        if let Some(restore) = state.restore() {
            self.apply_geometry(env, id, restore)?;
        }
        self.sync_visibility(env, layout, id)?;
        self.publish_state(env, id)?;

        if self.focus == Some(id) {
            self.lose_focus(env, id)?;
            self.focus_fallback(env, layout)?;
        }

        Ok(())
    }

    /// Show a minimized client again
    pub(crate) fn deiconify<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        layout: &Layout,
        id: ClientId,
    ) -> WmResult<()> {
        let state = self.client(id)?.state;
        let next = state.transition(Transition::Deiconify)?;
        if next == state {
            return Ok(());
        }

        self.client_mut(id)?.state = next;
        self.sync_visibility(env, layout, id)?;
        self.publish_state(env, id)
    }

    pub(crate) fn set_fullscreen<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        layout: &Layout,
        id: ClientId,
        toggle: Toggle,
    ) -> WmResult<()> {
        self.expand(env, layout, id, toggle, true)
    }

    pub(crate) fn set_maximized<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        layout: &Layout,
        id: ClientId,
        toggle: Toggle,
    ) -> WmResult<()> {
        self.expand(env, layout, id, toggle, false)
    }

    /// Enter or leave fullscreen (`fullscreen`) or maximized
    fn expand<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        layout: &Layout,
        id: ClientId,
        toggle: Toggle,
        fullscreen: bool,
    ) -> WmResult<()> {
        let c = self.client(id)?;
        let (state, rect, window) = (c.state, c.handle.cached_geometry(), c.handle.id());
        let current = if fullscreen {
            state.is_fullscreen()
        } else {
            state.is_maximized()
        };

        let wanted = toggle.eval(current);
        if wanted == current {
            return Ok(());
        }

        let (next, target) = if wanted {
            let area = c
                .workspace
                .and_then(|ws| layout.workspace_rect(ws))
                .ok_or(Error::NotManaged(window))?;
            if fullscreen {
                (state.transition(Transition::Fullscreen { current: rect })?, area)
            } else {
                let next = state.transition(Transition::Maximize { current: rect })?;
                (next, area - env.theme.decoration_geometry_for(&next))
            }
        } else {
            let next = state.transition(Transition::Restore)?;
            let restore = state.restore().unwrap_or(rect);
            let target = c.stashed.map_or(restore, |changes| changes.merge(restore));
            (next, target)
        };

        {
            let c = self.client_mut(id)?;
            c.state = next;
            if !wanted {
                c.stashed = None;
            }
        }
        log::debug!("Window({:#0x}) is now {}", window, next);

        self.apply_geometry(env, id, target)?;
        self.raise(env, id)?;
        self.publish_state(env, id)
    }

    /// Apply a configure request of a managed client.
    ///
    /// Fullscreen and maximized clients keep their geometry; the request is
    /// stashed until they leave that state. Returns the geometry in effect,
    /// which the caller reports back to the client
    pub(crate) fn move_resize<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        id: ClientId,
        changes: WindowChanges,
    ) -> WmResult<Rectangle> {
        let c = self.client(id)?;
        let (state, rect, window) = (c.state, c.handle.cached_geometry(), c.handle.id());

        match state {
            ClientState::Fullscreen { .. } | ClientState::Maximized { .. } => {
                if changes.touches_geometry() {
                    let c = self.client_mut(id)?;
                    c.stashed = Some(c.stashed.map_or(changes, |older| changes.over(older)));
                    log::debug!("stashed a configure of {} Window({:#0x})", state, window);
                }
                Ok(rect)
            },
            _ => {
                let target = changes.merge(rect);
                self.apply_geometry(env, id, target)?;
                Ok(self.client(id)?.handle.cached_geometry())
            },
        }
    }

    /// Move a client to another workspace, carrying it across heads
    pub(crate) fn send_to_workspace<S: DisplaySession>(
        &mut self,
        env: &Env<'_, S>,
        layout: &mut Layout,
        id: ClientId,
        workspace: WorkspaceId,
    ) -> WmResult<()> {
        let c = self.client(id)?;
        let (from, window) = (c.workspace, c.handle.id());
        let from = from.ok_or(Error::NotManaged(window))?;
        if from == workspace {
            return Ok(());
        }

        let old_area = layout.workspace_rect(from);
        layout.move_client(id, Some(from), Some(workspace))?;
        self.client_mut(id)?.workspace = Some(workspace);
        log::debug!("sending Window({:#0x}) to {}", window, workspace);

        if let (Some(a), Some(b)) = (old_area, layout.workspace_rect(workspace)) {
            if a != b {
                self.relocate(env, id, a, b)?;
            }
        }

        env.session
            .update_property(&Ewmh::WmDesktop(window, workspace.0 as u32))?;
        self.sync_visibility(env, layout, id)?;

        if self.focus == Some(id) && !layout.is_visible(workspace) {
            self.lose_focus(env, id)?;
            self.focus_fallback(env, layout)?;
        }

        Ok(())
    }

    /// Politely ask a client to close, or kill it when it cannot be asked
    pub(crate) fn close<S: DisplaySession>(&self, env: &Env<'_, S>, id: ClientId) -> WmResult<()> {
        let c = self.client(id)?;
        if c.protocols.delete_window {
            env.session
                .send_protocol(c.handle.id(), Protocol::DeleteWindow)
        } else {
            env.session.kill_client(c.handle.id())
        }
    }

    pub(crate) fn kill<S: DisplaySession>(&self, env: &Env<'_, S>, id: ClientId) -> WmResult<()> {
        env.session.kill_client(self.client(id)?.handle.id())
    }

    // ========================== Properties ==========================

    /// `_NET_WM_STATE` and `WM_STATE` of a client
    fn publish_state<S: DisplaySession>(&self, env: &Env<'_, S>, id: ClientId) -> WmResult<()> {
        let c = self.client(id)?;
        env.session.update_property(&Ewmh::WmState {
            window:     c.handle.id(),
            fullscreen: c.state.is_fullscreen(),
            maximized:  c.state.is_maximized(),
        })?;
        env.session
            .update_property(&Ewmh::IcccmState(c.handle.id(), c.state.icccm()))
    }

    /// `_NET_CLIENT_LIST`: every client on a workspace, in arena order
    pub(crate) fn update_client_list<S: DisplaySession>(&self, env: &Env<'_, S>) -> WmResult<()> {
        let windows = self
            .iter()
            .filter(|(_, c)| c.workspace.is_some())
            .map(|(_, c)| c.handle.id())
            .collect();
        env.session.update_property(&Ewmh::ClientList(windows))
    }
}

#[cfg(test)]
mod tests {
    use super::{Gone, MapOutcome, Registry};
    use crate::{
        config::Config,
        core::{change::Toggle, decoration::DefaultTheme, ClientId, HeadId, Window, WorkspaceId},
        error::Error,
        geometry::{Padding, Point, Rectangle},
        monitor::{client::ClientState, invariants, workspace::Layout, Env},
        x::{
            event::WindowChanges,
            mock::{MockSession, Request},
            property::{Ewmh, Protocols, WindowProperties},
        },
    };
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const R: Rectangle = Rectangle::new(100, 100, 400, 300);

    struct Fixture {
        session:  MockSession,
        theme:    DefaultTheme,
        config:   Config,
        layout:   Layout,
        registry: Registry,
    }

    impl Fixture {
        fn new() -> Self {
            let config = Config::default();
            let session = MockSession::new();
            let layout = Layout::new(&config.global.workspaces, &[Rectangle::new(0, 0, 1920, 1080)]);
            Self {
                session,
                theme: DefaultTheme::default(),
                config,
                layout,
                registry: Registry::new(),
            }
        }

        fn map(&mut self, window: Window) -> MapOutcome {
            if self.session.rect_of(window).is_none() {
                self.session.add_window(window, R);
            }
            let env = Env::new(&self.session, &self.theme, &self.config);
            self.registry
                .on_map_request(&env, &mut self.layout, window)
                .unwrap()
        }

        fn gone(&mut self, window: Window, gone: Gone) -> Option<ClientId> {
            let env = Env::new(&self.session, &self.theme, &self.config);
            self.registry
                .on_unmap_or_destroy(&env, &mut self.layout, window, gone)
                .unwrap()
        }

        fn focus(&mut self, id: ClientId) -> Result<(), Error> {
            let env = Env::new(&self.session, &self.theme, &self.config);
            self.registry.focus(&env, &self.layout, id)
        }

        fn managed(&mut self, window: Window) -> ClientId {
            match self.map(window) {
                MapOutcome::Managed(id) => id,
                other => panic!("{:?}", other),
            }
        }

        fn check(&self) {
            invariants::check(&self.registry, &self.layout).unwrap();
        }
    }

    #[test]
    fn new_window_is_decorated_and_mapped() {
        let mut f = Fixture::new();
        let id = f.managed(10);

        let client = f.registry.get(id).unwrap();
        assert_eq!(client.state(), ClientState::Normal);
        assert_eq!(client.workspace(), Some(WorkspaceId(0)));
        assert!(f.session.is_mapped(10));

        let frame = client.frame().unwrap();
        assert!(f.session.is_mapped(frame.id()));
        assert_eq!(f.session.rect_of(frame.id()), Some(R + Padding::uniform(1)));
        assert_eq!(f.registry.find_frame(frame.id()), Some(id));
        assert_eq!(
            f.session.last_property(|p| matches!(p, Ewmh::ClientList(_))),
            Some(Ewmh::ClientList(vec![10]))
        );
        f.check();
    }

    #[test]
    fn map_request_is_idempotent() {
        let mut f = Fixture::new();
        let id = f.managed(10);
        let before = f.registry.get(id).unwrap().clone();
        f.session.clear_requests();

        assert_eq!(f.map(10), MapOutcome::Remapped(id));

        let after = f.registry.get(id).unwrap();
        assert_eq!(after.state(), before.state());
        assert_eq!(after.workspace(), before.workspace());
        assert_eq!(after.decorations, before.decorations);
        assert!(f.session.requests().is_empty());
        f.check();
    }

    #[test]
    fn frames_and_override_redirect_windows_are_not_managed() {
        let mut f = Fixture::new();
        let id = f.managed(10);
        let frame = f.registry.get(id).unwrap().frame().unwrap().id();
        assert_eq!(f.map(frame), MapOutcome::Unmanaged);

        f.session.add_window_with(11, R, WindowProperties {
            override_redirect: true,
            ..WindowProperties::default()
        });
        assert_eq!(f.map(11), MapOutcome::Unmanaged);
        assert_eq!(f.registry.len(), 1);
    }

    #[test]
    fn unknown_unmap_and_destroy_are_no_ops() {
        let mut f = Fixture::new();
        f.managed(10);
        f.session.clear_requests();

        assert_eq!(f.gone(99, Gone::Unmapped { synthetic: false }), None);
        assert_eq!(f.gone(99, Gone::Destroyed), None);
        assert!(f.session.requests().is_empty());
        assert_eq!(f.registry.len(), 1);
        f.check();
    }

    #[test]
    fn unmap_withdraws_and_destroy_removes() {
        let mut f = Fixture::new();
        let id = f.managed(10);
        let frame = f.registry.get(id).unwrap().frame().unwrap().id();

        f.gone(10, Gone::Unmapped { synthetic: false });
        let client = f.registry.get(id).unwrap();
        assert_eq!(client.state(), ClientState::Withdrawn);
        assert_eq!(client.workspace(), None);
        assert!(client.decorations.is_empty());
        assert!(f.session.requests().contains(&Request::Destroy(frame)));
        assert!(f.layout.workspaces()[0].members().is_empty());
        f.check();

        // Mapping again attaches it once more
        assert_eq!(f.map(10), MapOutcome::Managed(id));
        f.check();

        f.gone(10, Gone::Destroyed);
        assert!(f.registry.get(id).is_none());
        assert!(f.registry.find(10).is_none());
        f.check();
    }

    #[test]
    fn own_unmaps_are_not_withdrawals() {
        let mut f = Fixture::new();
        let id = f.managed(10);

        let env = Env::new(&f.session, &f.theme, &f.config);
        f.registry.iconify(&env, &f.layout, id).unwrap();
        assert!(!f.session.is_mapped(10));

        // The notify for the unmap above
        f.gone(10, Gone::Unmapped { synthetic: false });
        assert_eq!(f.registry.get(id).unwrap().state(), ClientState::Iconic);

        // The client withdrawing itself
        f.gone(10, Gone::Unmapped { synthetic: true });
        assert_eq!(f.registry.get(id).unwrap().state(), ClientState::Withdrawn);
        f.check();
    }

    #[test]
    fn mapping_an_iconic_client_restores_it() {
        let mut f = Fixture::new();
        let id = f.managed(10);

        let env = Env::new(&f.session, &f.theme, &f.config);
        f.registry.iconify(&env, &f.layout, id).unwrap();
        f.gone(10, Gone::Unmapped { synthetic: false });

        assert_eq!(f.map(10), MapOutcome::Remapped(id));
        assert_eq!(f.registry.get(id).unwrap().state(), ClientState::Normal);
        assert!(f.session.is_mapped(10));
        assert_eq!(
            f.session.last_property(|p| matches!(p, Ewmh::IcccmState(10, _))),
            Some(Ewmh::IcccmState(10, ClientState::Normal.icccm()))
        );
        f.check();
    }

    #[test]
    fn destroy_forgets_the_client_when_the_fallback_fails() {
        let mut f = Fixture::new();
        let a = f.managed(10);
        let b = f.managed(11);
        f.focus(a).unwrap();
        f.focus(b).unwrap();

        // The next client in the history is already gone on the server
        f.session.remove_window(10);
        assert_eq!(f.gone(11, Gone::Destroyed), Some(b));

        assert_eq!(f.registry.find(11), None);
        assert_eq!(f.registry.get(b), None);
        assert_eq!(f.registry.len(), 1);
        f.check();
    }

    #[test]
    fn rules_and_hints_pick_the_start_state() {
        let mut f = Fixture::new();
        f.config.rules = serde_yaml::from_str(
            "- class: Skip\n  state: withdrawn\n- class: Mail\n  state: iconic\n  workspace: \"3\"\n",
        )
        .unwrap();

        let props = |class: &str| WindowProperties {
            class: class.to_owned(),
            ..WindowProperties::default()
        };
        f.session.add_window_with(10, R, props("Skip"));
        f.session.add_window_with(11, R, props("Mail"));

        assert_eq!(f.map(10), MapOutcome::Unmanaged);
        assert!(f.session.is_mapped(10));
        assert!(f.registry.find(10).is_none());

        let id = f.managed(11);
        let client = f.registry.get(id).unwrap();
        assert_eq!(client.state(), ClientState::Iconic);
        assert_eq!(client.workspace(), Some(WorkspaceId(2)));
        assert!(!f.session.is_mapped(11));
        f.check();
    }

    #[test]
    fn new_clients_follow_the_pointer() {
        let mut f = Fixture::new();
        let heads = [Rectangle::new(0, 0, 1920, 1080), Rectangle::new(1920, 0, 1920, 1080)];
        f.layout = Layout::new(&f.config.global.workspaces, &heads);
        f.session.set_pointer(Point::new(2500, 500));

        let id = f.managed(10);
        let client = f.registry.get(id).unwrap();
        assert_eq!(client.workspace(), Some(WorkspaceId(1)));
        // Placed onto the second head
        assert!(heads[1].is_inside(client.handle.cached_geometry().point));
    }

    #[test]
    fn focus_rejects_hidden_clients_and_keeps_the_old_one() {
        let mut f = Fixture::new();
        let a = f.managed(10);
        let b = f.managed(11);
        f.focus(a).unwrap();
        assert_eq!(f.registry.focused(), Some(a));

        let env = Env::new(&f.session, &f.theme, &f.config);
        f.registry.iconify(&env, &f.layout, b).unwrap();
        assert!(matches!(f.focus(b), Err(Error::NotFocusable(11))));
        assert_eq!(f.registry.focused(), Some(a));

        f.gone(11, Gone::Unmapped { synthetic: true });
        assert!(matches!(f.focus(b), Err(Error::NotFocusable(11))));
        assert_eq!(f.registry.focused(), Some(a));
    }

    #[test]
    fn focus_without_input_hint() {
        let mut f = Fixture::new();
        f.session.add_window_with(10, R, WindowProperties {
            protocols: Protocols {
                take_focus:    true,
                delete_window: false,
            },
            hints: crate::x::property::Hints {
                input: Some(false),
                ..Default::default()
            },
            ..WindowProperties::default()
        });
        let id = f.managed(10);
        f.session.clear_requests();
        f.focus(id).unwrap();

        let requests = f.session.requests();
        assert!(!requests.contains(&Request::Focus(10)));
        assert!(requests.contains(&Request::Protocol(
            10,
            crate::x::property::Protocol::TakeFocus
        )));
    }

    #[test]
    fn removing_the_focused_client_falls_back() {
        let mut f = Fixture::new();
        let a = f.managed(10);
        let b = f.managed(11);
        f.focus(a).unwrap();
        f.focus(b).unwrap();

        f.gone(11, Gone::Destroyed);
        assert_eq!(f.registry.focused(), Some(a));

        f.gone(10, Gone::Destroyed);
        assert_eq!(f.registry.focused(), None);
        assert!(f.session.requests().contains(&Request::Unfocus));
    }

    #[test]
    fn stale_ids_are_reported() {
        let mut f = Fixture::new();
        let a = f.managed(10);
        f.gone(10, Gone::Destroyed);
        let b = f.managed(11);

        // The slot is reused with a new generation
        assert_eq!(a.index, b.index);
        assert!(matches!(f.focus(a), Err(Error::StaleClient(_))));
    }

    #[test]
    fn fullscreen_stashes_configure_requests() {
        let mut f = Fixture::new();
        let id = f.managed(10);
        let env = Env::new(&f.session, &f.theme, &f.config);

        f.registry
            .set_fullscreen(&env, &f.layout, id, Toggle::On)
            .unwrap();
        assert_eq!(f.session.rect_of(10), Some(Rectangle::new(0, 0, 1920, 1080)));
        let frame = f.registry.get(id).unwrap().frame().unwrap().id();
        assert!(!f.session.is_mapped(frame));

        let changes = WindowChanges {
            width: Some(640),
            height: Some(480),
            ..WindowChanges::default()
        };
        let now = f.registry.move_resize(&env, id, changes).unwrap();
        assert_eq!(now, Rectangle::new(0, 0, 1920, 1080));
        assert_eq!(f.session.rect_of(10), Some(now));
        assert_eq!(f.registry.get(id).unwrap().stashed(), Some(changes));

        f.registry
            .set_fullscreen(&env, &f.layout, id, Toggle::Invert)
            .unwrap();
        assert_eq!(f.registry.get(id).unwrap().state(), ClientState::Normal);
        assert_eq!(f.session.rect_of(10), Some(Rectangle::new(100, 100, 640, 480)));
        assert!(f.session.is_mapped(frame));
    }

    #[test]
    fn maximize_leaves_room_for_the_border() {
        let mut f = Fixture::new();
        let id = f.managed(10);
        let env = Env::new(&f.session, &f.theme, &f.config);

        f.registry
            .set_maximized(&env, &f.layout, id, Toggle::On)
            .unwrap();
        assert_eq!(f.session.rect_of(10), Some(Rectangle::new(1, 1, 1918, 1078)));
        assert_eq!(
            f.session.last_property(|p| matches!(p, Ewmh::WmState { .. })),
            Some(Ewmh::WmState {
                window:     10,
                fullscreen: false,
                maximized:  true,
            })
        );

        f.registry
            .set_maximized(&env, &f.layout, id, Toggle::Off)
            .unwrap();
        assert_eq!(f.session.rect_of(10), Some(R));
    }

    #[test]
    fn switching_workspaces_hides_before_showing() {
        let mut f = Fixture::new();
        let a = f.managed(10);
        let b = f.managed(11);
        {
            let env = Env::new(&f.session, &f.theme, &f.config);
            f.registry
                .send_to_workspace(&env, &mut f.layout, b, WorkspaceId(1))
                .unwrap();
        }
        assert!(!f.session.is_mapped(11));
        f.session.clear_requests();

        let change = f
            .layout
            .switch_active_workspace(HeadId(0), WorkspaceId(1))
            .unwrap();
        let env = Env::new(&f.session, &f.theme, &f.config);
        f.registry.apply_visibility(&env, &f.layout, &change).unwrap();

        assert!(!f.session.is_mapped(10));
        assert!(f.session.is_mapped(11));

        let requests = f.session.requests();
        let unmap = requests.iter().position(|r| *r == Request::Unmap(10));
        let map = requests.iter().position(|r| *r == Request::Map(11));
        assert!(unmap < map);

        assert_eq!(f.registry.get(a).unwrap().workspace(), Some(WorkspaceId(0)));
        f.check();
    }

    #[test]
    fn close_prefers_delete_window() {
        let mut f = Fixture::new();
        f.session.add_window_with(10, R, WindowProperties {
            protocols: Protocols {
                take_focus:    false,
                delete_window: true,
            },
            ..WindowProperties::default()
        });
        let polite = f.managed(10);
        let rude = f.managed(11);

        let env = Env::new(&f.session, &f.theme, &f.config);
        f.registry.close(&env, polite).unwrap();
        f.registry.close(&env, rude).unwrap();

        let requests = f.session.requests();
        assert!(requests.contains(&Request::Protocol(
            10,
            crate::x::property::Protocol::DeleteWindow
        )));
        assert!(requests.contains(&Request::Kill(11)));
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Map(u32),
        Unmap(u32),
        Withdraw(u32),
        Destroy(u32),
        Send(u32, usize),
        Switch(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        let window = 10_u32..16;
        prop_oneof![
            window.clone().prop_map(Op::Map),
            window.clone().prop_map(Op::Unmap),
            window.clone().prop_map(Op::Withdraw),
            window.clone().prop_map(Op::Destroy),
            (window, 0_usize..4).prop_map(|(w, ws)| Op::Send(w, ws)),
            (0_usize..4).prop_map(Op::Switch),
        ]
    }

    proptest! {
        #[test]
        fn membership_stays_consistent(ops in prop::collection::vec(op(), 1..60)) {
            let mut f = Fixture::new();

            for op in ops {
                match op {
                    Op::Map(w) => {
                        f.map(w);
                    },
                    Op::Unmap(w) => {
                        f.gone(w, Gone::Unmapped { synthetic: false });
                    },
                    Op::Withdraw(w) => {
                        f.gone(w, Gone::Unmapped { synthetic: true });
                    },
                    Op::Destroy(w) => {
                        f.gone(w, Gone::Destroyed);
                        f.session.remove_window(w);
                    },
                    Op::Send(w, ws) => {
                        if let Some(id) = f.registry.find(w) {
                            let env = Env::new(&f.session, &f.theme, &f.config);
                            let _ = f.registry.send_to_workspace(&env, &mut f.layout, id, WorkspaceId(ws));
                        }
                    },
                    Op::Switch(ws) => {
                        let change = f.layout.switch_active_workspace(HeadId(0), WorkspaceId(ws)).unwrap();
                        let env = Env::new(&f.session, &f.theme, &f.config);
                        f.registry.apply_visibility(&env, &f.layout, &change).unwrap();
                    },
                }

                prop_assert_eq!(invariants::check(&f.registry, &f.layout), Ok(()));
            }
        }
    }
}
