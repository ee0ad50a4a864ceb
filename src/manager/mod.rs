//! The window manager: owns the model and answers every event

pub(crate) mod action;
pub(crate) mod binding;
pub(crate) mod command;
pub(crate) mod configure;
pub(crate) mod worker;

use crate::{
    config::Config,
    core::{
        decoration::{DefaultTheme, Theme},
        HeadId,
        Window,
        WorkspaceId,
    },
    error::WmResult,
    geometry::Rectangle,
    monitor::{
        invariants,
        registry::{Gone, MapOutcome, Registry},
        workspace::Layout,
        Env,
    },
    prompt::{CommandPrompt, Prompt},
    x::{
        event::{EventKind, XEvent},
        input::BindContext,
        property::Ewmh,
        session::DisplaySession,
    },
};
use binding::Bindings;
use std::{collections::HashMap, path::PathBuf, sync::Arc};
use strum::IntoEnumIterator;
use worker::Worker;

/// Handles one kind of event
type Handler<S> = fn(&mut WindowManager<S>, XEvent) -> WmResult<()>;

/// The running manager. Everything it knows lives here
pub(crate) struct WindowManager<S: DisplaySession> {
    pub(crate) session:  S,
    pub(crate) config:   Config,
    /// File the configuration was read from; `None` is the default file
    config_path:         Option<PathBuf>,
    pub(crate) theme:    Box<dyn Theme>,
    pub(crate) registry: Registry,
    pub(crate) layout:   Layout,
    pub(crate) bindings: Bindings,
    /// Built once; one handler per [`EventKind`]
    handlers:            HashMap<EventKind, Handler<S>>,
    /// Menu of the `switcher` action
    pub(crate) prompt:   Option<Arc<dyn Prompt>>,
    pub(crate) worker:   Worker,
    /// Cleared by the `quit` action
    pub(crate) running:  bool,
}

impl<S: DisplaySession> WindowManager<S> {
    /// Build the manager around an established session.
    ///
    /// Fails when the theme or the bindings of `config` are unusable
    pub(crate) fn new(session: S, config: Config, config_path: Option<PathBuf>) -> WmResult<Self> {
        let theme = DefaultTheme::new(&config.theme)?;
        let bindings = Bindings::build(&session, &config.bindings)?;
        let heads = Self::query_heads(&session)?;
        log::debug!("heads: {:?}", heads);

        let layout = Layout::new(&config.global.workspaces, &heads);
        let worker = Worker::new(session.waker()?);
        let prompt = CommandPrompt::from_config(&config).map(|p| Arc::new(p) as Arc<dyn Prompt>);

        Ok(Self {
            session,
            config,
            config_path,
            theme: Box::new(theme),
            registry: Registry::new(),
            layout,
            bindings,
            handlers: Self::dispatch_table(),
            prompt,
            worker,
            running: false,
        })
    }

    fn dispatch_table() -> HashMap<EventKind, Handler<S>> {
        EventKind::iter()
            .map(|kind| {
                let handler: Handler<S> = match kind {
                    EventKind::MapRequest => Self::on_map_request,
                    EventKind::UnmapNotify | EventKind::DestroyNotify => Self::on_gone,
                    EventKind::ConfigureNotify => Self::on_configure_notify,
                    EventKind::ConfigureRequest => Self::on_configure_request,
                    EventKind::KeyPress => Self::on_key_press,
                    EventKind::ButtonPress => Self::on_button_press,
                    EventKind::ClientMessage => Self::on_client_message,
                    EventKind::ScreenChange => Self::on_screen_change,
                    EventKind::Wakeup => Self::on_wakeup,
                    EventKind::Unknown => Self::on_ignored,
                };
                (kind, handler)
            })
            .collect()
    }

    /// Output rectangles, or the root window when there are none
    fn query_heads(session: &S) -> WmResult<Vec<Rectangle>> {
        let heads = session.query_heads()?;
        if heads.is_empty() {
            return Ok(vec![session.get_geometry(session.root())?]);
        }
        Ok(heads)
    }

    /// Grab the bindings, publish the workspaces and adopt the windows
    /// that were mapped before the manager started
    pub(crate) fn init(&mut self) -> WmResult<()> {
        self.bindings.grab_root(&self.session)?;
        self.publish_desktops()?;

        for window in self.session.existing_windows()? {
            if let Err(e) = self.manage(window, false) {
                if e.is_fatal() {
                    return Err(e);
                }
                log::warn!("failed to adopt Window({:#0x}): {}", window, e);
            }
        }

        if let Some(id) = self.registry.next_focusable(&self.layout) {
            self.try_focus(id)?;
        }
        self.session.flush()
    }

    /// Handle events until `quit` or until the connection fails.
    ///
    /// Only fatal errors end the loop; everything else is logged
    pub(crate) fn run(&mut self) -> WmResult<()> {
        self.running = true;
        log::info!("entering the event loop");

        while self.running {
            let event = self.session.next_event()?;
            self.handle_event(event)?;
        }

        log::info!("leaving the event loop");
        Ok(())
    }

    /// Dispatch one event to its handler
    pub(crate) fn handle_event(&mut self, event: XEvent) -> WmResult<()> {
        let kind = event.kind();
        log::trace!("{:?}", event);

        if let Some(handler) = self.handlers.get(&kind).copied() {
            if let Err(e) = handler(self, event) {
                if e.is_fatal() {
                    return Err(e);
                }
                log::warn!("{:?}: {}", kind, e);
            }
        }

        if cfg!(debug_assertions) {
            if let Err(e) = invariants::check(&self.registry, &self.layout) {
                log::error!("inconsistent state after {:?}: {}", kind, e);
            }
        }

        self.session.flush()
    }

    // ============================= Handlers =========================

    /// Manage a window, grabbing the buttons on it and its frame
    fn manage(&mut self, window: Window, focus: bool) -> WmResult<()> {
        let env = Env::new(&self.session, &*self.theme, &self.config);
        let id = match self.registry.on_map_request(&env, &mut self.layout, window)? {
            MapOutcome::Managed(id) => id,
            MapOutcome::Remapped(_) | MapOutcome::Unmanaged => return Ok(()),
        };

        self.bindings
            .grab_window(&self.session, window, BindContext::Client)?;
        if let Some(frame) = self.registry.get(id).and_then(|c| c.frame()) {
            self.bindings
                .grab_window(&self.session, frame.id(), BindContext::Frame)?;
        }

        if focus {
            self.try_focus(id)?;
        }
        Ok(())
    }

    fn on_map_request(&mut self, event: XEvent) -> WmResult<()> {
        match event {
            XEvent::MapRequest(window) => self.manage(window, true),
            _ => Ok(()),
        }
    }

    fn on_gone(&mut self, event: XEvent) -> WmResult<()> {
        let (window, gone) = match event {
            XEvent::UnmapNotify { window, synthetic } => (window, Gone::Unmapped { synthetic }),
            XEvent::DestroyNotify(window) => (window, Gone::Destroyed),
            _ => return Ok(()),
        };

        let env = Env::new(&self.session, &*self.theme, &self.config);
        self.registry
            .on_unmap_or_destroy(&env, &mut self.layout, window, gone)
            .map(|_| ())
    }

    fn on_configure_notify(&mut self, event: XEvent) -> WmResult<()> {
        match event {
            XEvent::ConfigureNotify(e) if e.is_root => self.on_screen_change(XEvent::ScreenChange),
            XEvent::ConfigureNotify(e) => {
                self.registry.on_configure_notify(e.id, e.geom);
                Ok(())
            },
            _ => Ok(()),
        }
    }

    /// Read the outputs again and move workspaces off removed heads
    fn on_screen_change(&mut self, _: XEvent) -> WmResult<()> {
        let heads = Self::query_heads(&self.session)?;
        let change = self.layout.rebuild_heads(&heads);
        if change.is_empty() {
            return Ok(());
        }
        log::info!("head layout changed: {:?}", heads);

        let env = Env::new(&self.session, &*self.theme, &self.config);
        self.registry.apply_visibility(&env, &self.layout, &change)?;
        if self.registry.focused().is_none() {
            self.registry.focus_fallback(&env, &self.layout)?;
        }

        self.publish_desktops()
    }

    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    fn on_ignored(&mut self, _: XEvent) -> WmResult<()> {
        Ok(())
    }

    // ============================= Queries ==========================

    /// Head of the focused client, else the head under the pointer
    pub(crate) fn current_head(&self) -> WmResult<HeadId> {
        let focused = self
            .registry
            .focused()
            .and_then(|id| self.registry.get(id))
            .and_then(|c| c.workspace())
            .filter(|&ws| self.layout.is_visible(ws))
            .and_then(|ws| self.layout.workspace(ws))
            .and_then(|ws| ws.head());

        match focused {
            Some(head) => Ok(head),
            None => Ok(self.layout.head_at(self.session.pointer_position()?)),
        }
    }

    /// Workspace shown on [`Self::current_head`]
    pub(crate) fn current_workspace(&self) -> WorkspaceId {
        let head = self.current_head().unwrap_or_else(|e| {
            log::debug!("no current head: {}", e);
            HeadId(0)
        });
        self.layout.active_on(head).unwrap_or(WorkspaceId(0))
    }

    /// Advertise the workspace names and the current one
    pub(crate) fn publish_desktops(&self) -> WmResult<()> {
        let names = self
            .layout
            .workspaces()
            .iter()
            .map(|ws| ws.name.clone())
            .collect();
        self.session.update_property(&Ewmh::Desktops(names))?;
        self.session
            .update_property(&Ewmh::CurrentDesktop(self.current_workspace().0 as u32))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{binding::Phase, WindowManager};
    use crate::{
        config::{BindingConfig, Config},
        core::{HeadId, Window, WorkspaceId},
        geometry::{Point, Rectangle},
        manager::command::CommandMessage,
        monitor::invariants,
        x::{
            event::{ClientMessage, InputEvent, MessageKind, XEvent},
            input::{BindContext, ModMask},
            keysym,
            mock::{MockSession, Request, ROOT},
            property::Ewmh,
        },
    };
    use pretty_assertions::assert_eq;

    const A: Rectangle = Rectangle::new(0, 0, 1920, 1080);
    const B: Rectangle = Rectangle::new(1920, 0, 1280, 1024);

    pub(crate) fn manager_with(session: MockSession, config: Config) -> WindowManager<MockSession> {
        let mut wm = WindowManager::new(session, config, None).unwrap();
        wm.init().unwrap();
        wm.running = true;
        wm
    }

    pub(crate) fn manager() -> WindowManager<MockSession> {
        manager_with(MockSession::new(), Config::default())
    }

    /// Create a window and let it ask to be mapped
    pub(crate) fn press_map(wm: &mut WindowManager<MockSession>, window: Window, rect: Rectangle) {
        wm.session.add_window(window, rect);
        wm.handle_event(XEvent::MapRequest(window)).unwrap();
    }

    /// Send a command line through the client message channel
    pub(crate) fn command(wm: &mut WindowManager<MockSession>, target: Window, line: &str) {
        let data = CommandMessage::parse(target, line)
            .unwrap()
            .encode(&wm.session)
            .unwrap();
        wm.handle_event(command_event(target, data)).unwrap();
    }

    fn command_event(window: Window, data: [u32; 5]) -> XEvent {
        XEvent::ClientMessage(ClientMessage {
            window,
            kind: MessageKind::Command(data),
        })
    }

    fn key(state: u16, detail: u8) -> XEvent {
        XEvent::KeyPress(InputEvent {
            window: ROOT,
            child: None,
            root: Point::new(0, 0),
            state,
            detail,
            time: 0,
        })
    }

    fn close_bound() -> (MockSession, Config) {
        let session = MockSession::new();
        session.map_key(keysym::from_name("q").unwrap(), 24);
        let config = Config {
            bindings: vec![BindingConfig {
                chord:   String::from("Mod4-q"),
                context: BindContext::Client,
                action:  String::from("close"),
            }],
            ..Config::default()
        };
        (session, config)
    }

    #[test]
    fn close_command_and_close_chord_agree() {
        let effects = |by_chord: bool| {
            let (session, config) = close_bound();
            let mut wm = manager_with(session, config);
            press_map(&mut wm, 0x20, Rectangle::new(10, 10, 300, 200));
            wm.session.clear_requests();

            if by_chord {
                wm.handle_event(key(u16::from(ModMask::Mod4), 24)).unwrap();
            } else {
                command(&mut wm, ROOT, "close");
            }

            wm.session
                .requests()
                .into_iter()
                .filter(|r| !matches!(r, Request::AllowEvents(..)))
                .collect::<Vec<_>>()
        };

        let by_chord = effects(true);
        assert_eq!(by_chord, vec![Request::Kill(0x20)]);
        assert_eq!(by_chord, effects(false));
    }

    #[test]
    fn unbound_key_is_replayed() {
        let (session, config) = close_bound();
        let mut wm = manager_with(session, config);
        press_map(&mut wm, 0x20, Rectangle::new(10, 10, 300, 200));
        wm.session.clear_requests();

        wm.handle_event(key(u16::from(ModMask::Shift), 24)).unwrap();
        assert_eq!(wm.session.requests(), vec![Request::AllowEvents(
            crate::x::session::Device::Keyboard,
            true
        )]);
    }

    #[test]
    fn chord_phase_follows_the_dispatch() {
        let (session, config) = close_bound();
        let mut wm = manager_with(session, config);
        press_map(&mut wm, 0x20, Rectangle::new(10, 10, 300, 200));
        assert_eq!(wm.bindings.phase(), Phase::Idle);

        wm.handle_event(key(u16::from(ModMask::Mod4), 24)).unwrap();
        assert_eq!(wm.bindings.phase(), Phase::ActionDispatched);

        wm.handle_event(key(u16::from(ModMask::Shift), 24)).unwrap();
        assert_eq!(wm.bindings.phase(), Phase::Idle);
    }

    #[test]
    fn startup_adopts_mapped_windows() {
        let session = MockSession::new();
        session.add_mapped_window(0x30, Rectangle::new(5, 5, 100, 100));
        let wm = manager_with(session, Config::default());

        assert_eq!(wm.registry.len(), 1);
        assert!(wm.registry.find(0x30).is_some());
        assert_eq!(
            wm.session.last_property(|p| matches!(p, Ewmh::Desktops(_))),
            Some(Ewmh::Desktops(vec![
                String::from("1"),
                String::from("2"),
                String::from("3"),
                String::from("4")
            ]))
        );
        assert_eq!(wm.registry.focused(), wm.registry.find(0x30));
    }

    #[test]
    fn quit_stops_the_loop() {
        let mut wm = manager();
        let quit = CommandMessage::parse(ROOT, "quit")
            .unwrap()
            .encode(&wm.session)
            .unwrap();
        wm.session.add_window(0x40, Rectangle::new(0, 0, 10, 10));
        wm.session.push_event(command_event(ROOT, quit));
        wm.session.push_event(XEvent::MapRequest(0x40));

        wm.run().unwrap();
        assert!(!wm.running);
        assert_eq!(wm.registry.find(0x40), None);
    }

    #[test]
    fn handler_errors_do_not_stop_the_loop() {
        let mut wm = manager();
        let bogus = CommandMessage::parse(ROOT, "self-destruct")
            .unwrap()
            .encode(&wm.session)
            .unwrap();
        wm.session.add_window(0x40, Rectangle::new(0, 0, 10, 10));
        wm.session.push_event(command_event(ROOT, bogus));
        wm.session.push_event(XEvent::MapRequest(0x40));

        // The queue runs dry, which the mock reports as a lost connection
        let err = wm.run().unwrap_err();
        assert!(err.is_fatal());
        assert!(wm.registry.find(0x40).is_some());
    }

    #[test]
    fn lost_connection_escalates() {
        let mut wm = manager();
        wm.session.disconnect();

        let err = wm.handle_event(XEvent::Unknown).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn removed_head_hands_over_its_workspace() {
        let session = MockSession::with_heads(vec![A, B]);
        session.set_pointer(Point::new(2000, 10));
        let mut wm = manager_with(session, Config::default());
        press_map(&mut wm, 0x50, Rectangle::new(2000, 100, 300, 200));

        let id = wm.registry.find(0x50).unwrap();
        assert_eq!(wm.registry.get(id).unwrap().workspace(), Some(WorkspaceId(1)));

        wm.session.set_heads(vec![A]);
        wm.handle_event(XEvent::ScreenChange).unwrap();

        let ws = wm.layout.workspace(WorkspaceId(1)).unwrap();
        assert_eq!(ws.head(), Some(HeadId(0)));
        assert!(ws.members().contains(&id));
        assert_eq!(invariants::check(&wm.registry, &wm.layout), Ok(()));
    }

    #[test]
    fn workspace_switch_never_maps_and_unmaps_together() {
        let mut wm = manager();
        press_map(&mut wm, 0x60, Rectangle::new(10, 10, 100, 100));
        command(&mut wm, ROOT, "send-to-workspace 2");
        press_map(&mut wm, 0x61, Rectangle::new(10, 10, 100, 100));
        wm.session.clear_requests();

        command(&mut wm, ROOT, "workspace 2");

        let requests = wm.session.requests();
        let unmap = requests
            .iter()
            .position(|r| *r == Request::Unmap(0x61))
            .unwrap();
        let map = requests
            .iter()
            .position(|r| *r == Request::Map(0x60))
            .unwrap();
        assert!(unmap < map);
        assert!(!requests.contains(&Request::Unmap(0x60)));
        assert_eq!(wm.current_workspace(), WorkspaceId(1));
        assert_eq!(
            wm.session.last_property(|p| matches!(p, Ewmh::CurrentDesktop(_))),
            Some(Ewmh::CurrentDesktop(1))
        );
    }

    #[test]
    fn root_resize_rebuilds_heads() {
        let session = MockSession::with_heads(vec![]);
        let mut wm = manager_with(session, Config::default());
        assert_eq!(wm.layout.heads().len(), 1);

        wm.session.set_heads(vec![A, B]);
        wm.handle_event(XEvent::ScreenChange).unwrap();
        assert_eq!(wm.layout.heads().len(), 2);
        assert!(wm.layout.is_visible(WorkspaceId(1)));
    }
}
