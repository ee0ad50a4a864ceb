//! The connection to the X-Server

use crate::{
    core::{decoration::CursorRef, Atom, Keycode, Window, MISSING_VALUE, WM_CLASS_NAME, WM_NAME},
    error::{reply_error, Error, WmResult},
    geometry::{Point, Rectangle},
    x::{
        event::{
            ClientMessage,
            ConfigureEvent,
            ConfigureRequestData,
            InputEvent,
            MessageKind,
            NetWmState,
            WindowChanges,
            XEvent,
        },
        input::ModMask,
        property::{Ewmh, Hints, IcccmWindowState, Protocol, Protocols, WindowProperties},
        root_event_mask,
        session::{Device, DisplaySession, Waker},
    },
};
use nix::{
    errno::Errno,
    poll::{poll, PollFd, PollFlags},
};
use std::{
    cell::RefCell,
    collections::HashMap,
    io::{ErrorKind as IoErrorKind, Read},
    os::unix::{io::AsRawFd, net::UnixStream},
    process,
    str,
};
use x11rb::{
    atom_manager,
    connection::{Connection, RequestConnection},
    cookie::{Cookie, VoidCookie},
    cursor::Handle as CursorHandle,
    errors::{ConnectionError, ReplyError},
    properties::{WmClass, WmHints},
    protocol::{
        randr::{self, ConnectionExt as _},
        xproto::{
            self,
            Allow,
            AtomEnum,
            ButtonIndex,
            ChangeWindowAttributesAux,
            ClientMessageEvent,
            ConfigWindow,
            ConfigureWindowAux,
            ConnectionExt,
            CreateWindowAux,
            EventMask,
            GrabMode,
            InputFocus,
            MapState,
            ModMask as XModMask,
            PropMode,
            StackMode,
            WindowClass,
        },
        ErrorKind,
        Event,
    },
    resource_manager::Database,
    rust_connection::RustConnection,
    wrapper::ConnectionExt as _,
    x11_utils::TryParse,
    CURRENT_TIME,
    NONE,
};

// === Atoms === [[[

/// Atoms interned once at startup
atom_manager! {
    pub(crate) Atoms: AtomsCookie {
        UTF8_STRING,

        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        WM_TAKE_FOCUS,
        WM_STATE,
        WM_CHANGE_STATE,
        WM_NAME,
        WM_CLASS,

        _NET_SUPPORTED,
        _NET_SUPPORTING_WM_CHECK,
        _NET_WM_NAME,
        _NET_WM_PID,
        _NET_CLIENT_LIST,
        _NET_ACTIVE_WINDOW,
        _NET_CLOSE_WINDOW,
        _NET_NUMBER_OF_DESKTOPS,
        _NET_DESKTOP_NAMES,
        _NET_CURRENT_DESKTOP,
        _NET_WM_DESKTOP,
        _NET_WM_STATE,
        _NET_WM_STATE_FULLSCREEN,
        _NET_WM_STATE_MAXIMIZED_VERT,
        _NET_WM_STATE_MAXIMIZED_HORZ,
        _NET_FRAME_EXTENTS,

        _XWMD_COMMAND,
    }
}

// ]]] === Atoms ===

// === Checked requests === [[[

/// Wait for the server to accept a request
trait Checked {
    fn checked(self, request: &'static str) -> WmResult<()>;
}

impl<C: RequestConnection + ?Sized> Checked for Result<VoidCookie<'_, C>, ConnectionError> {
    fn checked(self, request: &'static str) -> WmResult<()> {
        log::trace!("request: {}", request);
        self?.check().map_err(|e| reply_error(request, e))
    }
}

/// Wait for the reply of a request
trait Replied<R> {
    fn replied(self, request: &'static str) -> WmResult<R>;
}

impl<C: RequestConnection + ?Sized, R: TryParse> Replied<R>
    for Result<Cookie<'_, C, R>, ConnectionError>
{
    fn replied(self, request: &'static str) -> WmResult<R> {
        log::trace!("request: {}", request);
        self?.reply().map_err(|e| reply_error(request, e))
    }
}

// ]]] === Checked requests ===

/// The main connection to the X-Server
pub(crate) struct XConnection {
    /// Connection to the X-Server
    conn:         RustConnection,
    /// Screen number the connection is attached to
    screen:       usize,
    /// Root window of `screen`
    root:         Window,
    /// The interned [`Atoms`]
    atoms:        Atoms,
    /// Window holding `_NET_SUPPORTING_WM_CHECK`; receives the focus when
    /// nothing else has it
    check_window: Window,
    /// Whether the randr extension is present
    randr:        bool,
    /// Cursors loaded so far
    cursors:      RefCell<HashMap<CursorRef, xproto::Cursor>>,
    /// Read end of the wake-up socket pair
    wake_rx:      UnixStream,
    /// Write end of the wake-up socket pair
    wake_tx:      UnixStream,
}

impl XConnection {
    /// Connect to the display named by `$DISPLAY`
    pub(crate) fn connect() -> WmResult<Self> {
        let (conn, screen) = x11rb::connect(None)?;
        log::debug!("connected to screen {}", screen);

        let root = conn.setup().roots[screen].root;

        log::debug!("interning Atoms");
        let atoms = Atoms::new(&conn)?
            .reply()
            .map_err(|e| reply_error("intern_atom", e))?;

        let randr = conn
            .extension_information(randr::X11_EXTENSION_NAME)?
            .is_some();
        if !randr {
            log::warn!("randr extension is missing; heads follow the root window");
        }

        let (wake_rx, wake_tx) =
            UnixStream::pair().map_err(|e| Error::protocol("socketpair", e))?;
        wake_rx
            .set_nonblocking(true)
            .map_err(|e| Error::protocol("socketpair", e))?;

        let check_window = conn.generate_id()?;

        Ok(Self {
            conn,
            screen,
            root,
            atoms,
            check_window,
            randr,
            cursors: RefCell::new(HashMap::new()),
            wake_rx,
            wake_tx,
        })
    }

    // ====================== Window Manager ====================== [[[

    /// Make an attempt to become the window manager
    pub(crate) fn become_wm(&self) -> WmResult<()> {
        log::debug!("attempting to become the window manager");

        let aux = ChangeWindowAttributesAux::new().event_mask(root_event_mask());
        match self.conn.change_window_attributes(self.root, &aux)?.check() {
            Ok(()) => Ok(()),
            Err(ReplyError::X11Error(e)) if e.error_kind == ErrorKind::Access =>
                Err(Error::AlreadyRunning),
            Err(e) => Err(reply_error("change_window_attributes", e)),
        }
    }

    /// Create the supporting window and advertise what the manager supports
    pub(crate) fn init(&self) -> WmResult<()> {
        log::debug!("creating the supporting window");
        self.conn
            .create_window(
                x11rb::COPY_DEPTH_FROM_PARENT,
                self.check_window,
                self.root,
                -1,
                -1,
                1,
                1,
                0,
                WindowClass::INPUT_ONLY,
                x11rb::COPY_FROM_PARENT,
                &CreateWindowAux::new().override_redirect(1),
            )
            .checked("create_window")?;
        self.conn.map_window(self.check_window).checked("map_window")?;

        for window in [self.root, self.check_window] {
            self.conn
                .change_property32(
                    PropMode::REPLACE,
                    window,
                    self.atoms._NET_SUPPORTING_WM_CHECK,
                    AtomEnum::WINDOW,
                    &[self.check_window],
                )
                .checked("change_property")?;
        }

        self.conn
            .change_property8(
                PropMode::REPLACE,
                self.check_window,
                self.atoms._NET_WM_NAME,
                self.atoms.UTF8_STRING,
                WM_NAME.as_bytes(),
            )
            .checked("change_property")?;

        // Instance and class, separated by a null
        let wm_class = format!("{}\0{}\0", WM_NAME, WM_CLASS_NAME);
        self.conn
            .change_property8(
                PropMode::REPLACE,
                self.check_window,
                self.atoms.WM_CLASS,
                AtomEnum::STRING,
                wm_class.as_bytes(),
            )
            .checked("change_property")?;

        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.check_window,
                self.atoms._NET_WM_PID,
                AtomEnum::CARDINAL,
                &[process::id()],
            )
            .checked("change_property")?;

        self.init_supported()?;

        if self.randr {
            self.conn
                .randr_select_input(self.root, randr::NotifyMask::SCREEN_CHANGE)
                .checked("randr_select_input")?;
        }

        self.set_cursor(self.root, "left_ptr")?;
        self.flush()
    }

    /// Initialize supported [`Atom`]s
    fn init_supported(&self) -> WmResult<()> {
        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.root,
                self.atoms._NET_SUPPORTED,
                AtomEnum::ATOM,
                &[
                    self.atoms._NET_SUPPORTED,
                    self.atoms._NET_SUPPORTING_WM_CHECK,
                    self.atoms._NET_WM_NAME,
                    self.atoms._NET_CLIENT_LIST,
                    self.atoms._NET_ACTIVE_WINDOW,
                    self.atoms._NET_CLOSE_WINDOW,
                    self.atoms._NET_NUMBER_OF_DESKTOPS,
                    self.atoms._NET_DESKTOP_NAMES,
                    self.atoms._NET_CURRENT_DESKTOP,
                    self.atoms._NET_WM_DESKTOP,
                    self.atoms._NET_WM_STATE,
                    self.atoms._NET_WM_STATE_FULLSCREEN,
                    self.atoms._NET_WM_STATE_MAXIMIZED_VERT,
                    self.atoms._NET_WM_STATE_MAXIMIZED_HORZ,
                    self.atoms._NET_FRAME_EXTENTS,
                ],
            )
            .checked("change_property")
    }

    /// Send a command message to the running manager
    pub(crate) fn send_command(&self, target: Window, data: [u32; 5]) -> WmResult<()> {
        let event = ClientMessageEvent::new(32, target, self.atoms._XWMD_COMMAND, data);
        log::debug!("sending a command for Window({:#0x}): {:?}", target, data);

        self.conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
                &event,
            )
            .checked("send_event")?;
        self.flush()
    }

    // ]]] === Window Manager ===

    // ======================== Translation ======================= [[[

    /// Turn an [`x11rb`] event into an [`XEvent`]
    fn translate(&self, event: Event) -> XEvent {
        match event {
            Event::MapRequest(e) => XEvent::MapRequest(e.window),
            Event::UnmapNotify(e) => XEvent::UnmapNotify {
                window:    e.window,
                synthetic: e.response_type & 0x80 != 0,
            },
            Event::DestroyNotify(e) => XEvent::DestroyNotify(e.window),
            Event::ConfigureNotify(e) => XEvent::ConfigureNotify(ConfigureEvent {
                id:      e.window,
                geom:    Rectangle::new(
                    e.x.into(),
                    e.y.into(),
                    e.width.into(),
                    e.height.into(),
                ),
                is_root: e.window == self.root,
            }),
            Event::ConfigureRequest(e) => {
                let mask = u16::from(e.value_mask);
                let has = |field: ConfigWindow| mask & u16::from(field) != 0;

                XEvent::ConfigureRequest(ConfigureRequestData {
                    id:      e.window,
                    changes: WindowChanges {
                        x:            has(ConfigWindow::X).then(|| e.x.into()),
                        y:            has(ConfigWindow::Y).then(|| e.y.into()),
                        width:        has(ConfigWindow::WIDTH).then(|| e.width.into()),
                        height:       has(ConfigWindow::HEIGHT).then(|| e.height.into()),
                        border_width: has(ConfigWindow::BORDER_WIDTH)
                            .then(|| e.border_width.into()),
                        sibling:      has(ConfigWindow::SIBLING).then(|| e.sibling),
                        stack_mode:   has(ConfigWindow::STACK_MODE).then(|| e.stack_mode),
                    },
                })
            },
            Event::KeyPress(e) => XEvent::KeyPress(InputEvent {
                window: e.event,
                child:  (e.child != NONE).then(|| e.child),
                root:   Point::new(e.root_x.into(), e.root_y.into()),
                state:  u16::from(e.state),
                detail: e.detail,
                time:   e.time,
            }),
            Event::ButtonPress(e) => XEvent::ButtonPress(InputEvent {
                window: e.event,
                child:  (e.child != NONE).then(|| e.child),
                root:   Point::new(e.root_x.into(), e.root_y.into()),
                state:  u16::from(e.state),
                detail: e.detail,
                time:   e.time,
            }),
            Event::ClientMessage(e) => XEvent::ClientMessage(ClientMessage {
                window: e.window,
                kind:   self.message_kind(&e),
            }),
            Event::RandrScreenChangeNotify(_) => XEvent::ScreenChange,
            Event::Error(e) => {
                log::warn!(
                    "X11 error {:?} from request {}",
                    e.error_kind,
                    e.major_opcode
                );
                XEvent::Unknown
            },
            _ => XEvent::Unknown,
        }
    }

    /// Sort a client message by its type
    fn message_kind(&self, e: &ClientMessageEvent) -> MessageKind {
        if e.format != 32 {
            return MessageKind::Other(e.type_);
        }

        let data = e.data.as_data32();
        let state = |atom: Atom| {
            if atom == self.atoms._NET_WM_STATE_FULLSCREEN {
                NetWmState::Fullscreen
            } else if atom == self.atoms._NET_WM_STATE_MAXIMIZED_VERT
                || atom == self.atoms._NET_WM_STATE_MAXIMIZED_HORZ
            {
                NetWmState::Maximized
            } else {
                NetWmState::Other
            }
        };

        match e.type_ {
            t if t == self.atoms._XWMD_COMMAND => MessageKind::Command(data),
            t if t == self.atoms._NET_ACTIVE_WINDOW => MessageKind::ActiveWindow,
            t if t == self.atoms._NET_CLOSE_WINDOW => MessageKind::CloseWindow,
            t if t == self.atoms._NET_CURRENT_DESKTOP => MessageKind::CurrentDesktop(data[0]),
            t if t == self.atoms._NET_WM_DESKTOP => MessageKind::WmDesktop(data[0]),
            t if t == self.atoms._NET_WM_STATE => MessageKind::WmState {
                action:     data[0],
                properties: [state(data[1]), state(data[2])],
            },
            t if t == self.atoms.WM_CHANGE_STATE => MessageKind::ChangeState(data[0]),
            t => MessageKind::Other(t),
        }
    }

    /// Empty the wake-up socket
    fn drain_wakeups(&self) {
        let mut buf = [0_u8; 64];
        loop {
            match (&self.wake_rx).read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == IoErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("failed to read the wake-up socket: {}", e);
                    break;
                },
            }
        }
    }

    // ]]] === Translation ===

    // ========================= Helpers ========================== [[[

    /// Read a text property, decoded as UTF-8
    fn text_property(&self, window: Window, property: Atom) -> WmResult<Option<String>> {
        let reply = self
            .conn
            .get_property(false, window, property, AtomEnum::ANY, 0, u32::MAX)
            .replied("get_property")?;

        Ok((!reply.value.is_empty())
            .then(|| String::from_utf8_lossy(&reply.value).into_owned()))
    }

    /// Read the `WM_PROTOCOLS` of a window
    fn protocols(&self, window: Window) -> WmResult<Protocols> {
        let reply = self
            .conn
            .get_property(
                false,
                window,
                self.atoms.WM_PROTOCOLS,
                AtomEnum::ATOM,
                0,
                u32::MAX,
            )
            .replied("get_property")?;

        let mut protocols = Protocols::default();
        for atom in reply.value32().into_iter().flatten() {
            if atom == self.atoms.WM_TAKE_FOCUS {
                protocols.take_focus = true;
            } else if atom == self.atoms.WM_DELETE_WINDOW {
                protocols.delete_window = true;
            }
        }

        Ok(protocols)
    }

    // ]]] === Helpers ===
}

impl DisplaySession for XConnection {
    fn root(&self) -> Window {
        self.root
    }

    fn next_event(&self) -> WmResult<XEvent> {
        loop {
            if let Some(event) = self.conn.poll_for_event()? {
                return Ok(self.translate(event));
            }

            self.conn.flush()?;

            let mut fds = [
                PollFd::new(self.conn.stream().as_raw_fd(), PollFlags::POLLIN),
                PollFd::new(self.wake_rx.as_raw_fd(), PollFlags::POLLIN),
            ];

            match poll(&mut fds, -1) {
                Ok(_) | Err(Errno::EINTR) => {},
                Err(e) => return Err(Error::Connection(e.to_string())),
            }

            if fds[1]
                .revents()
                .map_or(false, |r| r.contains(PollFlags::POLLIN))
            {
                self.drain_wakeups();
                return Ok(XEvent::Wakeup);
            }
        }
    }

    fn flush(&self) -> WmResult<()> {
        log::trace!("flushing requests to the X-Server");
        self.conn.flush().map_err(Error::from)
    }

    fn get_geometry(&self, window: Window) -> WmResult<Rectangle> {
        let query = |e: Error| match e {
            Error::Connection(_) => e,
            other => Error::Query(window, other.to_string()),
        };

        let geom = self
            .conn
            .get_geometry(window)
            .replied("get_geometry")
            .map_err(query)?;

        // Coordinates are relative to the parent
        let trans = self
            .conn
            .translate_coordinates(window, self.root, 0, 0)
            .replied("translate_coordinates")
            .map_err(query)?;

        Ok(Rectangle::new(
            trans.dst_x.into(),
            trans.dst_y.into(),
            geom.width.into(),
            geom.height.into(),
        ))
    }

    fn configure_window(&self, window: Window, changes: &WindowChanges) -> WmResult<()> {
        log::debug!("configuring Window({:#0x}): {:?}", window, changes);
        let aux = ConfigureWindowAux::new()
            .x(changes.x)
            .y(changes.y)
            .width(changes.width)
            .height(changes.height)
            .border_width(changes.border_width)
            .sibling(changes.sibling)
            .stack_mode(changes.stack_mode);

        self.conn
            .configure_window(window, &aux)
            .checked("configure_window")
    }

    fn raise_window(&self, window: Window) -> WmResult<()> {
        log::debug!("raising Window({:#0x})", window);
        self.conn
            .configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))
            .checked("configure_window")
    }

    fn send_configure_notify(&self, window: Window, rect: Rectangle) -> WmResult<()> {
        log::debug!("sending synthetic configure to Window({:#0x}): {}", window, rect);
        let event = xproto::ConfigureNotifyEvent {
            response_type: xproto::CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: NONE,
            x: rect.point.x as i16,
            y: rect.point.y as i16,
            width: rect.dimension.width as u16,
            height: rect.dimension.height as u16,
            border_width: 0,
            override_redirect: false,
        };

        self.conn
            .send_event(false, window, EventMask::STRUCTURE_NOTIFY, &event)
            .checked("send_event")
    }

    fn map_window(&self, window: Window) -> WmResult<()> {
        log::debug!("mapping Window({:#0x})", window);
        self.conn.map_window(window).checked("map_window")
    }

    fn unmap_window(&self, window: Window) -> WmResult<()> {
        log::debug!("unmapping Window({:#0x})", window);
        self.conn.unmap_window(window).checked("unmap_window")
    }

    fn destroy_window(&self, window: Window) -> WmResult<()> {
        log::debug!("destroying Window({:#0x})", window);
        self.conn.destroy_window(window).checked("destroy_window")
    }

    fn create_frame(&self, rect: Rectangle, color: u32) -> WmResult<Window> {
        log::debug!("creating a frame: Rectangle({})", rect);
        let wid = self.conn.generate_id()?;
        let aux = CreateWindowAux::new()
            .override_redirect(1)
            .background_pixel(color)
            .event_mask(EventMask::EXPOSURE);

        self.conn
            .create_window(
                x11rb::COPY_DEPTH_FROM_PARENT,
                wid,
                self.root,
                rect.point.x as i16,
                rect.point.y as i16,
                rect.dimension.width.max(1) as u16,
                rect.dimension.height.max(1) as u16,
                0,
                WindowClass::INPUT_OUTPUT,
                x11rb::COPY_FROM_PARENT,
                &aux,
            )
            .checked("create_window")?;

        Ok(wid)
    }

    fn set_window_background(&self, window: Window, color: u32) -> WmResult<()> {
        self.conn
            .change_window_attributes(
                window,
                &ChangeWindowAttributesAux::new().background_pixel(color),
            )
            .checked("change_window_attributes")?;
        self.conn
            .clear_area(false, window, 0, 0, 0, 0)
            .checked("clear_area")
    }

    fn subscribe(&self, window: Window, mask: EventMask) -> WmResult<()> {
        self.conn
            .change_window_attributes(window, &ChangeWindowAttributesAux::new().event_mask(mask))
            .checked("change_window_attributes")
    }

    fn set_input_focus(&self, window: Window) -> WmResult<()> {
        log::debug!("focusing Window({:#0x})", window);
        self.conn
            .set_input_focus(InputFocus::PARENT, window, CURRENT_TIME)
            .checked("set_input_focus")
    }

    fn unfocus(&self) -> WmResult<()> {
        log::debug!("moving the focus to the supporting window");
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, self.check_window, CURRENT_TIME)
            .checked("set_input_focus")
    }

    fn send_protocol(&self, window: Window, protocol: Protocol) -> WmResult<()> {
        let atom = match protocol {
            Protocol::TakeFocus => self.atoms.WM_TAKE_FOCUS,
            Protocol::DeleteWindow => self.atoms.WM_DELETE_WINDOW,
        };
        log::debug!("sending {:?} to Window({:#0x})", protocol, window);

        let data = [atom, CURRENT_TIME, 0, 0, 0];
        let event = ClientMessageEvent::new(32, window, self.atoms.WM_PROTOCOLS, data);

        self.conn
            .send_event(false, window, EventMask::NO_EVENT, &event)
            .checked("send_event")
    }

    fn kill_client(&self, window: Window) -> WmResult<()> {
        log::debug!("killing the client of Window({:#0x})", window);
        self.conn.kill_client(window).checked("kill_client")
    }

    fn window_properties(&self, window: Window) -> WmResult<WindowProperties> {
        let attrs = self
            .conn
            .get_window_attributes(window)
            .replied("get_window_attributes")?;

        let name = match self.text_property(window, self.atoms._NET_WM_NAME)? {
            Some(name) => name,
            None => self
                .text_property(window, self.atoms.WM_NAME)?
                .unwrap_or_else(|| String::from(MISSING_VALUE)),
        };

        let (class, instance) = WmClass::get(&self.conn, window)?.reply().map_or_else(
            |_| (String::from(MISSING_VALUE), String::from(MISSING_VALUE)),
            |reply| {
                (
                    String::from_utf8_lossy(reply.class()).into_owned(),
                    String::from_utf8_lossy(reply.instance()).into_owned(),
                )
            },
        );

        // A missing `WM_HINTS` fails to parse; treat it as empty
        let hints = WmHints::get(&self.conn, window)?
            .reply()
            .map_or_else(
                |_| Hints::default(),
                |hints| Hints {
                    urgent:        hints.urgent,
                    input:         hints.input,
                    initial_state: hints.initial_state.map(IcccmWindowState::from),
                    group:         hints.window_group,
                },
            );

        Ok(WindowProperties {
            name,
            class,
            instance,
            hints,
            protocols: self.protocols(window)?,
            override_redirect: attrs.override_redirect,
        })
    }

    fn existing_windows(&self) -> WmResult<Vec<Window>> {
        let tree = self.conn.query_tree(self.root).replied("query_tree")?;

        let mut windows = vec![];
        for window in tree.children {
            if window == self.check_window {
                continue;
            }

            match self
                .conn
                .get_window_attributes(window)
                .replied("get_window_attributes")
            {
                Ok(attrs) if !attrs.override_redirect && attrs.map_state == MapState::VIEWABLE =>
                    windows.push(window),
                Ok(_) => {},
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => log::debug!("skipping Window({:#0x}): {}", window, e),
            }
        }

        Ok(windows)
    }

    fn query_heads(&self) -> WmResult<Vec<Rectangle>> {
        if self.randr {
            match self
                .conn
                .randr_get_monitors(self.root, true)
                .replied("randr_get_monitors")
            {
                Ok(reply) if !reply.monitors.is_empty() =>
                    return Ok(reply
                        .monitors
                        .iter()
                        .map(|m| {
                            Rectangle::new(
                                m.x.into(),
                                m.y.into(),
                                m.width.into(),
                                m.height.into(),
                            )
                        })
                        .collect()),
                Ok(_) => log::warn!("randr reported no monitors"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => log::warn!("{}", e),
            }
        }

        log::debug!("falling back to the root geometry for heads");
        Ok(vec![self.get_geometry(self.root)?])
    }

    fn pointer_position(&self) -> WmResult<Point> {
        let reply = self
            .conn
            .query_pointer(self.root)
            .replied("query_pointer")?;
        Ok(Point::new(reply.root_x.into(), reply.root_y.into()))
    }

    fn keycodes_for(&self, keysym: u32) -> WmResult<Vec<Keycode>> {
        let setup = self.conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);

        let reply = self
            .conn
            .get_keyboard_mapping(min, max - min + 1)
            .replied("get_keyboard_mapping")?;

        let per = usize::from(reply.keysyms_per_keycode);
        if per == 0 {
            return Ok(vec![]);
        }

        Ok(reply
            .keysyms
            .chunks(per)
            .zip(min..=max)
            .filter(|(syms, _)| syms.iter().take(2).any(|&s| s == keysym))
            .map(|(_, code)| code)
            .collect())
    }

    fn grab_key(&self, window: Window, modifiers: u16, keycode: Keycode) -> WmResult<()> {
        log::debug!(
            "grabbing key {} with mask {:#06x} on Window({:#0x})",
            keycode,
            modifiers,
            window
        );
        for extra in ModMask::ignored_combinations() {
            self.conn
                .grab_key(
                    false,
                    window,
                    modifiers | extra,
                    keycode,
                    GrabMode::ASYNC,
                    GrabMode::SYNC,
                )
                .checked("grab_key")?;
        }
        Ok(())
    }

    fn grab_button(&self, window: Window, modifiers: u16, button: u8) -> WmResult<()> {
        log::debug!(
            "grabbing button {} with mask {:#06x} on Window({:#0x})",
            button,
            modifiers,
            window
        );
        for extra in ModMask::ignored_combinations() {
            self.conn
                .grab_button(
                    false,
                    window,
                    u32::from(EventMask::BUTTON_PRESS) as u16,
                    GrabMode::SYNC,
                    GrabMode::ASYNC,
                    NONE,
                    NONE,
                    ButtonIndex::from(button),
                    modifiers | extra,
                )
                .checked("grab_button")?;
        }
        Ok(())
    }

    fn ungrab_all(&self, window: Window) -> WmResult<()> {
        self.conn
            .ungrab_key(xproto::Grab::ANY, window, XModMask::ANY)
            .checked("ungrab_key")?;
        self.conn
            .ungrab_button(ButtonIndex::ANY, window, XModMask::ANY)
            .checked("ungrab_button")
    }

    fn allow_events(&self, device: Device, replay: bool, time: u32) -> WmResult<()> {
        let mode = match (device, replay) {
            (Device::Keyboard, true) => Allow::REPLAY_KEYBOARD,
            (Device::Keyboard, false) => Allow::ASYNC_KEYBOARD,
            (Device::Pointer, true) => Allow::REPLAY_POINTER,
            (Device::Pointer, false) => Allow::ASYNC_POINTER,
        };
        self.conn.allow_events(mode, time).checked("allow_events")
    }

    fn intern_atom(&self, name: &str) -> WmResult<Atom> {
        Ok(self
            .conn
            .intern_atom(false, name.as_bytes())
            .replied("intern_atom")?
            .atom)
    }

    fn atom_name(&self, atom: Atom) -> WmResult<String> {
        let reply = self
            .conn
            .get_atom_name(atom)
            .replied("get_atom_name")?;
        Ok(String::from_utf8_lossy(&reply.name).into_owned())
    }

    fn set_cursor(&self, window: Window, cursor: CursorRef) -> WmResult<()> {
        let loaded = self.cursors.borrow().get(cursor).copied();
        let id = match loaded {
            Some(id) => id,
            None => {
                log::debug!("loading cursor `{}`", cursor);
                let db = Database::new_from_default(&self.conn)
                    .map_err(|e| reply_error("resource_manager", e))?;
                let id = CursorHandle::new(&self.conn, self.screen, &db)?
                    .reply()
                    .map_err(Error::from)?
                    .load_cursor(&self.conn, cursor)?;
                self.cursors.borrow_mut().insert(cursor, id);
                id
            },
        };

        self.conn
            .change_window_attributes(window, &ChangeWindowAttributesAux::new().cursor(id))
            .checked("change_window_attributes")
    }

    fn update_property(&self, property: &Ewmh) -> WmResult<()> {
        log::trace!("updating {:?}", property);
        let atoms = &self.atoms;

        match property {
            Ewmh::ActiveWindow(Some(window)) => self
                .conn
                .change_property32(
                    PropMode::REPLACE,
                    self.root,
                    atoms._NET_ACTIVE_WINDOW,
                    AtomEnum::WINDOW,
                    &[*window],
                )
                .checked("change_property"),
            Ewmh::ActiveWindow(None) => self
                .conn
                .delete_property(self.root, atoms._NET_ACTIVE_WINDOW)
                .checked("delete_property"),
            Ewmh::ClientList(windows) => self
                .conn
                .change_property32(
                    PropMode::REPLACE,
                    self.root,
                    atoms._NET_CLIENT_LIST,
                    AtomEnum::WINDOW,
                    windows,
                )
                .checked("change_property"),
            Ewmh::Desktops(names) => {
                self.conn
                    .change_property32(
                        PropMode::REPLACE,
                        self.root,
                        atoms._NET_NUMBER_OF_DESKTOPS,
                        AtomEnum::CARDINAL,
                        &[names.len() as u32],
                    )
                    .checked("change_property")?;

                let joined = names
                    .iter()
                    .flat_map(|n| n.bytes().chain(Some(0)))
                    .collect::<Vec<_>>();
                self.conn
                    .change_property8(
                        PropMode::REPLACE,
                        self.root,
                        atoms._NET_DESKTOP_NAMES,
                        atoms.UTF8_STRING,
                        &joined,
                    )
                    .checked("change_property")
            },
            Ewmh::CurrentDesktop(idx) => self
                .conn
                .change_property32(
                    PropMode::REPLACE,
                    self.root,
                    atoms._NET_CURRENT_DESKTOP,
                    AtomEnum::CARDINAL,
                    &[*idx],
                )
                .checked("change_property"),
            Ewmh::WmDesktop(window, idx) => self
                .conn
                .change_property32(
                    PropMode::REPLACE,
                    *window,
                    atoms._NET_WM_DESKTOP,
                    AtomEnum::CARDINAL,
                    &[*idx],
                )
                .checked("change_property"),
            Ewmh::WmState {
                window,
                fullscreen,
                maximized,
            } => {
                let mut states = vec![];
                if *fullscreen {
                    states.push(atoms._NET_WM_STATE_FULLSCREEN);
                }
                if *maximized {
                    states.push(atoms._NET_WM_STATE_MAXIMIZED_VERT);
                    states.push(atoms._NET_WM_STATE_MAXIMIZED_HORZ);
                }

                self.conn
                    .change_property32(
                        PropMode::REPLACE,
                        *window,
                        atoms._NET_WM_STATE,
                        AtomEnum::ATOM,
                        &states,
                    )
                    .checked("change_property")
            },
            Ewmh::FrameExtents(window, extents) => self
                .conn
                .change_property32(
                    PropMode::REPLACE,
                    *window,
                    atoms._NET_FRAME_EXTENTS,
                    AtomEnum::CARDINAL,
                    extents,
                )
                .checked("change_property"),
            Ewmh::IcccmState(window, state) => self
                .conn
                .change_property32(
                    PropMode::REPLACE,
                    *window,
                    atoms.WM_STATE,
                    atoms.WM_STATE,
                    &[u32::from(*state), NONE],
                )
                .checked("change_property"),
        }
    }

    fn waker(&self) -> WmResult<Waker> {
        self.wake_tx
            .try_clone()
            .map(Waker::new)
            .map_err(|e| Error::protocol("socketpair", e))
    }
}

// vim: ft=rust:et:sw=4:ts=2:sts=4:tw=99:fdm=marker:fmr=[[[,]]]:
