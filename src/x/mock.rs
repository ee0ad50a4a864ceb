//! A recording [`DisplaySession`] used by the tests

use crate::{
    core::{decoration::CursorRef, Atom, Keycode, Window},
    error::{Error, WmResult},
    geometry::{Point, Rectangle},
    x::{
        event::{WindowChanges, XEvent},
        property::{Ewmh, Protocol, WindowProperties},
        session::{Device, DisplaySession, Waker},
    },
};
use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap, VecDeque},
};
use x11rb::protocol::xproto::EventMask;

/// The root window of the mock display
pub(crate) const ROOT: Window = 1;

/// First identifier handed out to frames
const FIRST_FRAME: Window = 0x0100_0000;

/// A request the manager made
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Request {
    Map(Window),
    Unmap(Window),
    Destroy(Window),
    Configure(Window, WindowChanges),
    Raise(Window),
    ConfigureNotify(Window, Rectangle),
    CreateFrame(Window, Rectangle),
    Background(Window, u32),
    Subscribe(Window),
    Focus(Window),
    Unfocus,
    Protocol(Window, Protocol),
    Kill(Window),
    GrabKey(Window, u16, Keycode),
    GrabButton(Window, u16, u8),
    Ungrab(Window),
    AllowEvents(Device, bool),
    Cursor(Window, CursorRef),
    Property(Ewmh),
}

#[derive(Debug, Clone)]
struct MockWindow {
    rect:   Rectangle,
    mapped: bool,
    props:  WindowProperties,
}

#[derive(Debug)]
struct State {
    windows:    BTreeMap<Window, MockWindow>,
    requests:   Vec<Request>,
    events:     VecDeque<XEvent>,
    heads:      Vec<Rectangle>,
    pointer:    Point,
    keymap:     HashMap<u32, Keycode>,
    atoms:      Vec<String>,
    next_frame: Window,
    lost:       bool,
}

/// In-memory display server. Every request is logged in order
#[derive(Debug)]
pub(crate) struct MockSession {
    state: RefCell<State>,
}

impl MockSession {
    /// A display with a single 1920x1080 head
    pub(crate) fn new() -> Self {
        Self::with_heads(vec![Rectangle::new(0, 0, 1920, 1080)])
    }

    /// A display with the given heads
    pub(crate) fn with_heads(heads: Vec<Rectangle>) -> Self {
        Self {
            state: RefCell::new(State {
                windows: BTreeMap::new(),
                requests: vec![],
                events: VecDeque::new(),
                heads,
                pointer: Point::new(0, 0),
                keymap: HashMap::new(),
                atoms: vec![],
                next_frame: FIRST_FRAME,
                lost: false,
            }),
        }
    }

    /// Create an unmapped window with default properties
    pub(crate) fn add_window(&self, id: Window, rect: Rectangle) {
        self.add_window_with(id, rect, WindowProperties::default());
    }

    /// Create an unmapped window with the given properties
    pub(crate) fn add_window_with(&self, id: Window, rect: Rectangle, props: WindowProperties) {
        self.state.borrow_mut().windows.insert(id, MockWindow {
            rect,
            mapped: false,
            props,
        });
    }

    /// Create a window that was mapped before the manager started
    pub(crate) fn add_mapped_window(&self, id: Window, rect: Rectangle) {
        self.add_window(id, rect);
        if let Some(w) = self.state.borrow_mut().windows.get_mut(&id) {
            w.mapped = true;
        }
    }

    /// Forget a window, as if its client destroyed it
    pub(crate) fn remove_window(&self, id: Window) {
        self.state.borrow_mut().windows.remove(&id);
    }

    /// Queue an event for [`DisplaySession::next_event`]
    pub(crate) fn push_event(&self, event: XEvent) {
        self.state.borrow_mut().events.push_back(event);
    }

    /// Replace the heads reported by [`DisplaySession::query_heads`]
    pub(crate) fn set_heads(&self, heads: Vec<Rectangle>) {
        self.state.borrow_mut().heads = heads;
    }

    pub(crate) fn set_pointer(&self, point: Point) {
        self.state.borrow_mut().pointer = point;
    }

    /// Make `keysym` produce `keycode`
    pub(crate) fn map_key(&self, keysym: u32, keycode: Keycode) {
        self.state.borrow_mut().keymap.insert(keysym, keycode);
    }

    /// Drop the connection; every later request fails
    pub(crate) fn disconnect(&self) {
        self.state.borrow_mut().lost = true;
    }

    /// Requests made so far
    pub(crate) fn requests(&self) -> Vec<Request> {
        self.state.borrow().requests.clone()
    }

    /// Forget the logged requests
    pub(crate) fn clear_requests(&self) {
        self.state.borrow_mut().requests.clear();
    }

    pub(crate) fn is_mapped(&self, id: Window) -> bool {
        self.state
            .borrow()
            .windows
            .get(&id)
            .map_or(false, |w| w.mapped)
    }

    /// Geometry of a window without logging a request
    pub(crate) fn rect_of(&self, id: Window) -> Option<Rectangle> {
        self.state.borrow().windows.get(&id).map(|w| w.rect)
    }

    /// Frames created so far
    pub(crate) fn frames(&self) -> Vec<Window> {
        self.state
            .borrow()
            .windows
            .keys()
            .copied()
            .filter(|&w| w >= FIRST_FRAME)
            .collect()
    }

    /// Last value written for a property matching `pred`
    pub(crate) fn last_property(&self, pred: impl Fn(&Ewmh) -> bool) -> Option<Ewmh> {
        self.state
            .borrow()
            .requests
            .iter()
            .rev()
            .find_map(|r| match r {
                Request::Property(p) if pred(p) => Some(p.clone()),
                _ => None,
            })
    }

    fn log(&self, request: Request) -> WmResult<()> {
        let mut state = self.state.borrow_mut();
        if state.lost {
            return Err(Error::Connection(String::from("broken pipe")));
        }
        state.requests.push(request);
        Ok(())
    }

    /// Log a request against an existing window and update it
    fn with_window(
        &self,
        id: Window,
        request: Request,
        f: impl FnOnce(&mut MockWindow),
    ) -> WmResult<()> {
        self.log(request)?;
        let mut state = self.state.borrow_mut();
        let window = state
            .windows
            .get_mut(&id)
            .ok_or_else(|| Error::protocol("mock", format!("BadWindow {:#0x}", id)))?;
        f(window);
        Ok(())
    }
}

impl DisplaySession for MockSession {
    fn root(&self) -> Window {
        ROOT
    }

    fn next_event(&self) -> WmResult<XEvent> {
        let mut state = self.state.borrow_mut();
        if state.lost {
            return Err(Error::Connection(String::from("broken pipe")));
        }
        state
            .events
            .pop_front()
            .ok_or_else(|| Error::Connection(String::from("no more events")))
    }

    fn flush(&self) -> WmResult<()> {
        if self.state.borrow().lost {
            return Err(Error::Connection(String::from("broken pipe")));
        }
        Ok(())
    }

    fn get_geometry(&self, window: Window) -> WmResult<Rectangle> {
        let state = self.state.borrow();
        if state.lost {
            return Err(Error::Connection(String::from("broken pipe")));
        }
        if window == ROOT {
            return Ok(state
                .heads
                .iter()
                .fold(Rectangle::new(0, 0, 1, 1), |acc, h| {
                    let br = h.bottom_right();
                    Rectangle::new(
                        0,
                        0,
                        acc.dimension.width.max(br.x.max(0) as u32),
                        acc.dimension.height.max(br.y.max(0) as u32),
                    )
                }));
        }
        state
            .windows
            .get(&window)
            .map(|w| w.rect)
            .ok_or_else(|| Error::Query(window, String::from("BadDrawable")))
    }

    fn configure_window(&self, window: Window, changes: &WindowChanges) -> WmResult<()> {
        let changes = *changes;
        self.with_window(window, Request::Configure(window, changes), |w| {
            w.rect = changes.merge(w.rect);
        })
    }

    fn raise_window(&self, window: Window) -> WmResult<()> {
        self.with_window(window, Request::Raise(window), |_| {})
    }

    fn send_configure_notify(&self, window: Window, rect: Rectangle) -> WmResult<()> {
        self.log(Request::ConfigureNotify(window, rect))
    }

    fn map_window(&self, window: Window) -> WmResult<()> {
        self.with_window(window, Request::Map(window), |w| w.mapped = true)
    }

    fn unmap_window(&self, window: Window) -> WmResult<()> {
        self.with_window(window, Request::Unmap(window), |w| w.mapped = false)
    }

    fn destroy_window(&self, window: Window) -> WmResult<()> {
        self.log(Request::Destroy(window))?;
        self.state.borrow_mut().windows.remove(&window);
        Ok(())
    }

    fn create_frame(&self, rect: Rectangle, color: u32) -> WmResult<Window> {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_frame;
            state.next_frame += 1;
            id
        };
        self.log(Request::CreateFrame(id, rect))?;
        self.add_window_with(id, rect, WindowProperties {
            override_redirect: true,
            ..WindowProperties::default()
        });
        self.log(Request::Background(id, color))?;
        Ok(id)
    }

    fn set_window_background(&self, window: Window, color: u32) -> WmResult<()> {
        self.log(Request::Background(window, color))
    }

    fn subscribe(&self, window: Window, _mask: EventMask) -> WmResult<()> {
        self.log(Request::Subscribe(window))
    }

    fn set_input_focus(&self, window: Window) -> WmResult<()> {
        self.log(Request::Focus(window))
    }

    fn unfocus(&self) -> WmResult<()> {
        self.log(Request::Unfocus)
    }

    fn send_protocol(&self, window: Window, protocol: Protocol) -> WmResult<()> {
        self.log(Request::Protocol(window, protocol))
    }

    fn kill_client(&self, window: Window) -> WmResult<()> {
        self.log(Request::Kill(window))
    }

    fn window_properties(&self, window: Window) -> WmResult<WindowProperties> {
        let state = self.state.borrow();
        if state.lost {
            return Err(Error::Connection(String::from("broken pipe")));
        }
        state
            .windows
            .get(&window)
            .map(|w| w.props.clone())
            .ok_or_else(|| Error::protocol("get_window_attributes", "BadWindow"))
    }

    fn existing_windows(&self) -> WmResult<Vec<Window>> {
        Ok(self
            .state
            .borrow()
            .windows
            .iter()
            .filter(|(_, w)| w.mapped && !w.props.override_redirect)
            .map(|(&id, _)| id)
            .collect())
    }

    fn query_heads(&self) -> WmResult<Vec<Rectangle>> {
        Ok(self.state.borrow().heads.clone())
    }

    fn pointer_position(&self) -> WmResult<Point> {
        Ok(self.state.borrow().pointer)
    }

    fn keycodes_for(&self, keysym: u32) -> WmResult<Vec<Keycode>> {
        Ok(self
            .state
            .borrow()
            .keymap
            .get(&keysym)
            .copied()
            .into_iter()
            .collect())
    }

    fn grab_key(&self, window: Window, modifiers: u16, keycode: Keycode) -> WmResult<()> {
        self.log(Request::GrabKey(window, modifiers, keycode))
    }

    fn grab_button(&self, window: Window, modifiers: u16, button: u8) -> WmResult<()> {
        self.log(Request::GrabButton(window, modifiers, button))
    }

    fn ungrab_all(&self, window: Window) -> WmResult<()> {
        self.log(Request::Ungrab(window))
    }

    fn allow_events(&self, device: Device, replay: bool, _time: u32) -> WmResult<()> {
        self.log(Request::AllowEvents(device, replay))
    }

    fn intern_atom(&self, name: &str) -> WmResult<Atom> {
        let mut state = self.state.borrow_mut();
        let idx = match state.atoms.iter().position(|a| a == name) {
            Some(idx) => idx,
            None => {
                state.atoms.push(name.to_owned());
                state.atoms.len() - 1
            },
        };
        Ok(1000 + idx as Atom)
    }

    fn atom_name(&self, atom: Atom) -> WmResult<String> {
        atom.checked_sub(1000)
            .and_then(|idx| self.state.borrow().atoms.get(idx as usize).cloned())
            .ok_or_else(|| Error::protocol("get_atom_name", "BadAtom"))
    }

    fn set_cursor(&self, window: Window, cursor: CursorRef) -> WmResult<()> {
        self.log(Request::Cursor(window, cursor))
    }

    fn update_property(&self, property: &Ewmh) -> WmResult<()> {
        self.log(Request::Property(property.clone()))
    }

    fn waker(&self) -> WmResult<Waker> {
        Ok(Waker::noop())
    }
}
