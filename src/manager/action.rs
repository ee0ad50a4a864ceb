//! Actions shared by bindings and the command channel

use crate::{
    core::{change::Toggle, ClientId, Window, WorkspaceId},
    error::{Error, WmResult},
    manager::WindowManager,
    monitor::{client::ClientState, workspace::Layout, Env},
    x::{event::WindowChanges, session::DisplaySession},
};
use itertools::Itertools;
use std::{fmt, str::FromStr};

/// A typed argument cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Arg {
    Int(i32),
    Window(Window),
    Str(String),
}

impl Arg {
    /// Read a word typed by a user; numbers become [`Arg::Int`]
    pub(crate) fn from_word(word: &str) -> Self {
        word.parse::<i32>()
            .map_or_else(|_| Self::Str(word.to_owned()), Self::Int)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Window(w) => write!(f, "{:#0x}", w),
            Self::Str(s) => f.write_str(s),
        }
    }
}

/// A workspace named by an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WorkspaceRef {
    /// Position, starting at zero
    Index(usize),
    /// A name, or a position starting at one when no workspace has the name
    Name(String),
}

impl WorkspaceRef {
    /// Find the workspace in `layout`
    pub(crate) fn resolve(&self, layout: &Layout) -> Option<WorkspaceId> {
        let count = layout.workspaces().len();
        match self {
            Self::Index(idx) => (*idx < count).then(|| WorkspaceId(*idx)),
            Self::Name(name) => layout.find(name).or_else(|| {
                name.parse::<usize>()
                    .ok()
                    .filter(|&n| n >= 1 && n <= count)
                    .map(|n| WorkspaceId(n - 1))
            }),
        }
    }
}

/// Something the user asked the manager to do.
///
/// Client actions apply to the target of the command, or the focused client
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    /// Ask the client to close
    Close,
    /// Disconnect the client from the server
    Kill,
    /// Show and focus the client
    Focus,
    /// Focus the next visible client
    FocusNext,
    Iconify,
    Deiconify,
    Fullscreen(Toggle),
    Maximize(Toggle),
    Move {
        x: i32,
        y: i32,
    },
    Resize {
        width:  u32,
        height: u32,
    },
    /// Show a workspace on the current head
    Workspace(WorkspaceRef),
    WorkspaceNext,
    WorkspacePrev,
    /// Move the client to a workspace
    SendToWorkspace(WorkspaceRef),
    /// Choose a workspace through the prompt
    Switcher,
    /// Run a command line through the shell
    Spawn(String),
    /// Load the configuration again
    Reload,
    Quit,
}

impl Action {
    /// Name used on the command channel and in the configuration
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Kill => "kill",
            Self::Focus => "focus",
            Self::FocusNext => "focus-next",
            Self::Iconify => "iconify",
            Self::Deiconify => "deiconify",
            Self::Fullscreen(_) => "fullscreen",
            Self::Maximize(_) => "maximize",
            Self::Move { .. } => "move",
            Self::Resize { .. } => "resize",
            Self::Workspace(_) => "workspace",
            Self::WorkspaceNext => "workspace-next",
            Self::WorkspacePrev => "workspace-prev",
            Self::SendToWorkspace(_) => "send-to-workspace",
            Self::Switcher => "switcher",
            Self::Spawn(_) => "spawn",
            Self::Reload => "reload",
            Self::Quit => "quit",
        }
    }

    /// Does the action need a client to work on?
    pub(crate) const fn needs_client(&self) -> bool {
        matches!(
            self,
            Self::Close
                | Self::Kill
                | Self::Focus
                | Self::Iconify
                | Self::Deiconify
                | Self::Fullscreen(_)
                | Self::Maximize(_)
                | Self::Move { .. }
                | Self::Resize { .. }
                | Self::SendToWorkspace(_)
        )
    }

    /// Build an action from its name and argument cells.
    ///
    /// Argument order is part of the command channel and must not change
    pub(crate) fn from_parts(name: &str, args: &[Arg]) -> WmResult<Self> {
        let invalid = |reason: &str| Error::InvalidArguments {
            command: name.to_owned(),
            reason:  reason.to_owned(),
        };
        let arity = |n: usize| {
            if args.len() == n {
                Ok(())
            } else {
                Err(invalid(&format!("expected {} argument(s), got {}", n, args.len())))
            }
        };
        let int = |idx: usize| match args.get(idx) {
            Some(Arg::Int(n)) => Ok(*n),
            _ => Err(invalid("expected a number")),
        };
        let size = |idx: usize| {
            int(idx).and_then(|n| {
                u32::try_from(n)
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or_else(|| invalid("sizes must be positive"))
            })
        };
        let toggle = || match args {
            [] => Ok(Toggle::Invert),
            [Arg::Str(s)] => s.parse::<Toggle>().map_err(|_| invalid("expected on, off or toggle")),
            _ => Err(invalid("expected on, off or toggle")),
        };
        let workspace = || match args {
            [Arg::Int(n)] => Ok(WorkspaceRef::Name(n.to_string())),
            [Arg::Str(s)] => Ok(WorkspaceRef::Name(s.clone())),
            _ => Err(invalid("expected a workspace name or number")),
        };

        let action = match name {
            "close" => arity(0).map(|_| Self::Close)?,
            "kill" => arity(0).map(|_| Self::Kill)?,
            "focus" => arity(0).map(|_| Self::Focus)?,
            "focus-next" => arity(0).map(|_| Self::FocusNext)?,
            "iconify" => arity(0).map(|_| Self::Iconify)?,
            "deiconify" => arity(0).map(|_| Self::Deiconify)?,
            "fullscreen" => Self::Fullscreen(toggle()?),
            "maximize" => Self::Maximize(toggle()?),
            "move" => {
                arity(2)?;
                Self::Move {
                    x: int(0)?,
                    y: int(1)?,
                }
            },
            "resize" => {
                arity(2)?;
                Self::Resize {
                    width:  size(0)?,
                    height: size(1)?,
                }
            },
            "workspace" => Self::Workspace(workspace()?),
            "workspace-next" => arity(0).map(|_| Self::WorkspaceNext)?,
            "workspace-prev" => arity(0).map(|_| Self::WorkspacePrev)?,
            "send-to-workspace" => Self::SendToWorkspace(workspace()?),
            "switcher" => arity(0).map(|_| Self::Switcher)?,
            "spawn" => {
                if args.is_empty() {
                    return Err(invalid("expected a command line"));
                }
                Self::Spawn(args.iter().join(" "))
            },
            "reload" => arity(0).map(|_| Self::Reload)?,
            "quit" => arity(0).map(|_| Self::Quit)?,
            other => return Err(Error::UnknownCommand(other.to_owned())),
        };

        Ok(action)
    }
}

impl FromStr for Action {
    type Err = Error;

    /// Parse a command line such as `workspace 2` or `spawn xterm -e htop`
    fn from_str(s: &str) -> WmResult<Self> {
        let mut words = s.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| Error::UnknownCommand(String::new()))?;
        let args = words.map(Arg::from_word).collect::<Vec<_>>();

        Self::from_parts(name, &args)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())?;
        match self {
            Self::Fullscreen(t) | Self::Maximize(t) => write!(f, " {}", t.as_arg()),
            Self::Move { x, y } => write!(f, " {} {}", x, y),
            Self::Resize { width, height } => write!(f, " {} {}", width, height),
            Self::Workspace(ws) | Self::SendToWorkspace(ws) => match ws {
                WorkspaceRef::Index(idx) => write!(f, " {}", idx + 1),
                WorkspaceRef::Name(name) => write!(f, " {}", name),
            },
            Self::Spawn(cmd) => write!(f, " {}", cmd),
            _ => Ok(()),
        }
    }
}

// ============================= Dispatch =============================

impl<S: DisplaySession> WindowManager<S> {
    /// Run an action against `target`, or the focused client when there is
    /// none
    pub(crate) fn run_action(&mut self, action: &Action, target: Option<ClientId>) -> WmResult<()> {
        let target = target.or_else(|| self.registry.focused());
        log::debug!("running `{}` on {:?}", action, target);

        let client = match (action.needs_client(), target) {
            (true, Some(id)) => id,
            (true, None) => {
                log::debug!("`{}` needs a client; nothing to do", action.name());
                return Ok(());
            },
            (false, _) => return self.run_global(action),
        };

        let env = Env::new(&self.session, &*self.theme, &self.config);
        match action {
            Action::Close => self.registry.close(&env, client),
            Action::Kill => self.registry.kill(&env, client),
            Action::Focus => self.activate(client),
            Action::Iconify => self.registry.iconify(&env, &self.layout, client),
            Action::Deiconify => {
                self.registry.deiconify(&env, &self.layout, client)?;
                self.try_focus(client)
            },
            Action::Fullscreen(toggle) =>
                self.registry
                    .set_fullscreen(&env, &self.layout, client, *toggle),
            Action::Maximize(toggle) =>
                self.registry
                    .set_maximized(&env, &self.layout, client, *toggle),
            Action::Move { x, y } => {
                let changes = WindowChanges {
                    x: Some(*x),
                    y: Some(*y),
                    ..WindowChanges::default()
                };
                self.registry.move_resize(&env, client, changes).map(|_| ())
            },
            Action::Resize { width, height } => {
                let changes = WindowChanges {
                    width: Some(*width),
                    height: Some(*height),
                    ..WindowChanges::default()
                };
                self.registry.move_resize(&env, client, changes).map(|_| ())
            },
            Action::SendToWorkspace(ws) => {
                let ws = self.resolve_workspace(ws)?;
                self.registry
                    .send_to_workspace(&env, &mut self.layout, client, ws)?;
                self.publish_desktops()
            },
            _ => Ok(()),
        }
    }

    /// Actions that do not work on a client
    fn run_global(&mut self, action: &Action) -> WmResult<()> {
        match action {
            Action::FocusNext => match self.registry.next_focusable(&self.layout) {
                Some(id) => self.try_focus(id),
                None => Ok(()),
            },
            Action::Workspace(ws) => {
                let ws = self.resolve_workspace(ws)?;
                self.show_workspace(ws)
            },
            Action::WorkspaceNext | Action::WorkspacePrev => {
                let count = self.layout.workspaces().len();
                let current = self.current_workspace().0;
                let next = if *action == Action::WorkspaceNext {
                    (current + 1) % count
                } else {
                    (current + count - 1) % count
                };
                self.show_workspace(WorkspaceId(next))
            },
            Action::Switcher => self.open_switcher(),
            Action::Spawn(cmd) => self.spawn(cmd),
            Action::Reload => self.reload(),
            Action::Quit => {
                log::info!("quit requested");
                self.running = false;
                Ok(())
            },
            _ => Ok(()),
        }
    }

    fn resolve_workspace(&self, ws: &WorkspaceRef) -> WmResult<WorkspaceId> {
        ws.resolve(&self.layout).ok_or_else(|| Error::InvalidArguments {
            command: String::from("workspace"),
            reason:  format!("no workspace {:?}", ws),
        })
    }

    /// Show a workspace on the head of the focused client or under the
    /// pointer, then settle the focus
    pub(crate) fn show_workspace(&mut self, ws: WorkspaceId) -> WmResult<()> {
        let head = self.current_head()?;
        let change = self.layout.switch_active_workspace(head, ws)?;

        let env = Env::new(&self.session, &*self.theme, &self.config);
        self.registry.apply_visibility(&env, &self.layout, &change)?;
        if self.registry.focused().is_none() {
            self.registry.focus_fallback(&env, &self.layout)?;
        }

        self.publish_desktops()
    }

    /// Bring a client into view and focus it
    fn activate(&mut self, id: ClientId) -> WmResult<()> {
        let (state, ws) = match self.registry.get(id) {
            Some(c) => (c.state(), c.workspace()),
            None => return Err(Error::StaleClient(id)),
        };

        if state == ClientState::Iconic {
            let env = Env::new(&self.session, &*self.theme, &self.config);
            self.registry.deiconify(&env, &self.layout, id)?;
        }

        if let Some(ws) = ws.filter(|&ws| !self.layout.is_visible(ws)) {
            self.show_workspace(ws)?;
        }

        let env = Env::new(&self.session, &*self.theme, &self.config);
        self.registry.focus(&env, &self.layout, id)
    }

    /// Focus a client, leaving the focus alone when it cannot be taken
    pub(crate) fn try_focus(&mut self, id: ClientId) -> WmResult<()> {
        let env = Env::new(&self.session, &*self.theme, &self.config);
        match self.registry.focus(&env, &self.layout, id) {
            Err(Error::NotFocusable(w)) => {
                log::debug!("Window({:#0x}) does not take the focus", w);
                Ok(())
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, Arg, WorkspaceRef};
    use crate::{
        core::{change::Toggle, WorkspaceId},
        error::Error,
        geometry::Rectangle,
        monitor::workspace::Layout,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_command_lines() {
        assert_eq!("close".parse::<Action>().unwrap(), Action::Close);
        assert_eq!(
            "fullscreen".parse::<Action>().unwrap(),
            Action::Fullscreen(Toggle::Invert)
        );
        assert_eq!(
            "maximize on".parse::<Action>().unwrap(),
            Action::Maximize(Toggle::On)
        );
        assert_eq!(
            "move -10 20".parse::<Action>().unwrap(),
            Action::Move { x: -10, y: 20 }
        );
        assert_eq!(
            "workspace web".parse::<Action>().unwrap(),
            Action::Workspace(WorkspaceRef::Name(String::from("web")))
        );
        assert_eq!(
            "spawn xterm -e htop".parse::<Action>().unwrap(),
            Action::Spawn(String::from("xterm -e htop"))
        );
    }

    #[test]
    fn unknown_names_and_bad_arguments() {
        assert!(matches!(
            "launch-rockets".parse::<Action>(),
            Err(Error::UnknownCommand(name)) if name == "launch-rockets"
        ));
        assert!(matches!(
            "close now".parse::<Action>(),
            Err(Error::InvalidArguments { .. })
        ));
        assert!(matches!(
            "resize 0 10".parse::<Action>(),
            Err(Error::InvalidArguments { .. })
        ));
        assert!(matches!(
            Action::from_parts("move", &[Arg::Int(1), Arg::Str(String::from("x"))]),
            Err(Error::InvalidArguments { .. })
        ));
    }

    #[test]
    fn display_parses_back() {
        for line in ["maximize off", "resize 640 480", "send-to-workspace 3", "quit"] {
            assert_eq!(line.parse::<Action>().unwrap().to_string(), line);
        }
    }

    #[test]
    fn workspace_names_win_over_positions() {
        let names = ["web", "2", "1"].iter().map(ToString::to_string).collect::<Vec<_>>();
        let layout = Layout::new(&names, &[Rectangle::new(0, 0, 10, 10)]);

        let by = |s: &str| WorkspaceRef::Name(s.to_owned()).resolve(&layout);
        assert_eq!(by("web"), Some(WorkspaceId(0)));
        assert_eq!(by("1"), Some(WorkspaceId(2)));
        assert_eq!(by("3"), Some(WorkspaceId(2)));
        assert_eq!(by("9"), None);
        assert_eq!(WorkspaceRef::Index(1).resolve(&layout), Some(WorkspaceId(1)));
    }
}
