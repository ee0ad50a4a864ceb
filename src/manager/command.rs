//! The scripting channel: `_XWMD_COMMAND` client messages and the EWMH
//! requests that map onto the same actions

use crate::{
    core::{change::Toggle, ClientId, Window},
    error::{Error, WmResult},
    manager::{
        action::{Action, Arg, WorkspaceRef},
        WindowManager,
    },
    x::{
        event::{ClientMessage, MessageKind, NetWmState, XEvent},
        property::IcccmWindowState,
        session::DisplaySession,
    },
};

/// Argument cells that fit next to the action and the header
pub(crate) const MAX_ARGS: usize = 3;

/// Type tags of the argument cells
const TAG_INT: u32 = 0;
const TAG_WINDOW: u32 = 1;
const TAG_STRING: u32 = 2;

/// A decoded command, consumed once
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandMessage {
    /// Window the command is about; the root means the focused client
    pub(crate) target: Window,
    pub(crate) action: String,
    pub(crate) args:   Vec<Arg>,
}

impl CommandMessage {
    /// Read a command line such as `workspace 2`
    pub(crate) fn parse(target: Window, line: &str) -> WmResult<Self> {
        let mut words = line.split_whitespace();
        let action = words
            .next()
            .ok_or_else(|| Error::UnknownCommand(String::new()))?
            .to_owned();

        Ok(Self {
            target,
            action,
            args: words.map(Arg::from_word).collect(),
        })
    }

    /// Lay the command out as a format 32 payload.
    ///
    /// `data[0]` is the action atom, `data[1]` the argument count in bits
    /// 0-7 followed by two tag bits per argument, `data[2..5]` the cells.
    /// Strings travel as atoms
    pub(crate) fn encode<S: DisplaySession>(&self, session: &S) -> WmResult<[u32; 5]> {
        if self.args.len() > MAX_ARGS {
            return Err(Error::InvalidArguments {
                command: self.action.clone(),
                reason:  format!("at most {} arguments fit in a message", MAX_ARGS),
            });
        }

        let mut data = [0_u32; 5];
        data[0] = session.intern_atom(&self.action)?;
        data[1] = self.args.len() as u32;

        for (idx, arg) in self.args.iter().enumerate() {
            let (tag, cell) = match arg {
                Arg::Int(n) => (TAG_INT, *n as u32),
                Arg::Window(w) => (TAG_WINDOW, *w),
                Arg::Str(s) => (TAG_STRING, session.intern_atom(s)?),
            };
            data[1] |= tag << (8 + 2 * idx);
            data[2 + idx] = cell;
        }

        Ok(data)
    }

    /// Read a payload written by [`CommandMessage::encode`]
    pub(crate) fn decode<S: DisplaySession>(
        session: &S,
        target: Window,
        data: [u32; 5],
    ) -> WmResult<Self> {
        let action = session.atom_name(data[0])?;
        let count = (data[1] & 0xff) as usize;
        if count > MAX_ARGS {
            return Err(Error::InvalidArguments {
                command: action,
                reason:  format!("{} argument cells announced", count),
            });
        }

        let args = (0..count)
            .map(|idx| {
                let cell = data[2 + idx];
                match (data[1] >> (8 + 2 * idx)) & 0b11 {
                    TAG_INT => Ok(Arg::Int(cell as i32)),
                    TAG_WINDOW => Ok(Arg::Window(cell)),
                    TAG_STRING => session.atom_name(cell).map(Arg::Str),
                    tag => Err(Error::InvalidArguments {
                        command: action.clone(),
                        reason:  format!("unknown argument tag {}", tag),
                    }),
                }
            })
            .collect::<WmResult<Vec<_>>>()?;

        Ok(Self {
            target,
            action,
            args,
        })
    }

    /// Resolve into an action. A window argument replaces the target
    pub(crate) fn into_action(self) -> WmResult<(Action, Window)> {
        let mut target = self.target;
        let mut args = Vec::with_capacity(self.args.len());
        for arg in self.args {
            match arg {
                Arg::Window(w) => target = w,
                other => args.push(other),
            }
        }

        Ok((Action::from_parts(&self.action, &args)?, target))
    }
}

/// Translate an EWMH or ICCCM request into actions
fn standard_request(kind: MessageKind) -> Vec<Action> {
    match kind {
        MessageKind::ActiveWindow => vec![Action::Focus],
        MessageKind::CloseWindow => vec![Action::Close],
        MessageKind::CurrentDesktop(idx) =>
            vec![Action::Workspace(WorkspaceRef::Index(idx as usize))],
        MessageKind::WmDesktop(idx) =>
            vec![Action::SendToWorkspace(WorkspaceRef::Index(idx as usize))],
        MessageKind::WmState { action, properties } => {
            let toggle = match Toggle::from_net_wm_state(action) {
                Some(toggle) => toggle,
                None => return vec![],
            };

            let mut actions = vec![];
            if properties.contains(&NetWmState::Fullscreen) {
                actions.push(Action::Fullscreen(toggle));
            }
            // Both maximized atoms usually arrive together
            if properties.contains(&NetWmState::Maximized) {
                actions.push(Action::Maximize(toggle));
            }
            actions
        },
        MessageKind::ChangeState(state) if state == u32::from(IcccmWindowState::Iconic) =>
            vec![Action::Iconify],
        _ => vec![],
    }
}

impl<S: DisplaySession> WindowManager<S> {
    /// The client a command is about; the root stands for the focused one
    fn command_target(&self, window: Window) -> Option<ClientId> {
        if window == self.session.root() {
            return self.registry.focused();
        }

        self.registry
            .find(window)
            .or_else(|| self.registry.find_frame(window))
    }

    /// Decode and run one command message.
    ///
    /// Unknown actions are reported to the caller without any effect
    pub(crate) fn run_command(&mut self, command: CommandMessage) -> WmResult<()> {
        let (action, target) = command.into_action()?;
        let client = self.command_target(target);
        if action.needs_client() && client.is_none() && target != self.session.root() {
            return Err(Error::NotManaged(target));
        }

        self.run_action(&action, client)
    }

    pub(crate) fn on_client_message(&mut self, event: XEvent) -> WmResult<()> {
        let ClientMessage { window, kind } = match event {
            XEvent::ClientMessage(message) => message,
            _ => return Ok(()),
        };

        match kind {
            MessageKind::Command(data) => {
                let command = CommandMessage::decode(&self.session, window, data)?;
                log::debug!("command from the channel: {:?}", command);
                self.run_command(command)
            },
            MessageKind::Other(atom) => {
                log::trace!("ignoring client message of type {}", atom);
                Ok(())
            },
            kind => {
                let client = self.command_target(window);
                for action in standard_request(kind) {
                    if action.needs_client() && client.is_none() {
                        log::debug!("`{}` for unmanaged Window({:#0x})", action.name(), window);
                        continue;
                    }
                    self.run_action(&action, client)?;
                }
                Ok(())
            },
        }
    }
}
