//! Key and button bindings

use crate::{
    config::BindingConfig,
    core::{ClientId, Window},
    error::{Error, WmResult},
    manager::{action::Action, WindowManager},
    monitor::Env,
    x::{
        event::{InputEvent, XEvent},
        input::{BindContext, Button, Chord, ChordSpec, ModMask, Trigger},
        session::{Device, DisplaySession},
    },
};
use std::collections::HashMap;

/// Where a chord is in its recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    ChordMatched,
    ActionDispatched,
}

/// A binding resolved against the keyboard mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Binding {
    pub(crate) chord:   Chord,
    pub(crate) context: BindContext,
    pub(crate) action:  Action,
}

/// The binding table. Built once per configuration snapshot
#[derive(Debug, Default)]
pub(crate) struct Bindings {
    table: HashMap<(Chord, BindContext), Action>,
    phase: Phase,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Idle
    }
}

impl Bindings {
    /// Resolve every configured binding.
    ///
    /// Keys without a keycode on this keyboard are skipped with a warning;
    /// malformed chords and actions fail the whole table
    pub(crate) fn build<S: DisplaySession>(
        session: &S,
        config: &[BindingConfig],
    ) -> WmResult<Self> {
        let mut table = HashMap::new();

        for entry in config {
            let spec = entry.chord.parse::<ChordSpec>()?;
            let action = entry.action.parse::<Action>()?;

            let chords = match spec.trigger {
                Trigger::Button(button) => vec![Chord::button(spec.mods, button.into())],
                Trigger::Key(keysym) => session
                    .keycodes_for(keysym)?
                    .into_iter()
                    .map(|code| Chord::key(spec.mods, code))
                    .collect(),
            };

            if chords.is_empty() {
                log::warn!(
                    "{}",
                    Error::UnknownBinding {
                        chord:  entry.chord.clone(),
                        reason: String::from("no keycode produces this key"),
                    }
                );
                continue;
            }

            for chord in chords {
                if let Some(old) = table.insert((chord, entry.context), action.clone()) {
                    log::warn!("`{}` replaces `{}` on {}", action, old, entry.chord);
                }
            }
        }

        log::debug!("{} bindings resolved", table.len());
        Ok(Self {
            table,
            phase: Phase::Idle,
        })
    }

    /// Exact match on chord and context
    pub(crate) fn lookup(&self, chord: Chord, context: BindContext) -> Option<&Action> {
        self.table.get(&(chord, context))
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }

    /// Every resolved binding
    pub(crate) fn iter(&self) -> impl Iterator<Item = Binding> + '_ {
        self.table.iter().map(|(&(chord, context), action)| Binding {
            chord,
            context,
            action: action.clone(),
        })
    }

    fn grab<S, P>(&self, session: &S, window: Window, pred: P) -> WmResult<()>
    where
        S: DisplaySession,
        P: Fn(&Binding) -> bool,
    {
        for binding in self.iter().filter(|b| pred(b)) {
            log::trace!("grabbing {:?} for `{}`", binding.chord, binding.action);
            let chord = binding.chord;
            for extra in ModMask::ignored_combinations() {
                if chord.button {
                    session.grab_button(window, chord.mods | extra, chord.detail)?;
                } else {
                    session.grab_key(window, chord.mods | extra, chord.detail)?;
                }
            }
        }
        Ok(())
    }

    /// Grab every key, and the buttons bound on the root window
    pub(crate) fn grab_root<S: DisplaySession>(&self, session: &S) -> WmResult<()> {
        let root = session.root();
        session.ungrab_all(root)?;
        self.grab(session, root, |b| {
            !b.chord.button || b.context == BindContext::Root
        })
    }

    /// Grab the buttons bound in `context` on a client window or frame, and
    /// the plain click that focuses
    pub(crate) fn grab_window<S: DisplaySession>(
        &self,
        session: &S,
        window: Window,
        context: BindContext,
    ) -> WmResult<()> {
        self.grab(session, window, |b| b.chord.button && b.context == context)?;
        for extra in ModMask::ignored_combinations() {
            session.grab_button(window, extra, Button::Left.into())?;
        }
        Ok(())
    }
}

impl<S: DisplaySession> WindowManager<S> {
    /// Step a chord through recognition, then thaw the device.
    ///
    /// Every chord starts from [`Phase::Idle`]. Unmatched chords are replayed
    /// to the application
    fn dispatch_chord(
        &mut self,
        device: Device,
        chord: Chord,
        contexts: &[BindContext],
        target: Option<ClientId>,
        time: u32,
    ) -> WmResult<bool> {
        self.bindings.phase = Phase::Idle;
        let action = contexts
            .iter()
            .find_map(|&ctx| self.bindings.lookup(chord, ctx))
            .cloned();

        let action = match action {
            Some(action) => action,
            None => {
                self.session.allow_events(device, true, time)?;
                return Ok(false);
            },
        };

        self.bindings.phase = Phase::ChordMatched;
        log::trace!("{:?} matched `{}`", chord, action);
        self.session.allow_events(device, false, time)?;

        let result = self.run_action(&action, target);
        // Stays until the next chord starts
        self.bindings.phase = Phase::ActionDispatched;
        log::trace!("`{}` dispatched", action.name());

        result.map(|_| true)
    }

    pub(crate) fn on_key_press(&mut self, event: XEvent) -> WmResult<()> {
        let InputEvent {
            state,
            detail,
            time,
            ..
        } = match event {
            XEvent::KeyPress(e) => e,
            _ => return Ok(()),
        };

        // Keys are grabbed on the root, so the focused client is the context
        let focused = self.registry.focused();
        let contexts: &[BindContext] = if focused.is_some() {
            &[BindContext::Client, BindContext::Root]
        } else {
            &[BindContext::Root]
        };

        self.dispatch_chord(Device::Keyboard, Chord::key(state, detail), contexts, focused, time)
            .map(|_| ())
    }

    pub(crate) fn on_button_press(&mut self, event: XEvent) -> WmResult<()> {
        let e = match event {
            XEvent::ButtonPress(e) => e,
            _ => return Ok(()),
        };

        let (context, target) = if let Some(id) = self.registry.find(e.window) {
            (BindContext::Client, Some(id))
        } else if let Some(id) = self.registry.find_frame(e.window) {
            (BindContext::Frame, Some(id))
        } else {
            (BindContext::Root, None)
        };

        let chord = Chord::button(e.state, e.detail);
        if self.bindings.lookup(chord, context).is_some() {
            return self
                .dispatch_chord(Device::Pointer, chord, &[context], target, e.time)
                .map(|_| ());
        }

        // Click to focus
        let id = match target {
            Some(id) if e.detail == u8::from(Button::Left) => id,
            _ => return self.session.allow_events(Device::Pointer, true, e.time),
        };

        let replay = context == BindContext::Client && !self.config.global.swallow_first_click;
        self.session.allow_events(Device::Pointer, replay, e.time)?;
        if self.registry.focused() != Some(id) {
            self.try_focus(id)?;
        } else {
            let env = Env::new(&self.session, &*self.theme, &self.config);
            self.registry.raise(&env, id)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Bindings, Phase};
    use crate::{
        config::BindingConfig,
        error::Error,
        manager::action::Action,
        x::{
            input::{BindContext, Chord, ModMask},
            keysym,
            mock::{MockSession, Request, ROOT},
        },
    };
    use pretty_assertions::assert_eq;

    fn binding(chord: &str, context: BindContext, action: &str) -> BindingConfig {
        BindingConfig {
            chord: chord.to_owned(),
            context,
            action: action.to_owned(),
        }
    }

    #[test]
    fn keys_resolve_through_the_keymap() {
        let session = MockSession::new();
        session.map_key(keysym::from_name("q").unwrap(), 24);

        let bindings = Bindings::build(&session, &[
            binding("Mod4-q", BindContext::Client, "close"),
            binding("Mod4-F13", BindContext::Root, "quit"),
        ])
        .unwrap();

        // F13 has no keycode here
        assert_eq!(bindings.len(), 1);
        let mod4 = u16::from(ModMask::Mod4);
        assert_eq!(
            bindings.lookup(Chord::key(mod4, 24), BindContext::Client),
            Some(&Action::Close)
        );
        assert_eq!(bindings.lookup(Chord::key(mod4, 24), BindContext::Root), None);
        assert_eq!(bindings.phase(), Phase::Idle);
    }

    #[test]
    fn lock_keys_do_not_change_the_match() {
        let session = MockSession::new();
        session.map_key(keysym::from_name("Return").unwrap(), 36);
        let bindings =
            Bindings::build(&session, &[binding("Mod1-Return", BindContext::Root, "spawn xterm")])
                .unwrap();

        let state = u16::from(ModMask::Mod1) | u16::from(ModMask::Lock) | u16::from(ModMask::Mod2);
        assert!(bindings
            .lookup(Chord::key(state, 36), BindContext::Root)
            .is_some());
    }

    #[test]
    fn bad_entries_fail_the_table() {
        let session = MockSession::new();
        assert!(matches!(
            Bindings::build(&session, &[binding("Hyper-q", BindContext::Root, "close")]),
            Err(Error::UnknownBinding { .. })
        ));
        assert!(matches!(
            Bindings::build(&session, &[binding("Mod4-button1", BindContext::Root, "fly")]),
            Err(Error::UnknownCommand(_))
        ));
    }

    #[test]
    fn root_grabs_cover_every_lock_combination() {
        let session = MockSession::new();
        session.map_key(keysym::from_name("q").unwrap(), 24);
        let bindings = Bindings::build(&session, &[
            binding("Mod4-q", BindContext::Client, "close"),
            binding("Mod4-button3", BindContext::Frame, "close"),
        ])
        .unwrap();

        bindings.grab_root(&session).unwrap();
        let requests = session.requests();
        let keys = requests
            .iter()
            .filter(|r| matches!(r, Request::GrabKey(ROOT, _, 24)))
            .count();
        assert_eq!(keys, ModMask::ignored_combinations().len());
        // Frame buttons are grabbed on frames only
        assert!(!requests
            .iter()
            .any(|r| matches!(r, Request::GrabButton(ROOT, _, 3))));
    }
}
