//! Work done off the event loop: configuration reloads, the switcher menu
//! and spawned commands. Results come back through a channel and a wake-up

use crate::{
    config::{Config, SHELL},
    core::{decoration::DefaultTheme, WorkspaceId},
    error::{Error, WmResult},
    manager::{binding::Bindings, WindowManager},
    monitor::{client::ClientState, Env},
    prompt::{CommandPrompt, Prompt, PromptOutcome, StateView},
    x::{
        event::XEvent,
        input::BindContext,
        session::{DisplaySession, Waker},
    },
};
use crossbeam_channel::{Receiver, Sender};
use std::{
    io,
    path::PathBuf,
    process::{Command, ExitStatus},
    sync::Arc,
    thread,
};

/// A finished background job
#[derive(Debug)]
pub(crate) enum Outcome {
    /// A configuration snapshot that parsed and validated
    Reloaded(Box<Config>),
    ReloadFailed(String),
    /// The switcher closed
    Chosen(PromptOutcome),
    PromptFailed(String),
    /// A spawned command exited
    Exited {
        command: String,
        status:  io::Result<ExitStatus>,
    },
}

/// Runs jobs on their own threads and wakes the loop when one finishes
#[derive(Debug)]
pub(crate) struct Worker {
    tx:    Sender<Outcome>,
    rx:    Receiver<Outcome>,
    waker: Arc<Waker>,
}

impl Worker {
    pub(crate) fn new(waker: Waker) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            waker: Arc::new(waker),
        }
    }

    /// Run `job` on a named thread
    pub(crate) fn run<F>(&self, name: &str, job: F) -> WmResult<()>
    where
        F: FnOnce() -> Outcome + Send + 'static,
    {
        let tx = self.tx.clone();
        let waker = Arc::clone(&self.waker);

        thread::Builder::new()
            .name(format!("xwmd-{}", name))
            .spawn(move || {
                if tx.send(job()).is_ok() {
                    waker.wake();
                }
            })
            .map(|_| ())
            .map_err(|e| Error::protocol("spawn thread", e))
    }

    /// Results that are ready, without blocking
    pub(crate) fn drain(&self) -> Vec<Outcome> {
        self.rx.try_iter().collect()
    }
}

impl<S: DisplaySession> WindowManager<S> {
    /// Load the configuration again on a worker thread
    pub(crate) fn reload(&mut self) -> WmResult<()> {
        let path: Option<PathBuf> = self.config_path.clone();
        log::info!("reloading the configuration");

        self.worker.run("reload", move || {
            match Config::load_from(path.as_deref()) {
                Ok(config) => Outcome::Reloaded(Box::new(config)),
                Err(e) => Outcome::ReloadFailed(format!("{:#}", e)),
            }
        })
    }

    /// Ask the menu for a workspace to show
    pub(crate) fn open_switcher(&mut self) -> WmResult<()> {
        let prompt = match &self.prompt {
            Some(prompt) => Arc::clone(prompt),
            None => {
                log::warn!("`switcher` needs `menu-command` to be set");
                return Ok(());
            },
        };
        let view = StateView::new(&self.layout);

        self.worker.run("switcher", move || match prompt.choose(&view) {
            Ok(outcome) => Outcome::Chosen(outcome),
            Err(e) => Outcome::PromptFailed(format!("{:#}", e)),
        })
    }

    /// Run a command line in the configured shell
    pub(crate) fn spawn(&mut self, command: &str) -> WmResult<()> {
        let shell = self
            .config
            .global
            .shell
            .clone()
            .unwrap_or_else(|| SHELL.to_path_buf());
        log::debug!("spawning `{}` in {}", command, shell.display());

        let mut child = Command::new(&shell)
            .arg("-c")
            .arg(command)
            .spawn()
            .map_err(|e| Error::protocol("spawn", format!("`{}`: {}", command, e)))?;

        // Reap the child so it does not linger as a zombie
        let command = command.to_owned();
        self.worker.run("spawn", move || Outcome::Exited {
            status: child.wait(),
            command,
        })
    }

    /// Apply every finished job. A job that fails to apply does not hold
    /// back the others
    pub(crate) fn on_wakeup(&mut self, _: XEvent) -> WmResult<()> {
        for outcome in self.worker.drain() {
            if let Err(e) = self.apply_outcome(outcome) {
                if e.is_fatal() {
                    return Err(e);
                }
                log::warn!("failed to apply a finished job: {}", e);
            }
        }

        Ok(())
    }

    fn apply_outcome(&mut self, outcome: Outcome) -> WmResult<()> {
        match outcome {
            Outcome::Reloaded(config) => self.apply_config(*config)?,
            Outcome::ReloadFailed(e) => log::warn!("keeping the old configuration: {}", e),
            Outcome::Chosen(PromptOutcome::Selected(idx)) =>
                if idx < self.layout.workspaces().len() {
                    self.show_workspace(WorkspaceId(idx))?;
                },
            Outcome::Chosen(PromptOutcome::Cancelled) => log::debug!("switcher cancelled"),
            Outcome::PromptFailed(e) => log::warn!("switcher failed: {}", e),
            Outcome::Exited { command, status } => match status {
                Ok(status) if status.success() => log::debug!("`{}` exited", command),
                Ok(status) => log::warn!("`{}` exited with {}", command, status),
                Err(e) => log::warn!("lost track of `{}`: {}", command, e),
            },
        }

        Ok(())
    }

    /// Swap in a new configuration snapshot between events.
    ///
    /// Nothing changes unless the theme and every binding can be built
    pub(crate) fn apply_config(&mut self, config: Config) -> WmResult<()> {
        let theme = match DefaultTheme::new(&config.theme) {
            Ok(theme) => theme,
            Err(e) => {
                log::warn!("keeping the old configuration: {}", e);
                return Ok(());
            },
        };
        let bindings = match Bindings::build(&self.session, &config.bindings) {
            Ok(bindings) => bindings,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::warn!("keeping the old configuration: {}", e);
                return Ok(());
            },
        };

        self.theme = Box::new(theme);
        self.bindings = bindings;
        self.prompt = CommandPrompt::from_config(&config).map(|p| Arc::new(p) as Arc<dyn Prompt>);
        self.layout.rename(&config.global.workspaces);
        self.config = config;

        self.grab_all()?;
        let env = Env::new(&self.session, &*self.theme, &self.config);
        self.registry.redecorate(&env)?;
        self.publish_desktops()?;

        log::info!("configuration reloaded");
        Ok(())
    }

    /// Renew the grabs on the root window and every managed window
    pub(crate) fn grab_all(&self) -> WmResult<()> {
        self.bindings.grab_root(&self.session)?;
        let managed = self
            .registry
            .iter()
            .filter(|(_, c)| c.state() != ClientState::Withdrawn);
        for (_, client) in managed {
            let window = client.handle.id();
            self.session.ungrab_all(window)?;
            self.bindings
                .grab_window(&self.session, window, BindContext::Client)?;
            if let Some(frame) = client.frame() {
                self.session.ungrab_all(frame.id())?;
                self.bindings
                    .grab_window(&self.session, frame.id(), BindContext::Frame)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Outcome, Worker};
    use crate::{
        config::Config,
        core::WorkspaceId,
        geometry::Rectangle,
        manager::tests::{command, manager, press_map},
        prompt::{FixedPrompt, PromptOutcome},
        x::{event::XEvent, mock::ROOT, property::Ewmh, session::Waker},
    };
    use pretty_assertions::assert_eq;
    use std::{sync::Arc, time::Duration};

    #[test]
    fn results_come_back_through_the_channel() {
        let worker = Worker::new(Waker::noop());
        worker
            .run("test", || Outcome::Chosen(PromptOutcome::Selected(1)))
            .unwrap();

        let outcome = worker.rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(outcome, Outcome::Chosen(PromptOutcome::Selected(1))));
        assert!(worker.drain().is_empty());
    }

    #[test]
    fn switcher_choice_shows_the_workspace() {
        let mut wm = manager();
        wm.prompt = Some(Arc::new(FixedPrompt(PromptOutcome::Selected(2))));
        command(&mut wm, ROOT, "switcher");

        let outcome = wm.worker.rx.recv_timeout(Duration::from_secs(5)).unwrap();
        wm.worker.tx.send(outcome).unwrap();
        wm.handle_event(XEvent::Wakeup).unwrap();

        assert!(wm.layout.is_visible(WorkspaceId(2)));
    }

    #[test]
    fn failed_outcome_does_not_drop_the_rest() {
        let mut wm = manager();
        press_map(&mut wm, 0x30, Rectangle::new(100, 100, 300, 200));
        command(&mut wm, 0x30, "send-to-workspace 2");
        // Showing workspace 2 again has to focus a window the server lost
        wm.session.remove_window(0x30);

        wm.worker
            .tx
            .send(Outcome::Chosen(PromptOutcome::Selected(1)))
            .unwrap();
        wm.worker
            .tx
            .send(Outcome::Chosen(PromptOutcome::Selected(2)))
            .unwrap();
        wm.handle_event(XEvent::Wakeup).unwrap();

        assert!(wm.layout.is_visible(WorkspaceId(2)));
        assert!(wm.worker.drain().is_empty());
    }

    #[test]
    fn reload_renames_and_appends_workspaces() {
        let mut wm = manager();
        let mut config = Config::default();
        config.global.workspaces = ["web", "mail", "chat", "music", "games"]
            .iter()
            .map(ToString::to_string)
            .collect();

        wm.apply_config(config).unwrap();
        assert_eq!(wm.layout.workspaces().len(), 5);
        assert_eq!(
            wm.session.last_property(|p| matches!(p, Ewmh::Desktops(_))),
            Some(Ewmh::Desktops(vec![
                String::from("web"),
                String::from("mail"),
                String::from("chat"),
                String::from("music"),
                String::from("games")
            ]))
        );
    }

    #[test]
    fn broken_theme_keeps_the_old_snapshot() {
        let mut wm = manager();
        let mut config = Config::default();
        config.theme.focused_color = String::from("not a color");
        config.global.workspaces = vec![String::from("only")];

        wm.apply_config(config).unwrap();
        assert_eq!(wm.layout.workspaces()[0].name, "1");
        assert_eq!(wm.config.global.workspaces.len(), 4);
    }
}
