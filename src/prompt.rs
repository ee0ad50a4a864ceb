//! The menu shown by the `switcher` action

use crate::{
    config::{Config, SHELL},
    monitor::workspace::Layout,
};
use anyhow::{Context, Result};
use itertools::Itertools;
use std::{
    io::Write,
    path::PathBuf,
    process::{Command, Stdio},
};

/// What the user did with a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PromptOutcome {
    /// Index of the chosen entry
    Selected(usize),
    Cancelled,
}

/// One workspace as listed by the switcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub(crate) name:    String,
    pub(crate) clients: usize,
    pub(crate) visible: bool,
}

impl Entry {
    /// The line shown in the menu
    pub(crate) fn line(&self) -> String {
        let mut line = self.name.clone();
        if self.clients > 0 {
            line.push_str(&format!(" [{}]", self.clients));
        }
        if self.visible {
            line.push_str(" *");
        }
        line
    }
}

/// A read-only snapshot of the workspaces, safe to hand to another thread
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct StateView {
    pub(crate) entries: Vec<Entry>,
}

impl StateView {
    pub(crate) fn new(layout: &Layout) -> Self {
        Self {
            entries: layout
                .workspaces()
                .iter()
                .map(|ws| Entry {
                    name:    ws.name.clone(),
                    clients: ws.members().len(),
                    visible: layout.is_visible(ws.id),
                })
                .collect(),
        }
    }

    /// Index of the entry a menu printed back, by line or by name
    pub(crate) fn position(&self, choice: &str) -> Option<usize> {
        let choice = choice.trim();
        self.entries
            .iter()
            .position(|e| e.line() == choice)
            .or_else(|| self.entries.iter().position(|e| e.name == choice))
    }
}

/// Asks the user to pick an entry. Runs off the event loop
pub(crate) trait Prompt: Send + Sync {
    fn choose(&self, view: &StateView) -> Result<PromptOutcome>;
}

/// A menu program reading entries on stdin and printing the chosen one,
/// e.g. `dmenu` or `rofi -dmenu`
#[derive(Debug, Clone)]
pub(crate) struct CommandPrompt {
    shell:   PathBuf,
    command: String,
}

impl CommandPrompt {
    /// The prompt named by `menu_command`, if any
    pub(crate) fn from_config(config: &Config) -> Option<Self> {
        let command = config.global.menu_command.clone()?;
        let shell = config
            .global
            .shell
            .clone()
            .unwrap_or_else(|| SHELL.to_path_buf());

        Some(Self { shell, command })
    }
}

impl Prompt for CommandPrompt {
    fn choose(&self, view: &StateView) -> Result<PromptOutcome> {
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to run menu `{}`", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            let lines = view.entries.iter().map(Entry::line).join("\n");
            stdin
                .write_all(lines.as_bytes())
                .context("failed to write the menu entries")?;
        }

        let output = child
            .wait_with_output()
            .context("failed to read the menu choice")?;
        if !output.status.success() {
            log::debug!("menu exited with {}", output.status);
            return Ok(PromptOutcome::Cancelled);
        }

        let choice = String::from_utf8_lossy(&output.stdout);
        Ok(view
            .position(&choice)
            .map_or(PromptOutcome::Cancelled, PromptOutcome::Selected))
    }
}

/// A prompt answering the same way every time
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedPrompt(pub(crate) PromptOutcome);

#[cfg(test)]
impl Prompt for FixedPrompt {
    fn choose(&self, _: &StateView) -> Result<PromptOutcome> {
        Ok(self.0)
    }
}
