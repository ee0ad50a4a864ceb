//! Configuration options

use crate::{
    error::{Error, WmResult},
    manager::action::Action,
    rule::Rule,
    utils::{deserialize_absolute_path, deserialize_shellexpand},
    x::input::{BindContext, ChordSpec},
};
use anyhow::{Context, Result};
use colored::Colorize;
use directories::BaseDirs;
use format_serde_error::SerdeError;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::{
    collections::HashSet,
    env,
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use which::which;

/// Configuration file name
const CONFIG_FILE: &str = "xwmd.yml";

/// Default shell to run commands within
pub(crate) static SHELL: Lazy<PathBuf> = Lazy::new(|| {
    PathBuf::from(env::var("XWMD_SHELL").unwrap_or_else(|_| {
        env::var("SHELL").unwrap_or_else(|_| {
            if let Ok(bash) = which("bash") {
                bash.to_string_lossy().to_string()
            } else if let Ok(dash) = which("dash") {
                dash.to_string_lossy().to_string()
            } else {
                String::from("/bin/sh")
            }
        })
    }))
});

// =============== GlobalSettings ================= [[[

/// Global configuration settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct GlobalSettings {
    /// The shell to use for running commands
    #[serde(deserialize_with = "deserialize_absolute_path")]
    pub(crate) shell: Option<PathBuf>,

    /// Whether logs should be written to a file
    #[serde(alias = "log-to-file")]
    pub(crate) log_to_file: bool,

    /// The directory to write the log to
    #[serde(alias = "log-dir", deserialize_with = "deserialize_shellexpand")]
    pub(crate) log_dir: Option<PathBuf>,

    // ====================== Window Manager Specific ======================
    /// Names of the workspaces, in order
    pub(crate) workspaces: Vec<String>,

    /// Workspace new clients are placed on when no rule names one. Without
    /// it, clients start on the workspace under the pointer
    #[serde(alias = "default-workspace")]
    pub(crate) default_workspace: Option<String>,

    /// Don't replay the click that focuses a client
    #[serde(alias = "swallow-first-click")]
    pub(crate) swallow_first_click: bool,

    /// Menu used by the `switcher` action. It reads one entry per line and
    /// prints the chosen one
    #[serde(alias = "menu-command")]
    pub(crate) menu_command: Option<String>,
} // ]]] === Global Settings ===

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            shell:               Some(SHELL.to_path_buf()),
            log_to_file:         false,
            log_dir:             None,
            workspaces:          ["1", "2", "3", "4"].iter().map(ToString::to_string).collect(),
            default_workspace:   None,
            swallow_first_click: false,
            menu_command:        None,
        }
    }
}

// ================= ThemeConfig ================== [[[

/// The `theme` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct ThemeConfig {
    /// Size of the border around the window
    #[serde(alias = "border-width")]
    pub(crate) border_width:    u32,
    /// Height of the bar above the window; `0` disables it
    #[serde(alias = "titlebar-height")]
    pub(crate) titlebar_height: u32,
    /// Color of the frame of the focused window
    #[serde(alias = "focused-color")]
    pub(crate) focused_color:   String,
    /// Color of the frame of every other window
    #[serde(alias = "unfocused-color")]
    pub(crate) unfocused_color: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            border_width:    1,
            titlebar_height: 0,
            focused_color:   String::from("#A98698"),
            unfocused_color: String::from("#4C566A"),
        }
    }
}

// ]]] === ThemeConfig ===

// =================== Binding ==================== [[[

/// A binding as written in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct BindingConfig {
    /// e.g. `Mod4-Shift-q` or `Mod1-button1`
    pub(crate) chord:   String,
    /// Where the chord has to be pressed
    #[serde(default)]
    pub(crate) context: BindContext,
    /// Command line of an action, e.g. `workspace 2`
    pub(crate) action:  String,
}

// ]]] === Binding ===

// =================== Config ===================== [[[

/// Configuration file to parse
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Config {
    /// Global settings
    #[serde(flatten)]
    pub(crate) global: GlobalSettings,

    /// Frame sizes and colors
    #[serde(default)]
    pub(crate) theme: ThemeConfig,

    /// Chords and the actions they run
    #[serde(default)]
    pub(crate) bindings: Vec<BindingConfig>,

    /// Rules applied to new clients, in order
    #[serde(default)]
    pub(crate) rules: Vec<Rule>,
}

impl Config {
    /// Create the default configuration file
    pub(crate) fn create_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::debug!("Creating configuration path: {}", path.display());
            fs::create_dir_all(path).context("unable to create configuration directory")?;
        }

        let path = path.join(CONFIG_FILE);
        log::debug!("{}: {}", "Configuration path".bright_blue(), path.display());

        if !path.is_file() {
            let initialization = include_str!("../example/xwmd.yml");

            let mut config_file: fs::File = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .open(&path)
                .with_context(|| format!("could not create xwmd config: '{}'", path.display()))?;

            config_file
                .write_all(initialization.as_bytes())
                .with_context(|| format!("could not create xwmd config: '{}'", path.display()))?;
            config_file.flush()?;
        }

        Self::load(path)
    }

    /// Load the configuration file from a given path
    pub(crate) fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: '{}'", path.display()))?;
        Self::parse(file)
    }

    /// Parse and validate the contents of a configuration file
    pub(crate) fn parse(file: String) -> Result<Self> {
        let config: Self = serde_yaml::from_str(&file).map_err(|e| SerdeError::new(file, e))?;
        config.validate()?;

        Ok(config)
    }

    /// Load the default configuration file
    pub(crate) fn load_default() -> Result<Self> {
        let path = config_dir().context("could not detect the user's home directory")?;
        log::debug!("loading default config: {}", path.display());
        Self::create_default(path)
    }

    /// Load the given path, or the default file
    pub(crate) fn load_from(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(Self::load_default, Self::load)
    }

    /// Reject a snapshot the manager cannot run with
    pub(crate) fn validate(&self) -> WmResult<()> {
        let invalid = |reason: String| Err(Error::Configuration(reason));

        if self.global.workspaces.is_empty() {
            return invalid(String::from("at least one workspace is required"));
        }

        let mut seen = HashSet::new();
        for name in &self.global.workspaces {
            if !seen.insert(name) {
                return invalid(format!("workspace `{}` is named twice", name));
            }
        }

        let known = |name: &String| self.global.workspaces.contains(name);

        if let Some(ws) = self.global.default_workspace.as_ref().filter(|ws| !known(ws)) {
            return invalid(format!("default workspace `{}` does not exist", ws));
        }

        for rule in &self.rules {
            if let Some(ws) = rule.workspace.as_ref().filter(|ws| !known(ws)) {
                return invalid(format!("rule names the unknown workspace `{}`", ws));
            }
        }

        for binding in &self.bindings {
            binding.chord.parse::<ChordSpec>()?;
            binding.action.parse::<Action>()?;
        }

        Ok(())
    }
} // ]]] === Config ===

// ================ Project Dirs ================== [[[

/// Get a directory, letting `env_var` override the XDG location
fn get_dir(env_var: &str, var: &str, join: &str) -> Option<PathBuf> {
    env::var_os(env_var)
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .or_else(|| {
            env::var_os(var)
                .map(PathBuf::from)
                .filter(|p| p.is_absolute())
                .or_else(|| BaseDirs::new().map(|p| p.home_dir().join(join)))
                .map(|p| p.join(env!("CARGO_PKG_NAME")))
        })
}

/// The `$XDG_CONFIG_HOME/xwmd` directory
pub(crate) fn config_dir() -> Option<PathBuf> {
    get_dir("XWMD_CONFIG_DIR", "XDG_CONFIG_HOME", ".config")
}

// ]]] === Project Dirs ===
