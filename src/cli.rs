//! The command line arguments

use crate::utils::wants_color;
use clap::{crate_description, crate_version, AppSettings, Parser, Subcommand, ValueHint};
use once_cell::sync::Lazy;
use std::path::PathBuf;

/// Options for the [`xwmd`] program
#[derive(Parser, Default, Clone, Debug, PartialEq)]
#[clap(
    version = crate_version!(),
    about = <String as AsRef<str>>::as_ref(&APP_ABOUT),
    after_help =  <String as AsRef<str>>::as_ref(&AFTER_HELP),
    override_usage =  <String as AsRef<str>>::as_ref(&OVERRIDE_HELP),
    max_term_width = 100,
    color = clap::ColorChoice::Auto,
    global_setting = AppSettings::DeriveDisplayOrder,
    disable_help_subcommand = true,
    hide_possible_values = true,
    infer_subcommands = true,
)]
pub(crate) struct Opts {
    /// Display debugging messages on various levels
    #[clap(
        long,
        short,
        global = true,
        parse(from_occurrences),
        long_help = "
        Set the verbosity level of the program. There are 2 extra levels after the default (INFO). \
                     If `-v` is used, DEBUG messages are displayed, and if `-vv` is used TRACE \
                     messages are displayed. The verbosity can also be set with the `XWMD_LOG` \
                     environment variable"
    )]
    pub(crate) verbose: u8,

    /// Location of configuration file
    #[clap(
        long,
        short,
        takes_value = true,
        number_of_values = 1,
        value_name = "file",
        value_hint = ValueHint::FilePath,
        validator = |t| {
            PathBuf::from(t)
                .is_file()
                .then(|| ())
                .ok_or_else(|| String::from("must be a valid path"))
        },
        long_help = "\
        Specify the location of the configuration file. The default location is \
                `$XDG_CONFIG_HOME/xwmd/xwmd.yml`"
    )]
    pub(crate) config: Option<PathBuf>,

    #[clap(subcommand)]
    pub(crate) command: Option<Cmd>,
}

/// Subcommands talking to a running manager
#[derive(Subcommand, Clone, Debug, PartialEq)]
pub(crate) enum Cmd {
    /// Send an action to the running window manager
    #[clap(
        long_about = "\
        Send an action to the running window manager, e.g. `xwmd msg workspace 2` or \
                      `xwmd msg -w 0x1e00004 fullscreen toggle`. Without a window the action \
                      applies to the focused client"
    )]
    Msg {
        /// Window the action is about
        #[clap(
            long,
            short,
            value_name = "window",
            parse(try_from_str = parse_window)
        )]
        window: Option<u32>,

        /// Name of the action
        #[clap(value_name = "action")]
        action: String,

        /// Arguments of the action
        #[clap(value_name = "args", multiple_values = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

impl Cmd {
    /// The action and its arguments as one line. `spawn` keeps its command
    /// line as a single argument
    pub(crate) fn line(action: &str, args: &[String]) -> (String, Vec<String>) {
        if action == "spawn" && !args.is_empty() {
            return (action.to_owned(), vec![args.join(" ")]);
        }
        (action.to_owned(), args.to_vec())
    }
}

/// Read a window id in decimal or `0x` hexadecimal
fn parse_window(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|e| format!("`{}` is not a window id: {}", s, e))
}

// =============== Prettify Help ==================

/// Yellow ansi code
const YELLOW: &str = "\x1b[0;33m";
/// Green ansi code
const GREEN: &str = "\x1b[0;32m";
/// Bold-red ansi code
const BRED: &str = "\x1b[01;38;5;1m";
/// Reset colors
const RES: &str = "\x1b[0m";

/// Colored options used in the output of `--help`
pub(crate) static APP_ABOUT: Lazy<String> = Lazy::new(|| {
    wants_color()
        .then(|| {
            format!(
                "{}DESCRIPTION: {}{}{}",
                YELLOW,
                GREEN,
                crate_description!(),
                RES
            )
        })
        .unwrap_or_else(|| crate_description!().to_owned())
});

/// Colorized message to override the generated help message
pub(crate) static OVERRIDE_HELP: Lazy<String> = Lazy::new(|| {
    wants_color()
        .then(|| {
            format!(
                "{}xwmd{} [{}FLAGS{}/{}OPTIONS{}] [msg <action> [args..]]",
                BRED, RES, GREEN, RES, GREEN, RES
            )
        })
        .unwrap_or_else(|| String::from("xwmd [FLAGS/OPTIONS] [msg <action> [args..]]"))
});

/// Colorized message displayed after the help message
pub(crate) static AFTER_HELP: Lazy<String> = Lazy::new(|| {
    wants_color()
        .then(|| {
            format!(
                "See {}xwmd{} {}--help{} for longer explanations of some options.",
                BRED, RES, GREEN, RES
            )
        })
        .unwrap_or_else(|| {
            String::from("See xwmd --help for longer explanations of some options.")
        })
});
