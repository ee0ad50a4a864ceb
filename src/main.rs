//! A stacking X11 window manager with a scriptable command channel

// manager -> registry -> client
//         -> layout   -> head -> workspace

#![deny(
    clippy::all,
    clippy::correctness,
    clippy::perf,
    clippy::style,
    absolute_paths_not_starting_with_crate,
    anonymous_parameters,
    bad_style,
    ellipsis_inclusive_range_patterns,
    keyword_idents,
    macro_use_extern_crate,
    non_shorthand_field_patterns,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unsafe_code,
    while_true
)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::redundant_pub_crate,
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::multiple_inherent_impl,
    clippy::similar_names,
    clippy::struct_excessive_bools,
    clippy::too_many_lines,
    clippy::upper_case_acronyms
)]
#![cfg_attr(
    any(test),
    allow(
        clippy::expect_used,
        clippy::panic,
        clippy::unwrap_used,
        clippy::wildcard_enum_match_arm,
    )
)]

mod cli;
mod config;
mod core;
mod error;
mod geometry;
mod macros;
mod manager;
mod monitor;
mod prompt;
mod rule;
mod utils;
mod x;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cmd, Opts};
use colored::Colorize;
use config::Config;
use error::Error;
use manager::{
    action::Arg,
    command::CommandMessage,
    WindowManager,
};
use x::{
    session::DisplaySession,
    xconnection::XConnection,
};

fn main() {
    let args = Opts::parse();

    if let Err(e) = run(&args) {
        if let Some(Error::AlreadyRunning) = e.downcast_ref::<Error>() {
            xwm_error!("stop the running window manager first");
        }
        xwm_fatal!("{:#}", e);
    }
}

/// Start the manager, or talk to the one that is running
fn run(args: &Opts) -> Result<()> {
    if let Some(Cmd::Msg {
        window,
        action,
        args: words,
    }) = &args.command
    {
        return send_message(*window, action, words);
    }

    let config = Config::load_from(args.config.as_deref())?;
    let (_logger, log_dir) = utils::initialize_logging(&config, args)?;
    if config.global.log_to_file {
        log::info!("logging to {}", log_dir.display());
    }
    log::debug!("{}: {:#?}", "Configuration options".bright_blue(), config);

    let conn = XConnection::connect().context("failed to connect to the X-Server")?;
    conn.become_wm()?;
    conn.init()?;

    let mut wm = WindowManager::new(conn, config, args.config.clone())?;
    wm.init()?;

    match wm.run() {
        Ok(()) => log::info!("shutting down"),
        Err(e) if e.is_fatal() => log::info!("the display went away: {}", e),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Encode an action and send it to the running manager
fn send_message(window: Option<u32>, action: &str, words: &[String]) -> Result<()> {
    let conn = XConnection::connect().context("failed to connect to the X-Server")?;
    let target = window.unwrap_or_else(|| conn.root());

    let (action, words) = Cmd::line(action, words);
    let message = CommandMessage {
        target,
        action,
        args: words.iter().map(|w| Arg::from_word(w)).collect(),
    };

    // Report what the manager would reject before anything is sent
    message.clone().into_action()?;

    let data = message.encode(&conn)?;
    conn.send_command(target, data)?;
    conn.flush().context("failed to send the message")
}
