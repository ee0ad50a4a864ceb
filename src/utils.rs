//! Various helper-utilities

use crate::{cli::Opts, config::Config};
use anyhow::Result;
use clap::crate_name;
use flexi_logger::{
    style,
    AdaptiveFormat,
    Age,
    Cleanup,
    Criterion,
    DeferredNow,
    Duplicate,
    FileSpec,
    Level,
    Logger,
    LoggerHandle,
    Naming,
    Record,
    WriteMode,
};
use serde::{de, Deserialize};
use std::{
    env,
    io::{self, Write},
    panic,
    path::{Path, PathBuf},
};
use which::which;

/// Shorter way of testing if the user wants color for the output of `--help`
pub(crate) fn wants_color() -> bool {
    env::var_os("NO_COLOR").is_none()
}

/// The log level: `XWMD_LOG` wins over the number of `-v` flags
fn log_spec(verbose: u8) -> String {
    env::var("XWMD_LOG").unwrap_or_else(|_| {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
        .to_owned()
    })
}

/// Initializes logging for this crate. Returns the handle that must outlive
/// the program, and the directory log files go to
pub(crate) fn initialize_logging(config: &Config, args: &Opts) -> Result<(LoggerHandle, PathBuf)> {
    /// Customize the format of the log (colored)
    fn colored_format(
        w: &mut dyn Write,
        _now: &mut DeferredNow,
        record: &Record,
    ) -> Result<(), io::Error> {
        let level = record.level();
        write!(
            w,
            "{:<5} [{}:{}]: {}",
            style(level, level),
            style(Level::Trace, record.file().unwrap_or("<unnamed>")),
            record.line().unwrap_or(0),
            &record.args()
        )
    }

    /// Customize the format of the log (uncolored)
    fn uncolored_format(
        w: &mut dyn Write,
        now: &mut DeferredNow,
        record: &Record,
    ) -> Result<(), io::Error> {
        // Messages may carry colors from `colored`
        write!(
            w,
            "[{:>}] {:<5} [{}:{}]: {}",
            now.now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.file().unwrap_or("<unnamed>"),
            record.line().unwrap_or(0),
            String::from_utf8(strip_ansi_escapes::strip(
                &record.args().to_string().as_bytes()
            )?)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        )
    }

    if cfg!(debug_assertions) {
        better_panic::install();
        panic::set_hook(Box::new(|panic_info| {
            better_panic::Settings::auto().create_panic_handler()(panic_info);
        }));
    }

    let log_dir = config
        .global
        .log_dir
        .clone()
        .unwrap_or_else(|| env::temp_dir().join(crate_name!()));

    let mut logger = Logger::try_with_str(log_spec(args.verbose))?
        .write_mode(WriteMode::BufferAndFlush)
        .adaptive_format_for_stderr(AdaptiveFormat::Custom(uncolored_format, colored_format))
        .set_palette(String::from("9;11;14;5;13"));

    if config.global.log_to_file {
        logger = logger
            .duplicate_to_stderr(Duplicate::All)
            .rotate(
                Criterion::AgeOrSize(Age::Day, 50_000_000),
                Naming::Numbers,
                Cleanup::KeepLogFiles(2),
            )
            .log_to_file(
                FileSpec::default()
                    .basename(crate_name!())
                    .directory(&log_dir),
            )
            .format_for_files(uncolored_format);
    }

    Ok((logger.start()?, log_dir))
}

/// Expand `~` and environment variables in a path
fn expand<E: de::Error>(value: &Path) -> Result<PathBuf, E> {
    shellexpand::full(&value.to_string_lossy())
        .map(|p| PathBuf::from(p.into_owned()))
        .map_err(|e| {
            de::Error::invalid_value(
                de::Unexpected::Str(value.to_string_lossy().as_ref()),
                &e.to_string().as_str(),
            )
        })
}

/// [`Deserialize`] something that has a shell variable
#[allow(single_use_lifetimes)]
pub(crate) fn deserialize_shellexpand<'de, D>(d: D) -> Result<Option<PathBuf>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let value = PathBuf::deserialize(d)?;
    expand(&value).map(Some)
}

/// [`Deserialize`] a program into an absolute path, looking bare names up
/// in `$PATH`
#[allow(single_use_lifetimes)]
pub(crate) fn deserialize_absolute_path<'de, D>(d: D) -> Result<Option<PathBuf>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let value = expand::<D::Error>(&PathBuf::deserialize(d)?)?;

    if value.is_absolute() {
        return value
            .canonicalize()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("no such file: {}", value.display())));
    }

    which(&value).map(Some).map_err(|_| {
        de::Error::invalid_value(
            de::Unexpected::Str(value.to_string_lossy().as_ref()),
            &"an absolute path or a program in $PATH",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::log_spec;
    use crate::config::GlobalSettings;
    use std::{env, path::PathBuf};

    #[test]
    fn verbosity_picks_the_level() {
        if env::var_os("XWMD_LOG").is_some() {
            return;
        }
        assert_eq!(log_spec(0), "info");
        assert_eq!(log_spec(1), "debug");
        assert_eq!(log_spec(5), "trace");
    }

    #[test]
    fn shell_is_resolved_through_path() {
        let global: GlobalSettings = serde_yaml::from_str("shell: sh").unwrap();
        let shell = global.shell.unwrap();
        assert!(shell.is_absolute());
        assert!(shell.ends_with("sh"));
    }

    #[test]
    fn log_dir_expands_variables() {
        env::set_var("XWMD_TEST_LOG_DIR", "/tmp/xwmd-logs");
        let global: GlobalSettings = serde_yaml::from_str("log-dir: $XWMD_TEST_LOG_DIR/run").unwrap();
        assert_eq!(global.log_dir, Some(PathBuf::from("/tmp/xwmd-logs/run")));
    }
}
