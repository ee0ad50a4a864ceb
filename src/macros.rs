//! Macros for error/warning printing

/// Expand to an error message
#[macro_export]
macro_rules! xwm_error {
    ($($err:tt)*) => ({
        use colored::Colorize;
        eprintln!("{}: {}", "[xwmd error]".red().bold(), format!($($err)*));
    })
}

/// Expand to a fatal message and leave with exit code 1
#[macro_export]
macro_rules! xwm_fatal {
    ($($err:tt)*) => ({
        use colored::Colorize;
        eprintln!("{}: {}", "[xwmd fatal]".yellow().bold(), format!($($err)*));
        std::process::exit(1);
    })
}
