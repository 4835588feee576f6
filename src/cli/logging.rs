// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Console output for the CLI.
//!
//! User-facing lines go through the colored macros below. Library diagnostics (the `log`
//! facade) are routed to stderr by [`init`].

use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;

/// Global verbosity flag.
static VERBOSE: AtomicBool = AtomicBool::new(true);

/// Set the global verbosity flag.
pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

/// Check if verbose output is enabled.
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Default library log level for a verbosity setting. `RUST_LOG` overrides it.
pub const fn default_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    }
}

/// Set verbosity and install the `env_logger` backend for library logs.
pub fn init(verbose: bool) {
    set_verbose(verbose);
    let _ = env_logger::Builder::new()
        .filter_level(default_level(verbose))
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}

/// Kind of a console line, deciding its prefix and color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Warning,
    Failure,
    Success,
    Heading,
}

/// Render a console line for `tone`.
pub fn styled(tone: Tone, message: &str) -> String {
    use colored::Colorize;

    match tone {
        Tone::Plain => message.to_string(),
        Tone::Warning => format!("{} {message}", "WARNING ⚠️".yellow().bold()),
        Tone::Failure => format!("{} {message}", "Error:".red().bold()),
        Tone::Success => format!("{} {message}", "✅".green()),
        Tone::Heading => format!("\n{}", message.cyan().bold()),
    }
}

/// Print a console line. Warnings and failures go to stderr; headings only show when verbose.
pub fn emit(tone: Tone, message: &str) {
    match tone {
        Tone::Warning | Tone::Failure => eprintln!("{}", styled(tone, message)),
        Tone::Heading if !is_verbose() => {}
        _ => println!("{}", styled(tone, message)),
    }
}

/// Print an info line.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::cli::logging::emit($crate::cli::logging::Tone::Plain, &format!($($arg)*))
    };
}

/// Print a warning to stderr.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::cli::logging::emit($crate::cli::logging::Tone::Warning, &format!($($arg)*))
    };
}

/// Print an error to stderr.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::cli::logging::emit($crate::cli::logging::Tone::Failure, &format!($($arg)*))
    };
}

/// Print a success line.
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::cli::logging::emit($crate::cli::logging::Tone::Success, &format!($($arg)*))
    };
}

/// Print a line only when verbose.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        if $crate::cli::logging::is_verbose() {
            $crate::cli::logging::emit($crate::cli::logging::Tone::Plain, &format!($($arg)*));
        }
    };
}

/// Print a section header when verbose.
#[macro_export]
macro_rules! section {
    ($($arg:tt)*) => {
        $crate::cli::logging::emit($crate::cli::logging::Tone::Heading, &format!($($arg)*))
    };
}
