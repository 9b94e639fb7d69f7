//! Command line plumbing shared by the workspace binaries: argument styles,
//! the verbosity flag and the tracing subscriber.

use std::sync::Mutex;

pub use clap;

pub mod verbose {
    pub use clap_verbosity_flag::{Level, Verbosity};
}

/// Colored help output used by every binary in the workspace.
pub fn get_styles() -> clap::builder::Styles {
    use clap::builder::styling::{AnsiColor, Effects, Styles};
    Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Red.on_default())
}

/// Map the `-v`/`-q` count to a tracing level. The mapping is one step
/// quieter than the flag suggests, so a bare invocation only shows errors.
pub fn verbose_level_to_trace(level: Option<verbose::Level>) -> &'static tracing::Level {
    match level {
        Some(verbose::Level::Error) => &tracing::Level::WARN,
        Some(verbose::Level::Warn) => &tracing::Level::INFO,
        Some(verbose::Level::Info) => &tracing::Level::DEBUG,
        Some(verbose::Level::Debug) => &tracing::Level::TRACE,
        Some(verbose::Level::Trace) => &tracing::Level::TRACE,
        None => &tracing::Level::ERROR,
    }
}

/// Install the global subscriber.
///
/// Logs go to stderr unless `log_file` is given, in which case they are
/// written to it as JSON lines. Calling this twice keeps the first
/// subscriber.
pub fn logging_setup(level: &tracing::Level, log_file: Option<&std::fs::File>) {
    let builder = tracing_subscriber::fmt()
        .with_max_level(*level)
        .with_target(false);

    let result = match log_file.map(|file| file.try_clone()) {
        Some(Ok(file)) => builder.json().with_writer(Mutex::new(file)).try_init(),
        Some(Err(err)) => {
            eprintln!("could not clone log file handle, logging to stderr: {err}");
            builder.with_writer(std::io::stderr).try_init()
        }
        None => builder
            .without_time()
            .with_writer(std::io::stderr)
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
