//! Logging for the `modular` binary.
//!
//! The level comes from, in order: `--quiet` / `--verbose`, `MODULAR_LOG` or
//! `RUST_LOG`, the `log_level` setting, then `info`.

use modular_bundler::logging::{LogLevel, init_logging_from_env, init_logging_with};

/// Level for the given flags and configured `log_level`.
///
/// An unparseable setting falls back to `info` with a warning once logging
/// is up.
pub fn resolve_level(
    verbose: bool,
    quiet: bool,
    configured: Option<&str>,
) -> (LogLevel, Option<String>) {
    if verbose || quiet {
        return (LogLevel::from_flags(verbose, quiet), None);
    }
    match configured.map(str::parse::<LogLevel>) {
        Some(Ok(level)) => (level, None),
        Some(Err(message)) => (LogLevel::Info, Some(message)),
        None => (LogLevel::Info, None),
    }
}

/// Install the global subscriber. Only the first call has an effect.
pub fn init_logger(level: LogLevel, explicit: bool, no_color: bool) {
    let ansi = !no_color && should_use_colors();
    if explicit {
        init_logging_with(level, ansi);
    } else {
        init_logging_from_env(level, ansi);
    }
}

/// `NO_COLOR` disables colors, `FORCE_COLOR` forces them; otherwise they
/// follow the terminal.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}
