//! Subscriber setup for binaries embedding the bundler.
//!
//! Only compiled with the `logging` feature. Libraries should leave the
//! subscriber to the application and just consume the tracing events.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Overrides the level of [`init_logging_from_env`], `RUST_LOG` syntax.
pub const LOG_ENV: &str = "MODULAR_LOG";

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    /// Progress of each target.
    #[default]
    Info,
    /// Plugin decisions, relocations and written files.
    Debug,
}

impl LogLevel {
    /// Level selected by the usual `--quiet` / `--verbose` pair.
    ///
    /// `quiet` wins when both are set.
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (_, true) => LogLevel::Error,
            (true, false) => LogLevel::Debug,
            (false, false) => LogLevel::Info,
        }
    }

    fn directive(self) -> &'static str {
        match self {
            LogLevel::Silent => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    /// Filter that keeps bundler internals at `warn` unless debugging.
    fn filter(self) -> EnvFilter {
        let mut filter = EnvFilter::new(self.directive());
        if self < LogLevel::Debug {
            for noisy in ["rolldown", "rolldown_plugin", "rolldown_common"] {
                if let Ok(directive) = format!("{noisy}=warn").parse() {
                    filter = filter.add_directive(directive);
                }
            }
        }
        filter
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" | "off" | "none" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "trace" | "verbose" => Ok(LogLevel::Debug),
            other => Err(format!("Unknown log level '{other}'")),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.directive())
    }
}

fn install(filter: EnvFilter, ansi: bool) {
    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .without_time()
                    .with_ansi(ansi)
                    .with_writer(std::io::stderr),
            )
            .try_init();
    });
}

/// Install a stderr subscriber at `level`.
///
/// Only the first call in a process has an effect.
///
/// ```rust,no_run
/// use modular_bundler::logging::{LogLevel, init_logging};
///
/// init_logging(LogLevel::from_flags(false, false));
/// ```
pub fn init_logging(level: LogLevel) {
    init_logging_with(level, true);
}

/// Like [`init_logging`], with colors on or off.
pub fn init_logging_with(level: LogLevel, ansi: bool) {
    install(level.filter(), ansi);
}

/// Install a subscriber configured by [`LOG_ENV`], falling back to
/// `fallback` when it is unset or invalid.
pub fn init_logging_from_env(fallback: LogLevel, ansi: bool) {
    let filter = env_filter().unwrap_or_else(|| fallback.filter());
    install(filter, ansi);
}

/// The filter from [`LOG_ENV`], else `RUST_LOG`, if set and valid.
pub fn env_filter() -> Option<EnvFilter> {
    [LOG_ENV, "RUST_LOG"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .and_then(|value| EnvFilter::try_new(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names() {
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("off".parse::<LogLevel>().unwrap(), LogLevel::Silent);
        assert_eq!(" verbose ".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn quiet_beats_verbose() {
        assert_eq!(LogLevel::from_flags(true, true), LogLevel::Error);
        assert_eq!(LogLevel::from_flags(true, false), LogLevel::Debug);
        assert_eq!(LogLevel::from_flags(false, false), LogLevel::Info);
    }

    #[test]
    fn levels_are_ordered_by_verbosity() {
        assert!(LogLevel::Silent < LogLevel::Error);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert_eq!(LogLevel::Silent.to_string(), "off");
    }
}
