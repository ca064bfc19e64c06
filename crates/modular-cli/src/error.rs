//! Errors of the `modular` command line.
//!
//! Commands return [`CliError`]; `main` turns it into a [`miette::Report`]
//! with [`cli_error_to_miette`] so bundler diagnostics keep their codes and
//! help text.

use miette::Report;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] modular_config::ConfigError),

    #[error(transparent)]
    Build(#[from] modular_bundler::Error),

    /// The test runner exited unsuccessfully.
    #[error("\u{2715} Modular test did not pass")]
    TestFailed,

    /// An external program could not be started or queried.
    #[error("Failed to run {program}: {message}")]
    Command { program: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn command(program: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CliError::Command {
            program: program.into(),
            message: message.to_string(),
        }
    }
}

/// Convert a [`CliError`] into a report for the terminal.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        // Compile diagnostics were already logged while the build failed.
        CliError::Build(e) => Report::new(e),
        CliError::Config(e) => miette::miette!(
            help = config_help(&e),
            "Configuration error: {e}"
        ),
        CliError::Command { program, message } => miette::miette!(
            help = "Make sure the program is installed and on your PATH.",
            "Failed to run {program}: {message}"
        ),
        other => miette::miette!("{other}"),
    }
}

fn config_help(err: &modular_config::ConfigError) -> &'static str {
    use modular_config::ConfigError;
    match err {
        ConfigError::RootNotFound(_) => {
            "Run modular inside a monorepo whose root package.json has \"modular\": { \"type\": \"root\" }, or pass --cwd."
        }
        ConfigError::TargetNotFound(_) => {
            "Targets are addressed by package name or by their directory relative to the modular root."
        }
        ConfigError::UnsupportedTargetType { .. } => {
            "Set \"modular\": { \"type\": \"app\" } or \"view\" in the target's package.json."
        }
        ConfigError::EntryNotFound(_) => "Create src/index.tsx (or .ts, .jsx, .js) in the target.",
        _ => "Check modular.config.toml and the MODULAR_* environment variables.",
    }
}
