//! Error types for configuration loading and target resolution.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find a modular root above {0} (no package.json with \"modular\": {{ \"type\": \"root\" }})")]
    RootNotFound(PathBuf),

    #[error("no workspace target named '{0}'")]
    TargetNotFound(String),

    #[error("'{name}' is a {found} package; only app and view targets can be built")]
    UnsupportedTargetType { name: String, found: String },

    #[error("entry point not found in {0} (looked for index.tsx, index.ts, index.jsx, index.js)")]
    EntryNotFound(PathBuf),

    #[error("path must be absolute: {0}")]
    RelativePath(PathBuf),

    #[error("invalid package manifest {path}: {message}")]
    InvalidManifest { path: PathBuf, message: String },

    #[error("invalid config value for '{field}': {hint}")]
    InvalidValue { field: String, hint: String },

    #[error("failed to load settings: {0}")]
    Settings(#[from] Box<figment::Error>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Settings(Box::new(err))
    }
}
