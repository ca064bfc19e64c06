//! The `modular` command line.
//!
//! - [`cli`] - argument definitions
//! - [`commands`] - `build` and `test`
//! - [`error`] - [`CliError`] and its conversion to a terminal report
//! - [`logger`] - level resolution and subscriber setup
//! - [`ui`] - status lines and the build summary table
//! - [`workspaces`] - the workspace graph behind `test --changed`

pub mod cli;
pub mod commands;
pub mod error;
pub mod logger;
pub mod ui;
pub mod workspaces;

pub use error::{CliError, Result};
