//! Command implementations.
//!
//! - [`build`] - build one app or view
//! - [`test`] - run the workspace test runner
//!
//! Each command provides an `execute` function taking its parsed arguments
//! and the [`Context`] resolved by `main`.

use std::path::PathBuf;

use modular_config::ModularSettings;

pub mod build;

pub use build::execute as build_execute;
pub use test::execute as test_execute;

/// What every command needs: the monorepo and its settings.
#[derive(Debug, Clone)]
pub struct Context {
    pub modular_root: PathBuf,
    pub settings: ModularSettings,
}
