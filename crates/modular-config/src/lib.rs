//! Configuration for modular builds.
//!
//! Resolves where a target lives, what it depends on, and which settings
//! apply to its build:
//!
//! - [`discovery`] finds the monorepo root and its workspaces
//! - [`Paths`] derives the filesystem and URL roles of one target
//! - [`ModularSettings`] layers defaults, config files, environment and CLI
//! - [`ClientEnvironment`] collects the variables exposed to client code

pub mod discovery;
pub mod env;
pub mod error;
pub mod package;
pub mod paths;
pub mod settings;
pub mod target;

pub use discovery::{Workspace, find_modular_root, list_workspaces, resolve_target};
pub use env::{CLIENT_ENV_PREFIX, ClientEnvironment};
pub use error::{ConfigError, Result};
pub use package::{PackageDependency, PackageJson, TargetType, package_name_of};
pub use paths::{Paths, normalize_public_url};
pub use settings::{DEFAULT_REGISTRY, ModularSettings, SettingsOverrides};
pub use target::EsTarget;
