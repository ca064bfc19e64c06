//! Rolldown plugins used by [`RolldownBundler`](crate::RolldownBundler).

pub mod externalize;
pub mod registry;
pub mod virtual_entry;

pub use externalize::ExternalizePlugin;
pub use registry::{ModularPlugin, PluginPhase, PluginRegistry};
pub use virtual_entry::{VIRTUAL_PREFIX, VirtualEntryPlugin};
