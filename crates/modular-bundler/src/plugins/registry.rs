//! Plugin registry with execution phases.
//!
//! Rolldown asks plugins in registration order and takes the first answer, so
//! plugins serving generated modules must come before those deciding what is
//! external.

use std::sync::Arc;

use rolldown_plugin::Plugin;
use rolldown_plugin::__inner::SharedPluginable;

/// Plugin execution phases, lower first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PluginPhase {
    /// Generated modules that don't exist on disk.
    Virtual = 0,
    /// Plugins deciding how specifiers resolve, externals included.
    Resolve = 10,
}

/// A [`Plugin`] that knows its phase.
pub trait ModularPlugin: Plugin {
    fn phase(&self) -> PluginPhase {
        PluginPhase::Resolve
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<(PluginPhase, SharedPluginable)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<P: ModularPlugin + 'static>(&mut self, plugin: P) {
        let phase = plugin.phase();
        self.plugins.push((phase, Arc::new(plugin)));
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn phases(&self) -> Vec<PluginPhase> {
        let mut phases: Vec<_> = self.plugins.iter().map(|(phase, _)| *phase).collect();
        phases.sort();
        phases
    }

    /// Plugins sorted by phase; ties keep insertion order.
    pub fn into_rolldown_plugins(mut self) -> Vec<SharedPluginable> {
        self.plugins.sort_by_key(|(phase, _)| *phase);
        self.plugins.into_iter().map(|(_, plugin)| plugin).collect()
    }
}
