//! Serves a generated entry module to Rolldown.

use std::borrow::Cow;
use std::path::PathBuf;

use path_clean::PathClean;
use rolldown_common::ModuleType;
use rolldown_plugin::{
    HookLoadArgs, HookLoadOutput, HookLoadReturn, HookResolveIdArgs, HookResolveIdOutput,
    HookResolveIdReturn, Plugin, PluginContext,
};

use crate::plugins::{ModularPlugin, PluginPhase};

/// Id prefix of generated modules. The leading null byte keeps other plugins
/// from treating the id as a path.
pub const VIRTUAL_PREFIX: &str = "\0modular-virtual:";

/// Plugin owning one generated module.
///
/// Relative imports made by the module resolve from `resolve_dir`, except
/// those listed as external.
#[derive(Debug, Clone)]
pub struct VirtualEntryPlugin {
    id: String,
    contents: String,
    resolve_dir: PathBuf,
    externals: Vec<String>,
}

impl VirtualEntryPlugin {
    pub fn new(name: &str, contents: impl Into<String>, resolve_dir: PathBuf) -> Self {
        Self {
            id: Self::id_for(name),
            contents: contents.into(),
            resolve_dir,
            externals: Vec::new(),
        }
    }

    /// Leave `externals` for the externalize plugin.
    pub fn with_externals(mut self, externals: Vec<String>) -> Self {
        self.externals = externals;
        self
    }

    /// Module id used as the bundle input for `name`.
    pub fn id_for(name: &str) -> String {
        format!("{VIRTUAL_PREFIX}{name}")
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn resolve(&self, specifier: &str, importer: Option<&str>) -> Option<String> {
        if specifier == self.id {
            return Some(self.id.clone());
        }
        if importer != Some(self.id.as_str()) || self.externals.iter().any(|e| e == specifier) {
            return None;
        }
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let resolved = self.resolve_dir.join(specifier).clean();
            return Some(resolved.to_string_lossy().into_owned());
        }
        None
    }
}

impl Plugin for VirtualEntryPlugin {
    fn name(&self) -> Cow<'static, str> {
        "modular-virtual-entry".into()
    }

    fn register_hook_usage(&self) -> rolldown_plugin::HookUsage {
        use rolldown_plugin::HookUsage;
        HookUsage::ResolveId | HookUsage::Load
    }

    fn resolve_id(
        &self,
        _ctx: &PluginContext,
        args: &HookResolveIdArgs<'_>,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let resolved = self.resolve(args.specifier, args.importer);

        async move {
            Ok(resolved.map(|id| HookResolveIdOutput {
                id: id.into(),
                ..Default::default()
            }))
        }
    }

    fn load(
        &self,
        _ctx: &PluginContext,
        args: &HookLoadArgs<'_>,
    ) -> impl std::future::Future<Output = HookLoadReturn> + Send {
        let source = (args.id == self.id).then(|| self.contents.clone());

        async move {
            Ok(source.map(|code| HookLoadOutput {
                code: code.into(),
                module_type: Some(ModuleType::Js),
                ..Default::default()
            }))
        }
    }
}

impl ModularPlugin for VirtualEntryPlugin {
    fn phase(&self) -> PluginPhase {
        PluginPhase::Virtual
    }
}
