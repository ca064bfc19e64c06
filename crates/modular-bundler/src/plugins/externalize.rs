//! Keeps shared dependencies and explicit externals out of the bundle.

use std::borrow::Cow;
use std::sync::Arc;

use parking_lot::Mutex;
use rolldown_common::ResolvedExternal;
use rolldown_plugin::{HookResolveIdArgs, HookResolveIdOutput, HookResolveIdReturn, Plugin, PluginContext};

use crate::externalize::{DependencyExternalizer, ExternalizationRecord};
use crate::plugins::{ModularPlugin, PluginPhase};

/// Prefix marking an explicit external in generated code.
///
/// Relative externals would otherwise be re-resolved against their importer,
/// which for a generated entry has no directory. The marker is removed from
/// the emitted chunks.
pub const EXTERNAL_MARKER: &str = "modular-external:";

/// Resolves shared dependencies to registry URLs and marks them external.
///
/// Every externalized package is added to the shared record, which the
/// bundler merges into the caller's record once generation finishes.
#[derive(Debug, Clone)]
pub struct ExternalizePlugin {
    externalizer: Option<DependencyExternalizer>,
    externals: Vec<String>,
    record: Arc<Mutex<ExternalizationRecord>>,
}

impl ExternalizePlugin {
    pub fn new(
        externalizer: Option<DependencyExternalizer>,
        externals: Vec<String>,
        record: Arc<Mutex<ExternalizationRecord>>,
    ) -> Self {
        Self {
            externalizer,
            externals,
            record,
        }
    }

    /// Decide the external id for `specifier`, if it is external.
    pub fn external_id(&self, specifier: &str) -> Option<String> {
        if self.externals.iter().any(|e| e == specifier) {
            return Some(format!("{EXTERNAL_MARKER}{specifier}"));
        }
        let externalizer = self.externalizer.as_ref()?;
        let mut record = self.record.lock();
        externalizer.externalize_into(specifier, &mut record)
    }
}

impl Plugin for ExternalizePlugin {
    fn name(&self) -> Cow<'static, str> {
        "modular-externalize".into()
    }

    fn register_hook_usage(&self) -> rolldown_plugin::HookUsage {
        rolldown_plugin::HookUsage::ResolveId
    }

    fn resolve_id(
        &self,
        _ctx: &PluginContext,
        args: &HookResolveIdArgs<'_>,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let resolved = self.external_id(args.specifier);

        async move {
            Ok(resolved.map(|id| HookResolveIdOutput {
                id: id.into(),
                external: Some(ResolvedExternal::Bool(true)),
                ..Default::default()
            }))
        }
    }
}

impl ModularPlugin for ExternalizePlugin {
    fn phase(&self) -> PluginPhase {
        PluginPhase::Resolve
    }
}

/// Drop [`EXTERNAL_MARKER`] from emitted code.
pub fn strip_external_markers(code: &str) -> Cow<'_, str> {
    if code.contains(EXTERNAL_MARKER) {
        Cow::Owned(code.replace(EXTERNAL_MARKER, ""))
    } else {
        Cow::Borrowed(code)
    }
}
