//! The view trampoline.
//!
//! A view is built with its shared dependencies externalized to registry
//! URLs. The trampoline is a second, tiny bundle that runs in two phases:
//!
//! 1. resolve every shared dependency from the registry, failing with the
//!    dependency's name and range if any of them cannot be loaded;
//! 2. import the view's compiled entry and export its default export.
//!
//! The resolved modules are exported as `dependencies`, keyed by package
//! name. Because the trampoline is bundled with the same externalization
//! rules as the view, both reference identical URLs and the browser hands
//! them the same module instances.

use std::fmt::Write as _;
use std::path::Path;

use modular_config::{EsTarget, PackageDependency};
use tracing::debug;

use crate::bundler::{BundleConfig, BundleFailure, Bundler, EntrySource};
use crate::externalize::{DependencyExternalizer, ExternalizationRecord, RegistryTemplate};
use crate::{Error, Result};

/// File name of the trampoline inside `static/js/`.
pub const TRAMPOLINE_FILE: &str = "_trampoline.js";

const TRAMPOLINE_NAME: &str = "_trampoline";

/// What the trampoline is generated from.
#[derive(Debug, Clone, Copy)]
pub struct TrampolineRequest<'a> {
    /// File name of the view's compiled entry, e.g. `index-1a2b3c4d.js`.
    pub entry_file_name: &'a str,
    /// The view's source directory.
    pub src_dir: &'a Path,
    /// Dependencies shared with the host.
    pub dependencies: &'a PackageDependency,
    pub target: EsTarget,
    pub registry: &'a RegistryTemplate,
    /// Directory the bundler runs in.
    pub working_dir: &'a Path,
    /// Build directory of the view.
    pub out_dir: &'a Path,
}

/// A bundled trampoline, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trampoline {
    pub file_name: String,
    pub contents: Vec<u8>,
    /// Dependencies the trampoline resolves at runtime.
    pub externalized: ExternalizationRecord,
}

fn js_string(value: &str) -> String {
    // JSON strings are valid JavaScript string literals.
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value.escape_default()))
}

/// Generate the unbundled trampoline source.
///
/// Shared dependencies are imported through bare specifiers so that the
/// externalization rules rewrite them exactly as in the view itself.
pub fn trampoline_source(
    entry_file_name: &str,
    dependencies: &PackageDependency,
    target: EsTarget,
) -> String {
    let entry = js_string(&format!("./{entry_file_name}"));
    let mut src = String::new();

    src.push_str("export const dependencies = {};\n\n");
    src.push_str(
        "function failed(name, range) {\n  \
         return function (cause) {\n    \
         var reason = cause && cause.message ? cause.message : String(cause);\n    \
         throw new Error(\"Failed to resolve shared dependency \" + name + \"@\" + range + \": \" + reason, { cause: cause });\n  \
         };\n}\n\n",
    );
    src.push_str(
        "function provide(name) {\n  \
         return function (module) {\n    \
         if (module == null) {\n      \
         throw new Error(\"registry returned nothing\");\n    \
         }\n    \
         dependencies[name] = module;\n  \
         };\n}\n\n",
    );

    // Phase 1: every shared dependency, or the first failure.
    let mut resolving = String::from("[\n");
    for (name, range) in dependencies.iter() {
        let (name_lit, range_lit) = (js_string(name), js_string(range));
        let _ = writeln!(
            resolving,
            "    import({name_lit}).then(provide({name_lit})).catch(failed({name_lit}, {range_lit})),"
        );
    }
    resolving.push_str("  ]");

    // Phase 2: the view itself.
    if target.supports_async_await() {
        let _ = write!(
            src,
            "async function load() {{\n  \
             await Promise.all({resolving});\n  \
             const view = await import({entry});\n  \
             return view.default;\n}}\n\n"
        );
    } else {
        let _ = write!(
            src,
            "function load() {{\n  \
             return Promise.all({resolving})\n    \
             .then(function () {{ return import({entry}); }})\n    \
             .then(function (view) {{ return view.default; }});\n}}\n\n"
        );
    }

    if target.supports_top_level_await() {
        src.push_str("export default await load();\n");
    } else {
        src.push_str("export default load();\n");
    }
    src
}

/// Generate and bundle the trampoline for a view.
///
/// The compiled entry stays external; shared dependencies are externalized
/// through `request.registry`. Fails with [`Error::AssemblyInvariant`] when
/// the bundle produced no script.
pub async fn create_view_trampoline(
    bundler: &dyn Bundler,
    request: &TrampolineRequest<'_>,
) -> Result<Trampoline> {
    let source = trampoline_source(request.entry_file_name, request.dependencies, request.target);
    debug!(
        "Generating trampoline for {} with {} shared dependencies",
        request.entry_file_name,
        request.dependencies.len()
    );

    let mut config = BundleConfig::new(
        EntrySource::Virtual {
            name: TRAMPOLINE_NAME.to_string(),
            contents: source,
            resolve_dir: request.src_dir.to_path_buf(),
        },
        request.working_dir.to_path_buf(),
        request.out_dir.to_path_buf(),
    );
    config.target = request.target;
    config.externals = vec![format!("./{}", request.entry_file_name)];
    config.externalizer = Some(DependencyExternalizer::new(
        request.dependencies.clone(),
        request.registry.clone(),
    ));
    config.write = false;

    let mut externalized = ExternalizationRecord::new();
    let output = match bundler.bundle(config, &mut externalized).await {
        Ok(output) => output,
        Err(BundleFailure::Diagnostics(diagnostics)) => {
            let messages: Vec<String> = diagnostics.iter().map(|d| d.message.clone()).collect();
            return Err(Error::AssemblyInvariant(format!(
                "the trampoline failed to compile: {}",
                messages.join("; ")
            )));
        }
        Err(BundleFailure::Write(err)) => return Err(err),
    };

    let script = output
        .output_files
        .into_iter()
        .find(|file| file.path.extension().is_some_and(|ext| ext == "js"))
        .ok_or_else(|| {
            Error::AssemblyInvariant("the trampoline build produced no output".to_string())
        })?;

    Ok(Trampoline {
        file_name: TRAMPOLINE_FILE.to_string(),
        contents: script.contents,
        externalized,
    })
}
