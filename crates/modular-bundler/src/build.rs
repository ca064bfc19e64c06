//! The build pipeline for one target.
//!
//! ```text
//! bundle -> sanitize -> relocate styles -> index.html -> (view) trampoline
//! ```
//!
//! Every step either succeeds or aborts the build; nothing is retried. All
//! errors leaving [`build`] carry the target's name.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info};
use walkdir::WalkDir;

use modular_config::{ClientEnvironment, EsTarget, PackageDependency, Paths, TargetType};

use crate::bundler::{BundleConfig, BundleFailure, Bundler, EntrySource};
use crate::diagnostics::{ExtractedDiagnostic, format_diagnostics};
use crate::externalize::{DependencyExternalizer, ExternalizationRecord, RegistryTemplate};
use crate::html::{HtmlInput, assemble_html};
use crate::manifest::{BuildManifest, sanitize};
use crate::relocate::relocate_styles;
use crate::trampoline::{TrampolineRequest, create_view_trampoline};
use crate::writer;
use crate::{Error, Result};

const INDEX_HTML: &str = "index.html";

/// A buildable workspace.
#[derive(Debug, Clone)]
pub struct BuildTarget {
    pub name: String,
    pub kind: TargetType,
    pub paths: Paths,
    /// Declared dependencies; shared with the host for views.
    pub dependencies: PackageDependency,
}

impl BuildTarget {
    pub fn new(
        name: impl Into<String>,
        kind: TargetType,
        paths: Paths,
        dependencies: PackageDependency,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            paths,
            dependencies,
        }
    }

    pub fn is_view(&self) -> bool {
        self.kind == TargetType::View
    }
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub target: EsTarget,
    pub registry: RegistryTemplate,
    /// Concurrent style moves.
    pub relocation_concurrency: usize,
    /// Variables for client code; `None` injects only `NODE_ENV` and
    /// `PUBLIC_URL`.
    pub env: Option<ClientEnvironment>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            target: EsTarget::default(),
            registry: RegistryTemplate::default(),
            relocation_concurrency: num_cpus::get().clamp(1, 8),
            env: None,
        }
    }
}

/// The written trampoline of a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrampolineFile {
    pub path: PathBuf,
    pub contents: Vec<u8>,
    /// Dependencies it resolves at runtime.
    pub dependencies: ExternalizationRecord,
}

#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Root-relative manifest, after style relocation.
    pub manifest: BuildManifest,
    /// `Some` for views.
    pub trampoline: Option<TrampolineFile>,
    /// Dependencies left out of the target's bundle.
    pub externalized: ExternalizationRecord,
}

/// Build `target` into its build directory.
///
/// The build directory is emptied first and receives the target's `public`
/// folder, the bundler output, `index.html` and, for views, the trampoline.
pub async fn build(
    bundler: &dyn Bundler,
    target: &BuildTarget,
    options: &BuildOptions,
) -> Result<BuildResult> {
    run(bundler, target, options)
        .await
        .map_err(|e| e.for_target(&target.name))
}

async fn run(
    bundler: &dyn Bundler,
    target: &BuildTarget,
    options: &BuildOptions,
) -> Result<BuildResult> {
    let paths = &target.paths;
    info!("Building {} {}", target.kind, target.name);

    let entry = paths.ensure_entry()?.to_path_buf();
    prepare_build_dir(paths).await?;

    let mut config = BundleConfig::new(
        EntrySource::File(entry),
        paths.app_path().to_path_buf(),
        paths.app_build().to_path_buf(),
    );
    config.target = options.target;
    config.externalizer = target.is_view().then(|| {
        DependencyExternalizer::new(target.dependencies.clone(), options.registry.clone())
    });

    let mut externalized = ExternalizationRecord::new();
    let output = match bundler.bundle(config, &mut externalized).await {
        Ok(output) => output,
        Err(BundleFailure::Diagnostics(diagnostics)) => {
            return Err(report_compile_failure(target, diagnostics).await);
        }
        Err(BundleFailure::Write(err)) => return Err(err),
    };
    if !externalized.is_empty() {
        info!(
            "Externalized {}",
            externalized.names().collect::<Vec<_>>().join(", ")
        );
    }

    let manifest = sanitize(&output.metafile, paths.modular_root())?;
    let manifest =
        relocate_styles(manifest, paths.modular_root(), options.relocation_concurrency).await?;

    let env = options.env.clone().unwrap_or_else(|| {
        ClientEnvironment::from_vars(Vec::<(String, String)>::new(), paths.public_url())
    });
    let template = read_template(target).await?;
    let html = assemble_html(&HtmlInput {
        name: &target.name,
        manifest: &manifest,
        paths,
        env: &env,
        is_view: target.is_view(),
        template: template.as_deref(),
    })?;
    writer::write_atomic(&paths.app_build().join(INDEX_HTML), html.as_bytes()).await?;

    let trampoline = if target.is_view() {
        Some(write_trampoline(bundler, target, options, &manifest).await?)
    } else {
        None
    };

    info!("Built {}", target.name);
    Ok(BuildResult {
        manifest,
        trampoline,
        externalized,
    })
}

async fn report_compile_failure(
    target: &BuildTarget,
    diagnostics: Vec<ExtractedDiagnostic>,
) -> Error {
    error!("Failed to compile.");
    for formatted in format_diagnostics(&diagnostics, target.paths.modular_root()).await {
        error!("{formatted}");
    }
    Error::Compile {
        target: target.name.clone(),
        diagnostics,
    }
}

async fn write_trampoline(
    bundler: &dyn Bundler,
    target: &BuildTarget,
    options: &BuildOptions,
    manifest: &BuildManifest,
) -> Result<TrampolineFile> {
    let paths = &target.paths;
    let (entry_path, _) = manifest.script_entry().ok_or_else(|| {
        Error::AssemblyInvariant("Can't find main entrypoint after building".to_string())
    })?;
    let entry_file_name = Path::new(entry_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::AssemblyInvariant(format!("entry point {entry_path} has no file name"))
        })?;

    let trampoline = create_view_trampoline(
        bundler,
        &TrampolineRequest {
            entry_file_name: &entry_file_name,
            src_dir: paths.app_src(),
            dependencies: &target.dependencies,
            target: options.target,
            registry: &options.registry,
            working_dir: paths.app_path(),
            out_dir: paths.app_build(),
        },
    )
    .await?;

    let path = paths
        .app_build()
        .join("static")
        .join("js")
        .join(&trampoline.file_name);
    writer::write_atomic(&path, &trampoline.contents).await?;
    debug!("Wrote trampoline {}", path.display());

    Ok(TrampolineFile {
        path,
        contents: trampoline.contents,
        dependencies: trampoline.externalized,
    })
}

/// A custom document template, apps only.
async fn read_template(target: &BuildTarget) -> Result<Option<String>> {
    if target.is_view() {
        return Ok(None);
    }
    let path = target.paths.app_public().join(INDEX_HTML);
    match tokio::fs::read_to_string(&path).await {
        Ok(template) => Ok(Some(template)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::IoError {
            message: format!("Failed to read template '{}'", path.display()),
            source: e,
        }),
    }
}

/// Empty the build directory and copy the public folder into it, minus the
/// document template.
async fn prepare_build_dir(paths: &Paths) -> Result<()> {
    let build = paths.app_build().to_path_buf();
    let public = paths.app_public().to_path_buf();

    tokio::task::spawn_blocking(move || copy_public(&public, &build))
        .await
        .map_err(|e| {
            Error::AssemblyInvariant(format!("preparing the build directory failed: {e}"))
        })?
}

fn copy_public(public: &Path, build: &Path) -> Result<()> {
    if build.exists() {
        std::fs::remove_dir_all(build).map_err(|e| Error::IoError {
            message: format!("Failed to empty '{}'", build.display()),
            source: e,
        })?;
    }
    std::fs::create_dir_all(build).map_err(|e| Error::IoError {
        message: format!("Failed to create '{}'", build.display()),
        source: e,
    })?;

    if !public.is_dir() {
        return Ok(());
    }

    for entry in WalkDir::new(public).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::IoError {
            message: format!("Failed to read '{}'", public.display()),
            source: e.into(),
        })?;
        let Ok(relative) = entry.path().strip_prefix(public) else {
            continue;
        };
        if relative.as_os_str().is_empty() || relative == Path::new(INDEX_HTML) {
            continue;
        }

        let dest = build.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else {
            std::fs::copy(entry.path(), &dest).map_err(|e| Error::IoError {
                message: format!("Failed to copy '{}'", entry.path().display()),
                source: e,
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn public_files_are_copied_without_the_template() {
        let dir = TempDir::new().unwrap();
        let public = dir.path().join("public");
        fs::create_dir_all(public.join("icons")).unwrap();
        fs::write(public.join("index.html"), "<html></html>").unwrap();
        fs::write(public.join("robots.txt"), "User-agent: *").unwrap();
        fs::write(public.join("icons/logo.svg"), "<svg/>").unwrap();

        let build = dir.path().join("dist/app");
        fs::create_dir_all(&build).unwrap();
        fs::write(build.join("stale.js"), "old").unwrap();

        copy_public(&public, &build).unwrap();

        assert!(build.join("robots.txt").is_file());
        assert!(build.join("icons/logo.svg").is_file());
        assert!(!build.join("index.html").exists());
        assert!(!build.join("stale.js").exists());
    }

    #[test]
    fn missing_public_folder_leaves_an_empty_build_dir() {
        let dir = TempDir::new().unwrap();
        let build = dir.path().join("dist/app");
        copy_public(&dir.path().join("public"), &build).unwrap();
        assert!(build.is_dir());
        assert_eq!(fs::read_dir(&build).unwrap().count(), 0);
    }

    #[test]
    fn default_options_bound_relocation() {
        let options = BuildOptions::default();
        assert!((1..=8).contains(&options.relocation_concurrency));
        assert_eq!(options.target, EsTarget::Es2020);
    }
}
