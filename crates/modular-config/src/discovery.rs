//! Locating the monorepo root and its workspace targets.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use walkdir::WalkDir;

use crate::error::{ConfigError, Result};
use crate::package::{PackageJson, TargetType, manifest_path};

/// A workspace package discovered under the modular root.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub name: String,
    pub path: PathBuf,
    pub manifest: PackageJson,
}

impl Workspace {
    pub fn target_type(&self) -> Option<TargetType> {
        self.manifest.target_type()
    }
}

/// Walk up from `start` to the first `package.json` whose `modular.type`
/// is `root`.
pub fn find_modular_root(start: &Path) -> Result<PathBuf> {
    for dir in start.ancestors() {
        let manifest = manifest_path(dir);
        if !manifest.is_file() {
            continue;
        }
        match PackageJson::read(&manifest) {
            Ok(pkg) if pkg.target_type() == Some(TargetType::Root) => {
                tracing::debug!("Found modular root at {}", dir.display());
                return Ok(dir.to_path_buf());
            }
            Ok(_) => {}
            Err(err) => tracing::warn!("Skipping unreadable {}: {err}", manifest.display()),
        }
    }
    Err(ConfigError::RootNotFound(start.to_path_buf()))
}

/// All workspaces declared by the root manifest, keyed by package name.
pub fn list_workspaces(modular_root: &Path) -> Result<IndexMap<String, Workspace>> {
    let root_pkg = PackageJson::read_dir(modular_root)?;
    let patterns = root_pkg
        .workspaces
        .as_ref()
        .map(|w| w.patterns().to_vec())
        .unwrap_or_default();

    let mut workspaces = IndexMap::new();
    for pattern in &patterns {
        for dir in expand_pattern(modular_root, pattern) {
            let manifest = manifest_path(&dir);
            if !manifest.is_file() {
                continue;
            }
            let pkg = PackageJson::read(&manifest)?;
            if pkg.name.is_empty() || workspaces.contains_key(&pkg.name) {
                continue;
            }
            workspaces.insert(
                pkg.name.clone(),
                Workspace {
                    name: pkg.name.clone(),
                    path: dir,
                    manifest: pkg,
                },
            );
        }
    }
    Ok(workspaces)
}

/// Expand one `workspaces` entry. Supports `dir`, `dir/*` and `dir/**`.
fn expand_pattern(root: &Path, pattern: &str) -> Vec<PathBuf> {
    let pattern = pattern.trim_start_matches("./").trim_end_matches('/');

    let (base, depth) = if let Some(base) = pattern.strip_suffix("/**") {
        (base, None)
    } else if let Some(base) = pattern.strip_suffix("/*") {
        (base, Some(1))
    } else {
        return vec![root.join(pattern)];
    };

    let mut walker = WalkDir::new(root.join(base)).min_depth(1).sort_by_file_name();
    if let Some(depth) = depth {
        walker = walker.max_depth(depth);
    }

    walker
        .into_iter()
        .filter_entry(|entry| entry.file_name() != "node_modules")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}

/// Resolve a build target given either its package name or its directory.
///
/// Only `app` and `view` workspaces can be built.
pub fn resolve_target(modular_root: &Path, name_or_dir: &str) -> Result<Workspace> {
    let workspaces = list_workspaces(modular_root)?;

    let found = workspaces.get(name_or_dir).cloned().or_else(|| {
        let candidate = path_clean::clean(modular_root.join(name_or_dir));
        workspaces.values().find(|w| w.path == candidate).cloned()
    });

    let workspace = found.ok_or_else(|| ConfigError::TargetNotFound(name_or_dir.to_string()))?;

    match workspace.target_type() {
        Some(t) if t.is_buildable() => Ok(workspace),
        other => Err(ConfigError::UnsupportedTargetType {
            name: workspace.name,
            found: other.map_or_else(|| "plain".to_string(), |t| t.to_string()),
        }),
    }
}
