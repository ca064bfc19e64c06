//! The workspace graph behind `modular test --changed`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tokio::process::Command;
use tracing::debug;

use modular_config::{Workspace, list_workspaces};

use crate::error::{CliError, Result};

/// Source of workspaces and of the files changed since a base revision.
#[async_trait]
pub trait WorkspaceResolver: Send + Sync {
    /// Every workspace of the monorepo, keyed by package name.
    async fn workspaces(&self, modular_root: &Path) -> Result<IndexMap<String, Workspace>>;

    /// Files changed between `base` and `HEAD`, relative to `modular_root`.
    async fn changed_files(&self, modular_root: &Path, base: &str) -> Result<Vec<PathBuf>>;
}

/// Reads `package.json` files and asks git for changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitWorkspaceResolver;

#[async_trait]
impl WorkspaceResolver for GitWorkspaceResolver {
    async fn workspaces(&self, modular_root: &Path) -> Result<IndexMap<String, Workspace>> {
        let root = modular_root.to_path_buf();
        tokio::task::spawn_blocking(move || list_workspaces(&root))
            .await
            .map_err(|e| CliError::command("workspace discovery", e))?
            .map_err(CliError::from)
    }

    async fn changed_files(&self, modular_root: &Path, base: &str) -> Result<Vec<PathBuf>> {
        let output = Command::new("git")
            .args(["diff", "--name-only", "--relative"])
            .arg(format!("{base}...HEAD"))
            .current_dir(modular_root)
            .output()
            .await
            .map_err(|e| CliError::command("git", e))?;

        if !output.status.success() {
            return Err(CliError::command(
                "git",
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect())
    }
}

/// Names of the workspaces containing any of `files`.
///
/// A file belongs to the innermost workspace directory above it.
pub fn changed_workspaces(
    workspaces: &IndexMap<String, Workspace>,
    modular_root: &Path,
    files: &[PathBuf],
) -> Vec<String> {
    let mut changed = Vec::new();
    for file in files {
        let absolute = modular_root.join(file);
        let owner = workspaces
            .values()
            .filter(|workspace| absolute.starts_with(&workspace.path))
            .max_by_key(|workspace| workspace.path.components().count());
        if let Some(workspace) = owner {
            if !changed.contains(&workspace.name) {
                changed.push(workspace.name.clone());
            }
        }
    }
    changed
}

/// `selected` plus every workspace depending on one of them, transitively.
///
/// Order follows `workspaces`.
pub fn with_ancestors(
    workspaces: &IndexMap<String, Workspace>,
    selected: &[String],
) -> Vec<String> {
    let mut included: FxHashSet<&str> = selected.iter().map(String::as_str).collect();
    loop {
        let before = included.len();
        for workspace in workspaces.values() {
            if included.contains(workspace.name.as_str()) {
                continue;
            }
            let depends_on_included = workspace
                .manifest
                .dependencies
                .names()
                .any(|dep| included.contains(dep));
            if depends_on_included {
                included.insert(workspace.name.as_str());
            }
        }
        if included.len() == before {
            break;
        }
    }

    workspaces
        .keys()
        .filter(|name| included.contains(name.as_str()))
        .cloned()
        .collect()
}

/// Locations, relative to the root, of the workspaces changed since `base`.
pub async fn changed_locations(
    resolver: &dyn WorkspaceResolver,
    modular_root: &Path,
    base: &str,
    ancestors: bool,
) -> Result<Vec<String>> {
    let workspaces = resolver.workspaces(modular_root).await?;
    let files = resolver.changed_files(modular_root, base).await?;
    debug!("{} files changed since {base}", files.len());

    let mut selected = changed_workspaces(&workspaces, modular_root, &files);
    if ancestors {
        selected = with_ancestors(&workspaces, &selected);
    }

    Ok(selected
        .iter()
        .filter_map(|name| workspaces.get(name))
        .map(|workspace| {
            workspace
                .path
                .strip_prefix(modular_root)
                .unwrap_or(&workspace.path)
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect())
}
