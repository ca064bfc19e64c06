//! Moves style-sheet outputs next to the hashed scripts.
//!
//! The bundler writes styles under `static/css/`; the published layout keeps
//! every hashed asset under `static/js/`. Each move is independent, so they
//! run concurrently up to a bound.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::manifest::{BuildManifest, ManifestEntry};
use crate::{Error, Result};

const STYLE_SEGMENT: &str = "/static/css/";
const SCRIPT_SEGMENT: &str = "/static/js/";
const STYLE_EXTENSIONS: &[&str] = &[".css", ".css.map"];

pub fn is_style_output(path: &str) -> bool {
    STYLE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Post-move location of a style output, `None` when it needs no move.
pub fn relocated_path(path: &str) -> Option<String> {
    if !is_style_output(path) {
        return None;
    }
    // Only the static subtree is rewritten; the closest match wins.
    let padded = format!("/{path}");
    let pos = padded.rfind(STYLE_SEGMENT)?;
    let mut moved = String::with_capacity(padded.len());
    moved.push_str(&padded[..pos]);
    moved.push_str(SCRIPT_SEGMENT);
    moved.push_str(&padded[pos + STYLE_SEGMENT.len()..]);
    Some(moved[1..].to_string())
}

/// Move every style output of `manifest` and return the manifest with
/// keys and `css_bundle` links updated.
///
/// Paths are relative to `modular_root`. A manifest entry without a file on
/// disk fails with [`Error::ManifestInconsistency`]; the first failure
/// aborts the remaining moves.
pub async fn relocate_styles(
    manifest: BuildManifest,
    modular_root: &Path,
    concurrency: usize,
) -> Result<BuildManifest> {
    let moves: Vec<(String, String)> = manifest
        .paths()
        .filter_map(|path| relocated_path(path).map(|to| (path.to_string(), to)))
        .collect();

    if moves.is_empty() {
        return Ok(manifest);
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut join_set = JoinSet::new();

    for (from, to) in &moves {
        let from_path = modular_root.join(from);
        let to_path = modular_root.join(to);
        let from = from.clone();
        let permit = Arc::clone(&semaphore);

        join_set.spawn(async move {
            let _permit = permit.acquire_owned().await.map_err(|e| {
                Error::AssemblyInvariant(format!("relocation was cancelled: {e}"))
            })?;
            move_file(&from, &from_path, &to_path).await
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                join_set.abort_all();
                return Err(err);
            }
            Err(join_err) => {
                join_set.abort_all();
                return Err(Error::AssemblyInvariant(format!(
                    "style relocation task failed: {join_err}"
                )));
            }
        }
    }

    let renamed: IndexMap<String, String> = moves.into_iter().collect();
    let outputs = manifest
        .into_outputs()
        .into_iter()
        .map(|(path, mut entry)| {
            relink(&mut entry, &renamed);
            let path = renamed.get(&path).cloned().unwrap_or(path);
            (path, entry)
        })
        .collect();

    Ok(BuildManifest::from_outputs(outputs))
}

fn relink(entry: &mut ManifestEntry, renamed: &IndexMap<String, String>) {
    if let Some(css) = entry.css_bundle.as_mut() {
        if let Some(moved) = renamed.get(css.as_str()) {
            *css = moved.clone();
        }
    }
}

async fn move_file(manifest_path: &str, from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::metadata(from).await.is_err() {
        return Err(Error::ManifestInconsistency {
            path: manifest_path.to_string(),
        });
    }

    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::IoError {
                message: format!("Failed to create directory '{}'", parent.display()),
                source: e,
            })?;
    }

    tracing::debug!("Moving css {} => {}", from.display(), to.display());

    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    // Cross-device moves cannot be renamed.
    copy_then_remove(from, to).await
}

async fn copy_then_remove(from: &Path, to: &Path) -> Result<()> {
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| Error::IoError {
            message: format!("Failed to copy '{}' to '{}'", from.display(), to.display()),
            source: e,
        })?;
    tokio::fs::remove_file(from)
        .await
        .map_err(|e| Error::IoError {
            message: format!("Failed to remove '{}'", from.display()),
            source: e,
        })
}
