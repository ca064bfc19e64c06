//! Atomic file writing for build output.
//!
//! Every file is first written next to its destination with a `.tmp`
//! suffix, then renamed into place once all writes succeeded. If any step
//! fails the temporary files are removed, so readers never observe a
//! partially written build.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::{Error, Result};

/// Resolve `filename` inside `base_dir`, rejecting paths that escape it.
pub fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.contains('\0') {
        return Err(Error::AssemblyInvariant(format!(
            "output file name contains a null byte: {filename:?}"
        )));
    }

    let base_dir = base_dir.to_path_buf().clean();
    let full_path = base_dir.join(Path::new(filename).clean()).clean();

    if !full_path.starts_with(&base_dir) {
        return Err(Error::AssemblyInvariant(format!(
            "output '{}' escapes the build directory '{}'",
            filename,
            base_dir.display()
        )));
    }

    Ok(full_path)
}

/// Write a single file atomically.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    write_all_atomic(vec![(path.to_path_buf(), contents.to_vec())]).await
}

/// Write owned files atomically off the async runtime.
pub async fn write_all_atomic(files: Vec<(PathBuf, Vec<u8>)>) -> Result<()> {
    tokio::task::spawn_blocking(move || {
        let operations: Vec<(PathBuf, &[u8])> = files
            .iter()
            .map(|(path, contents)| (path.clone(), contents.as_slice()))
            .collect();
        write_files_atomic(&operations)
    })
    .await
    .map_err(|e| Error::AssemblyInvariant(format!("write task failed: {e}")))?
}

/// Write all files or none of them.
pub fn write_files_atomic(operations: &[(PathBuf, &[u8])]) -> Result<()> {
    let mut temp_files = Vec::with_capacity(operations.len());

    for (target_path, content) in operations {
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                cleanup_temp_files(&temp_files);
                Error::IoError {
                    message: format!("Failed to create directory '{}'", parent.display()),
                    source: e,
                }
            })?;
        }

        let temp_path = temp_path_for(target_path);
        fs::write(&temp_path, content).map_err(|e| {
            cleanup_temp_files(&temp_files);
            Error::IoError {
                message: format!("Failed to write temporary file '{}'", temp_path.display()),
                source: e,
            }
        })?;

        temp_files.push((temp_path, target_path.clone()));
    }

    for (temp_path, target_path) in &temp_files {
        fs::rename(temp_path, target_path).map_err(|e| {
            cleanup_temp_files(&temp_files);
            Error::IoError {
                message: format!(
                    "Failed to rename '{}' to '{}'",
                    temp_path.display(),
                    target_path.display()
                ),
                source: e,
            }
        })?;
    }

    Ok(())
}

/// `index.html` -> `index.html.tmp`, keeping the original extension so two
/// outputs differing only by extension never share a temp file.
fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    target.with_file_name(name)
}

fn cleanup_temp_files(temp_files: &[(PathBuf, PathBuf)]) {
    for (temp_path, _) in temp_files {
        if temp_path.exists() {
            if let Err(e) = fs::remove_file(temp_path) {
                tracing::warn!(
                    "Failed to clean up temporary file '{}': {}",
                    temp_path.display(),
                    e
                );
            }
        }
    }
}
