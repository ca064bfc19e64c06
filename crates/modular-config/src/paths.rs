//! Filesystem and URL roles for one build target.

use std::path::{Path, PathBuf};

use path_clean::PathClean;
use serde::Serialize;

use crate::error::{ConfigError, Result};

const ENTRY_CANDIDATES: &[&str] = &["index.tsx", "index.ts", "index.jsx", "index.js"];

/// Immutable path set for a single target.
///
/// Every filesystem path is absolute and cleaned; `public_url_or_path`
/// always ends with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paths {
    modular_root: PathBuf,
    app_path: PathBuf,
    app_src: PathBuf,
    app_build: PathBuf,
    app_public: PathBuf,
    app_index: PathBuf,
    public_url_or_path: String,
}

impl Paths {
    /// Derive the path set for the target rooted at `app_path`.
    ///
    /// The build directory defaults to `<root>/dist/<target dir name>`; the
    /// entry point is the first of `src/index.{tsx,ts,jsx,js}` that exists,
    /// falling back to `src/index.tsx`.
    pub fn new(
        modular_root: impl AsRef<Path>,
        app_path: impl AsRef<Path>,
        public_url: Option<&str>,
    ) -> Result<Self> {
        let modular_root = absolute(modular_root.as_ref())?;
        let app_path = absolute(app_path.as_ref())?;

        let dir_name = app_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string());

        let app_src = app_path.join("src");
        let app_index = ENTRY_CANDIDATES
            .iter()
            .map(|candidate| app_src.join(candidate))
            .find(|candidate| candidate.is_file())
            .unwrap_or_else(|| app_src.join(ENTRY_CANDIDATES[0]));

        Ok(Self {
            app_build: modular_root.join("dist").join(dir_name),
            app_public: app_path.join("public"),
            app_src,
            app_index,
            app_path,
            modular_root,
            public_url_or_path: normalize_public_url(public_url),
        })
    }

    /// Replace the build output directory.
    pub fn with_build_dir(mut self, dir: impl AsRef<Path>) -> Result<Self> {
        self.app_build = absolute(dir.as_ref())?;
        Ok(self)
    }

    /// Fails unless the entry point exists on disk.
    pub fn ensure_entry(&self) -> Result<&Path> {
        if self.app_index.is_file() {
            Ok(&self.app_index)
        } else {
            Err(ConfigError::EntryNotFound(self.app_src.clone()))
        }
    }

    pub fn modular_root(&self) -> &Path {
        &self.modular_root
    }

    pub fn app_path(&self) -> &Path {
        &self.app_path
    }

    pub fn app_src(&self) -> &Path {
        &self.app_src
    }

    pub fn app_build(&self) -> &Path {
        &self.app_build
    }

    pub fn app_public(&self) -> &Path {
        &self.app_public
    }

    pub fn app_index(&self) -> &Path {
        &self.app_index
    }

    pub fn public_url_or_path(&self) -> &str {
        &self.public_url_or_path
    }

    /// Public URL without its trailing separator, as exposed to client code.
    pub fn public_url(&self) -> &str {
        self.public_url_or_path
            .strip_suffix('/')
            .unwrap_or(&self.public_url_or_path)
    }

    /// Path of `app_build` relative to the monorepo root, `/`-separated.
    pub fn build_dir_from_root(&self) -> Option<String> {
        self.app_build
            .strip_prefix(&self.modular_root)
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf().clean())
    } else {
        Err(ConfigError::RelativePath(path.to_path_buf()))
    }
}

/// Ensure the public URL ends with exactly one `/`; empty means `/`.
pub fn normalize_public_url(public_url: Option<&str>) -> String {
    match public_url.map(str::trim) {
        None | Some("") => "/".to_string(),
        Some(url) => format!("{}/", url.trim_end_matches('/')),
    }
}
