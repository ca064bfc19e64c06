//! Workspace package manifests (`package.json`).
//!
//! Only the fields the build needs are modelled: the package name, the
//! `modular` field describing what kind of workspace this is, and the
//! declared runtime dependencies.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Kind of workspace, from `package.json#modular.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Root,
    App,
    View,
    Package,
    Template,
}

impl TargetType {
    pub fn is_buildable(&self) -> bool {
        matches!(self, TargetType::App | TargetType::View)
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetType::Root => "root",
            TargetType::App => "app",
            TargetType::View => "view",
            TargetType::Package => "package",
            TargetType::Template => "template",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModularField {
    #[serde(rename = "type")]
    pub target_type: TargetType,
}

/// Ordered mapping from dependency name to version range.
///
/// Declaration order is preserved so that generated code listing the
/// dependencies is stable between builds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageDependency(IndexMap<String, String>);

impl PackageDependency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, range: impl Into<String>) {
        self.0.insert(name.into(), range.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Finds the declared dependency an import specifier belongs to.
    ///
    /// `react-dom/client` matches a `react-dom` declaration and
    /// `@scope/pkg/deep/file` matches `@scope/pkg`. Relative, absolute and URL
    /// specifiers never match.
    pub fn match_specifier(&self, specifier: &str) -> Option<(&str, &str)> {
        let name = package_name_of(specifier)?;
        self.0
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PackageDependency {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Top-level package name of a bare import specifier.
pub fn package_name_of(specifier: &str) -> Option<&str> {
    if specifier.is_empty()
        || specifier.starts_with('.')
        || specifier.starts_with('/')
        || specifier.starts_with('\0')
        || specifier.contains("://")
    {
        return None;
    }

    let mut segments = specifier.splitn(3, '/');
    let first = segments.next()?;
    if first.starts_with('@') {
        let second = segments.next().filter(|s| !s.is_empty())?;
        Some(&specifier[..first.len() + 1 + second.len()])
    } else if first.is_empty() {
        None
    } else {
        Some(first)
    }
}

/// The subset of `package.json` the build reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageJson {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modular: Option<ModularField>,

    #[serde(default)]
    pub dependencies: PackageDependency,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<Workspaces>,
}

/// `workspaces` is either a list of globs or `{ "packages": [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Workspaces {
    List(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

impl Workspaces {
    pub fn patterns(&self) -> &[String] {
        match self {
            Workspaces::List(list) => list,
            Workspaces::Object { packages } => packages,
        }
    }
}

impl PackageJson {
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidManifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn read_dir(dir: &Path) -> Result<Self> {
        Self::read(&manifest_path(dir))
    }

    pub fn target_type(&self) -> Option<TargetType> {
        self.modular.as_ref().map(|m| m.target_type)
    }
}

pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join("package.json")
}
