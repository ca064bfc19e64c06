//! Sanitized build manifest.
//!
//! [`sanitize`] turns a [`RawMetafile`] into a [`BuildManifest`] whose keys
//! are paths relative to the modular root, whatever directory the bundler ran
//! in. Byte offsets and import lists are dropped; sizes, exports and entry
//! information are kept as reported.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use path_clean::PathClean;
use serde::Serialize;

use crate::metafile::{RawMetafile, RawOutput, RawOutputInput};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub bytes: u64,
    /// Source paths, in the order the bundler reported them.
    pub inputs: Vec<String>,
    pub exports: BTreeSet<String>,
    /// Source entry this output was produced for, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    /// Style output belonging to this entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css_bundle: Option<String>,
    /// Whether this output is the target's script entry.
    pub is_entry_point: bool,
}

/// Root-relative description of every output of one build.
///
/// Equality ignores key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BuildManifest {
    outputs: IndexMap<String, ManifestEntry>,
}

impl BuildManifest {
    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.outputs.get(path)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.outputs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(String::as_str)
    }

    pub fn script_entries(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.iter().filter(|(_, entry)| entry.is_entry_point)
    }

    /// The script entry point, the first if there are several.
    pub fn script_entry(&self) -> Option<(&str, &ManifestEntry)> {
        self.script_entries().next()
    }

    pub(crate) fn from_outputs(outputs: IndexMap<String, ManifestEntry>) -> Self {
        Self { outputs }
    }

    pub(crate) fn into_outputs(self) -> IndexMap<String, ManifestEntry> {
        self.outputs
    }
}

impl FromIterator<(String, ManifestEntry)> for BuildManifest {
    fn from_iter<T: IntoIterator<Item = (String, ManifestEntry)>>(iter: T) -> Self {
        Self {
            outputs: iter.into_iter().collect(),
        }
    }
}

/// A sanitized manifest viewed as a metafile produced at the modular root.
///
/// Sanitizing the result yields the original manifest again.
pub fn to_raw(manifest: &BuildManifest, modular_root: &Path) -> RawMetafile {
    RawMetafile {
        working_dir: modular_root.to_path_buf(),
        outputs: manifest
            .iter()
            .map(|(path, entry)| {
                let output = RawOutput {
                    bytes: entry.bytes,
                    inputs: entry
                        .inputs
                        .iter()
                        .map(|input| (input.clone(), RawOutputInput::default()))
                        .collect(),
                    imports: Vec::new(),
                    exports: entry.exports.iter().cloned().collect(),
                    entry_point: entry.entry_point.clone(),
                    css_bundle: entry.css_bundle.clone(),
                };
                (path.to_string(), output)
            })
            .collect(),
    }
}

/// Rewrite a raw metafile relative to `modular_root`.
///
/// Fails with [`Error::PathResolution`] when an output lies outside the root.
/// Inputs outside the root stay absolute; virtual inputs stay as named.
pub fn sanitize(raw: &RawMetafile, modular_root: &Path) -> Result<BuildManifest> {
    let root = modular_root.to_path_buf().clean();
    let working_dir = if raw.working_dir.as_os_str().is_empty() {
        root.clone()
    } else {
        root.join(&raw.working_dir).clean()
    };

    let mut outputs = IndexMap::with_capacity(raw.outputs.len());
    for (path, output) in &raw.outputs {
        let key = output_path(path, &working_dir, &root)?;
        let css_bundle = output
            .css_bundle
            .as_deref()
            .map(|css| output_path(css, &working_dir, &root))
            .transpose()?;

        let mut inputs: Vec<String> = Vec::with_capacity(output.inputs.len());
        for input in output.inputs.keys() {
            let input = input_path(input, &working_dir, &root);
            if !inputs.contains(&input) {
                inputs.push(input);
            }
        }

        let entry_point = output
            .entry_point
            .as_deref()
            .map(|entry| input_path(entry, &working_dir, &root));

        let is_entry_point = entry_point.is_some() && is_script(&key);

        outputs.insert(
            key,
            ManifestEntry {
                bytes: output.bytes,
                inputs,
                exports: output.exports.iter().cloned().collect(),
                entry_point,
                css_bundle,
                is_entry_point,
            },
        );
    }

    Ok(BuildManifest { outputs })
}

fn is_script(path: &str) -> bool {
    [".js", ".mjs"].iter().any(|ext| path.ends_with(ext))
}

fn output_path(path: &str, working_dir: &Path, root: &Path) -> Result<String> {
    let resolved = resolve(strip_namespace(path).unwrap_or(path), working_dir);
    relative_to(&resolved, root).ok_or_else(|| Error::PathResolution {
        path: resolved.display().to_string(),
        root: root.display().to_string(),
    })
}

fn input_path(path: &str, working_dir: &Path, root: &Path) -> String {
    if let Some(virtual_name) = virtual_module(path) {
        return virtual_name.to_string();
    }
    let resolved = resolve(strip_namespace(path).unwrap_or(path), working_dir);
    relative_to(&resolved, root).unwrap_or_else(|| to_slash(&resolved))
}

/// Names of modules that do not live on disk, kept verbatim.
fn virtual_module(path: &str) -> Option<&str> {
    if let Some(stripped) = path.strip_prefix('\0') {
        return Some(stripped);
    }
    if path.starts_with('<') {
        return Some(path);
    }
    match path.split_once(':') {
        Some(("file", _)) => None,
        // Drive letters are paths, longer prefixes are namespaces.
        Some((namespace, _)) if namespace.len() > 1 && is_namespace(namespace) => Some(path),
        _ => None,
    }
}

fn is_namespace(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn strip_namespace(path: &str) -> Option<&str> {
    path.strip_prefix("file:")
}

fn resolve(path: &str, working_dir: &Path) -> PathBuf {
    working_dir.join(path).clean()
}

fn relative_to(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return None;
    }
    Some(to_slash(relative))
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
