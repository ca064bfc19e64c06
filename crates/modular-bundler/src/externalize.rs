//! Dependency externalization for view targets.
//!
//! A view declares the dependencies it shares with its host. Imports of those
//! dependencies are left out of the bundle and rewritten to registry URLs so
//! that every view on a page loads the same module instance.
//!
//! [`DependencyExternalizer`] is the pure decision: given a specifier, should
//! it be externalized, and where does it resolve? The matches are accumulated
//! in an [`ExternalizationRecord`] owned by whoever invokes the bundler.

use indexmap::IndexMap;
use serde::Serialize;

use modular_config::{ConfigError, DEFAULT_REGISTRY, PackageDependency};

/// A dependency that was left out of the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ExternalizedImport {
    /// Top-level package name.
    pub specifier: String,
    /// Version range declared by the target.
    pub version_range: String,
}

/// Externalized dependencies, one entry per package name.
///
/// Insertion order is kept so generated code is stable between builds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExternalizationRecord(IndexMap<String, String>);

impl ExternalizationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the dependency was already recorded.
    pub fn insert(&mut self, import: ExternalizedImport) -> bool {
        if self.0.contains_key(&import.specifier) {
            return false;
        }
        self.0.insert(import.specifier, import.version_range);
        true
    }

    pub fn merge(&mut self, other: ExternalizationRecord) {
        for (specifier, version_range) in other.0 {
            self.0.entry(specifier).or_insert(version_range);
        }
    }

    pub fn contains(&self, specifier: &str) -> bool {
        self.0.contains_key(specifier)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn imports(&self) -> impl Iterator<Item = ExternalizedImport> + '_ {
        self.0.iter().map(|(specifier, version_range)| ExternalizedImport {
            specifier: specifier.clone(),
            version_range: version_range.clone(),
        })
    }
}

impl FromIterator<ExternalizedImport> for ExternalizationRecord {
    fn from_iter<T: IntoIterator<Item = ExternalizedImport>>(iter: T) -> Self {
        let mut record = Self::new();
        for import in iter {
            record.insert(import);
        }
        record
    }
}

/// URL template locating a shared dependency, e.g.
/// `https://esm.sh/[name]@[version]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTemplate(String);

impl RegistryTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, ConfigError> {
        let template = template.into();
        if !template.contains("[name]") {
            return Err(ConfigError::InvalidValue {
                field: "dependency_registry".to_string(),
                hint: format!("'{template}' has no [name] placeholder"),
            });
        }
        Ok(Self(template.trim_end_matches('/').to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL for `name` at `version_range`, followed by an optional subpath
    /// such as `/jsx-runtime`.
    pub fn url(&self, name: &str, version_range: &str, subpath: &str) -> String {
        let mut url = self
            .0
            .replace("[name]", name)
            .replace("[version]", &urlencoding::encode(version_range));
        url.push_str(subpath);
        url
    }
}

impl Default for RegistryTemplate {
    fn default() -> Self {
        Self(DEFAULT_REGISTRY.to_string())
    }
}

/// Outcome of externalizing a single import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Externalization {
    pub import: ExternalizedImport,
    /// Registry URL the import is rewritten to.
    pub url: String,
}

/// Decides which imports are shared with the host.
#[derive(Debug, Clone)]
pub struct DependencyExternalizer {
    shared: PackageDependency,
    registry: RegistryTemplate,
}

impl DependencyExternalizer {
    pub fn new(shared: PackageDependency, registry: RegistryTemplate) -> Self {
        Self { shared, registry }
    }

    pub fn shared(&self) -> &PackageDependency {
        &self.shared
    }

    pub fn registry(&self) -> &RegistryTemplate {
        &self.registry
    }

    /// `Some` when `specifier` belongs to a shared dependency.
    ///
    /// Subpath imports (`react-dom/client`) are externalized under their
    /// package name; relative, absolute and URL specifiers never are.
    pub fn externalize(&self, specifier: &str) -> Option<Externalization> {
        let (name, range) = self.shared.match_specifier(specifier)?;
        let subpath = &specifier[name.len()..];
        Some(Externalization {
            url: self.registry.url(name, range, subpath),
            import: ExternalizedImport {
                specifier: name.to_string(),
                version_range: range.to_string(),
            },
        })
    }

    /// Like [`externalize`](Self::externalize), recording matches.
    pub fn externalize_into(
        &self,
        specifier: &str,
        record: &mut ExternalizationRecord,
    ) -> Option<String> {
        let hit = self.externalize(specifier)?;
        if record.insert(hit.import) {
            tracing::debug!("Externalized {specifier} -> {}", hit.url);
        }
        Some(hit.url)
    }
}
