//! The seam between assembly and the bundler.
//!
//! Assembly never looks inside the bundler: it hands over a [`BundleConfig`]
//! and gets back either a [`RawMetafile`] describing what was emitted or a
//! list of diagnostics.

use std::path::PathBuf;

use async_trait::async_trait;

use modular_config::EsTarget;

use crate::diagnostics::ExtractedDiagnostic;
use crate::externalize::{DependencyExternalizer, ExternalizationRecord};
use crate::metafile::RawMetafile;

/// Where the bundle starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    /// A source file on disk.
    File(PathBuf),
    /// Generated source; its relative imports resolve from `resolve_dir`.
    Virtual {
        name: String,
        contents: String,
        resolve_dir: PathBuf,
    },
}

impl EntrySource {
    /// Output name for the entry chunk.
    pub fn name(&self) -> String {
        match self {
            EntrySource::File(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "index".to_string()),
            EntrySource::Virtual { name, .. } => name.clone(),
        }
    }
}

/// Output file name templates, relative to the output directory, without
/// extension. `[name]` and `[hash]` are substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingTemplates {
    pub entries: String,
    pub chunks: String,
    pub assets: String,
    /// Style sheets extracted from scripts.
    pub styles: String,
}

impl Default for NamingTemplates {
    fn default() -> Self {
        Self {
            entries: "static/js/[name]-[hash]".to_string(),
            chunks: "static/js/[name]-[hash]".to_string(),
            assets: "static/media/[name]-[hash]".to_string(),
            styles: "static/css/[name]-[hash]".to_string(),
        }
    }
}

impl NamingTemplates {
    /// Render `template` for one output. `ext` includes its leading dot.
    pub fn render(template: &str, name: &str, hash: &str, ext: &str) -> String {
        let mut file = template.replace("[name]", name).replace("[hash]", hash);
        file.push_str(ext);
        file
    }
}

/// Everything the bundler needs for one invocation.
#[derive(Debug, Clone)]
pub struct BundleConfig {
    pub entry: EntrySource,
    /// Directory the bundler runs in; relative metafile paths use it.
    pub working_dir: PathBuf,
    pub out_dir: PathBuf,
    pub naming: NamingTemplates,
    pub target: EsTarget,
    /// Specifiers left as-is in the output.
    pub externals: Vec<String>,
    /// Shared dependency rules; `None` bundles every dependency.
    pub externalizer: Option<DependencyExternalizer>,
    /// Write outputs to `out_dir`. When `false` they are only returned.
    pub write: bool,
}

impl BundleConfig {
    pub fn new(entry: EntrySource, working_dir: PathBuf, out_dir: PathBuf) -> Self {
        Self {
            entry,
            working_dir,
            out_dir,
            naming: NamingTemplates::default(),
            target: EsTarget::default(),
            externals: Vec::new(),
            externalizer: None,
            write: true,
        }
    }
}

/// A file emitted by the bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Absolute path the file is (or would be) written to.
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct BundleOutput {
    pub metafile: RawMetafile,
    pub output_files: Vec<OutputFile>,
}

#[derive(Debug, thiserror::Error)]
pub enum BundleFailure {
    /// The sources did not compile.
    #[error("{} bundler diagnostic(s)", .0.len())]
    Diagnostics(Vec<ExtractedDiagnostic>),

    /// Compiled output could not be written.
    #[error(transparent)]
    Write(#[from] crate::Error),
}

/// A bundler able to compile one entry.
///
/// Implementations record every import they externalize in `record`; the
/// record belongs to the caller and outlives the invocation.
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn bundle(
        &self,
        config: BundleConfig,
        record: &mut ExternalizationRecord,
    ) -> Result<BundleOutput, BundleFailure>;
}
