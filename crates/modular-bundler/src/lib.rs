#![cfg_attr(docsrs, feature(doc_cfg))]

//! # modular-bundler
//!
//! Turns a compiled module graph into deployable output for modular apps and
//! views.
//!
//! The bundler itself sits behind the [`Bundler`] trait; [`RolldownBundler`]
//! is the production implementation. Around it this crate provides:
//!
//! - dependency externalization for shared libraries ([`DependencyExternalizer`])
//! - metafile sanitizing into a root-relative [`BuildManifest`]
//! - relocation of style-sheet outputs next to the hashed scripts
//! - `index.html` assembly and minification
//! - the view trampoline, a loader that resolves shared dependencies from a
//!   registry before importing the real entry
//!
//! [`build`] sequences all of it for one target.
//!
//! ```no_run
//! use modular_bundler::{BuildOptions, BuildTarget, RolldownBundler, build};
//! use modular_config::{PackageDependency, Paths, TargetType};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let paths = Paths::new("/repo", "/repo/packages/my-view", None)?;
//! let target = BuildTarget::new("my-view", TargetType::View, paths, PackageDependency::new());
//! let result = build(&RolldownBundler::new(), &target, &BuildOptions::default()).await?;
//! for (path, entry) in result.manifest.iter() {
//!     println!("{path}: {} bytes", entry.bytes);
//! }
//! # Ok(()) }
//! ```

pub mod build;
pub mod bundler;
pub mod diagnostics;
pub mod externalize;
pub mod html;
pub mod manifest;
pub mod metafile;
pub mod plugins;
pub mod relocate;
pub mod rolldown_bundler;
pub mod trampoline;
pub mod writer;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env, init_logging_with};

pub use build::{BuildOptions, BuildResult, BuildTarget, TrampolineFile, build};
pub use bundler::{
    BundleConfig, BundleFailure, BundleOutput, Bundler, EntrySource, NamingTemplates, OutputFile,
};
pub use diagnostics::{DiagnosticKind, DiagnosticSeverity, ExtractedDiagnostic};
pub use externalize::{
    DependencyExternalizer, Externalization, ExternalizationRecord, ExternalizedImport,
    RegistryTemplate,
};
pub use html::{HtmlInput, assemble_html, minify_html};
pub use manifest::{BuildManifest, ManifestEntry, sanitize};
pub use metafile::RawMetafile;
pub use relocate::relocate_styles;
pub use rolldown_bundler::RolldownBundler;
pub use trampoline::{TRAMPOLINE_FILE, Trampoline, TrampolineRequest, create_view_trampoline};

/// Error types for modular-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The bundler rejected the target's sources.
    #[error("Failed to build {target}")]
    Compile {
        target: String,
        diagnostics: Vec<ExtractedDiagnostic>,
    },

    /// Any other fatal error, tagged with the target being built.
    #[error("Failed to build {target}: {source}")]
    Target {
        target: String,
        #[source]
        source: Box<Error>,
    },

    /// A manifest entry has no file on disk.
    #[error("Manifest references {path} but the file does not exist")]
    ManifestInconsistency { path: String },

    /// Assembly could not proceed from otherwise valid inputs.
    #[error("{0}")]
    AssemblyInvariant(String),

    /// An output path cannot be expressed relative to the modular root.
    #[error("Output {path} is outside the modular root {root}")]
    PathResolution { path: String, root: String },

    /// HTML template failed to parse or render.
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Target configuration error.
    #[error(transparent)]
    Config(#[from] modular_config::ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error with context message.
    #[error("{message}")]
    IoError {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for modular-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Tag an error with the target it occurred in.
    ///
    /// Errors that already name a target are returned unchanged.
    pub fn for_target(self, target: &str) -> Self {
        match self {
            Error::Compile { .. } | Error::Target { .. } => self,
            other => Error::Target {
                target: target.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The error beneath any target tag.
    pub fn inner(&self) -> &Error {
        match self {
            Error::Target { source, .. } => source.inner(),
            other => other,
        }
    }

    /// Name of the failed target, when known.
    pub fn target(&self) -> Option<&str> {
        match self {
            Error::Compile { target, .. } | Error::Target { target, .. } => Some(target),
            _ => None,
        }
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Compile { .. } => "COMPILE_ERROR",
            Error::Target { source, .. } => return source.code(),
            Error::ManifestInconsistency { .. } => "MANIFEST_INCONSISTENCY",
            Error::AssemblyInvariant(_) => "ASSEMBLY_INVARIANT",
            Error::PathResolution { .. } => "PATH_RESOLUTION",
            Error::Template(_) => "TEMPLATE_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Io(_) | Error::IoError { .. } => "IO_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::Target { source, .. } => source.help(),
            Error::Compile { diagnostics, .. } => {
                if diagnostics.len() == 1 {
                    diagnostics[0]
                        .help
                        .as_ref()
                        .map(|h| Box::new(h.clone()) as Box<dyn std::fmt::Display>)
                } else {
                    Some(Box::new(format!(
                        "{} errors were reported by the bundler. See details above.",
                        diagnostics.len()
                    )))
                }
            }
            Error::ManifestInconsistency { .. } => Some(Box::new(
                "The bundler reported an output it did not write. Re-run the build; \
                 if it persists, check for another process cleaning the dist directory.",
            )),
            Error::AssemblyInvariant(_) => Some(Box::new(
                "Check that the target's entry point exports a module and that its \
                 package.json declares the right modular type.",
            )),
            Error::PathResolution { root, .. } => Some(Box::new(format!(
                "Build outputs must be written inside {root}."
            ))),
            _ => None,
        }
    }
}
