//! Shared fixtures for the assembly tests.
//!
//! [`ScriptedBundler`] stands in for Rolldown: it emits a fixed set of
//! outputs for a file entry, echoes virtual entries back as their own
//! output and externalizes through the configured rules, so the pipeline can
//! be exercised without compiling anything.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use modular_bundler::metafile::RawOutput;
use modular_bundler::{
    BundleConfig, BundleFailure, BundleOutput, Bundler, EntrySource, ExternalizationRecord,
    ExtractedDiagnostic, NamingTemplates, OutputFile, RawMetafile,
};
use modular_config::{PackageDependency, Paths, TargetType};

pub const ENTRY_HASH: &str = "a1b2c3d4";
pub const STYLE_HASH: &str = "e5f6a7b8";

/// A monorepo on disk with a single target under `packages/<name>`.
pub struct Workspace {
    pub dir: TempDir,
    pub name: String,
}

impl Workspace {
    pub fn new(name: &str, kind: TargetType) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let app = dir.path().join("packages").join(name);
        fs::create_dir_all(app.join("src")).expect("create src");
        fs::write(
            app.join("package.json"),
            format!(r#"{{ "name": "{name}", "modular": {{ "type": "{kind}" }} }}"#),
        )
        .expect("write package.json");
        fs::write(
            app.join("src/index.tsx"),
            "export default function App() { return null; }\n",
        )
        .expect("write entry");
        Self {
            dir,
            name: name.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn app_dir(&self) -> PathBuf {
        self.root().join("packages").join(&self.name)
    }

    pub fn write_public(&self, relative: &str, contents: &str) {
        let path = self.app_dir().join("public").join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("create public");
        fs::write(path, contents).expect("write public file");
    }

    pub fn paths(&self, public_url: Option<&str>) -> Paths {
        Paths::new(self.root(), self.app_dir(), public_url).expect("paths")
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root().join("dist").join(&self.name)
    }
}

pub fn deps(pairs: &[(&str, &str)]) -> PackageDependency {
    pairs.iter().copied().collect()
}

/// Answer to a virtual entry.
#[derive(Debug, Clone, Default)]
pub enum VirtualEntry {
    /// Echo the source back as `<name>.js`, externalizing shared imports.
    #[default]
    Echo,
    /// Succeed without emitting a script.
    NoScript,
    /// Reject with these diagnostics.
    Fail(Vec<ExtractedDiagnostic>),
}

/// What the scripted bundler produces for a file entry.
#[derive(Debug, Default)]
pub struct ScriptedBundler {
    /// Bare specifiers imported by the entry.
    pub imports: Vec<String>,
    /// Returned instead of any output when non-empty.
    pub diagnostics: Vec<ExtractedDiagnostic>,
    /// Emit a style sheet linked to the entry.
    pub with_style: bool,
    /// Report the style sheet without writing it.
    pub lose_style: bool,
    /// How virtual entries (the trampoline) are answered.
    pub virtual_entry: VirtualEntry,
    /// Every configuration received, in call order.
    pub calls: Mutex<Vec<BundleConfig>>,
}

impl ScriptedBundler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn importing(mut self, specifiers: &[&str]) -> Self {
        self.imports = specifiers.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_style(mut self) -> Self {
        self.with_style = true;
        self
    }

    pub fn losing_style(mut self) -> Self {
        self.with_style = true;
        self.lose_style = true;
        self
    }

    pub fn failing(mut self, diagnostics: Vec<ExtractedDiagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn trampoline_without_script(mut self) -> Self {
        self.virtual_entry = VirtualEntry::NoScript;
        self
    }

    pub fn trampoline_failing(mut self, diagnostics: Vec<ExtractedDiagnostic>) -> Self {
        self.virtual_entry = VirtualEntry::Fail(diagnostics);
        self
    }

    pub fn calls(&self) -> Vec<BundleConfig> {
        self.calls.lock().clone()
    }

    fn emit_file_entry(
        &self,
        config: &BundleConfig,
        entry: &Path,
        record: &mut ExternalizationRecord,
    ) -> (RawMetafile, Vec<OutputFile>) {
        let entry_name = config.entry.name();
        let entry_input = entry
            .strip_prefix(&config.working_dir)
            .unwrap_or(entry)
            .to_string_lossy()
            .replace('\\', "/");

        let mut code = String::new();
        for specifier in &self.imports {
            let resolved = config
                .externalizer
                .as_ref()
                .and_then(|ext| ext.externalize_into(specifier, record))
                .unwrap_or_else(|| format!("/bundled/{specifier}"));
            code.push_str(&format!("import \"{resolved}\";\n"));
        }
        code.push_str("export default function App() { return null; }\n");

        let mut metafile = RawMetafile::new(&config.working_dir);
        let mut files = Vec::new();

        let script = config.out_dir.join(NamingTemplates::render(
            &config.naming.entries,
            &entry_name,
            ENTRY_HASH,
            ".js",
        ));
        let mut script_output = RawOutput::with_inputs(code.len() as u64, [entry_input.clone()]);
        script_output.entry_point = Some(entry_input.clone());
        script_output.exports = vec!["default".to_string()];

        if self.with_style {
            let style = config.out_dir.join(NamingTemplates::render(
                &config.naming.styles,
                &entry_name,
                STYLE_HASH,
                ".css",
            ));
            let css = "body{margin:0}";
            script_output.css_bundle = Some(style.display().to_string());
            let mut style_output = RawOutput::with_inputs(css.len() as u64, [entry_input.clone()]);
            style_output.entry_point = Some(entry_input.clone());
            metafile.insert(style.display().to_string(), style_output);
            if !self.lose_style {
                files.push(OutputFile {
                    path: style,
                    contents: css.as_bytes().to_vec(),
                });
            }
        }

        metafile.insert(script.display().to_string(), script_output);
        files.push(OutputFile {
            path: script,
            contents: code.into_bytes(),
        });
        (metafile, files)
    }

    fn emit_virtual_entry(
        &self,
        config: &BundleConfig,
        name: &str,
        contents: &str,
        record: &mut ExternalizationRecord,
    ) -> (RawMetafile, Vec<OutputFile>) {
        let mut code = contents.to_string();
        if let Some(externalizer) = &config.externalizer {
            let shared: Vec<String> = externalizer.shared().names().map(String::from).collect();
            for dep in shared {
                let quoted = format!("import(\"{dep}\")");
                if code.contains(&quoted) {
                    if let Some(url) = externalizer.externalize_into(&dep, record) {
                        code = code.replace(&quoted, &format!("import(\"{url}\")"));
                    }
                }
            }
        }

        let path = config.out_dir.join(format!("{name}.js"));
        let mut metafile = RawMetafile::new(&config.working_dir);
        let mut output = RawOutput::with_inputs(code.len() as u64, [format!("\0{name}")]);
        output.entry_point = Some(format!("\0{name}"));
        metafile.insert(path.display().to_string(), output);
        (
            metafile,
            vec![OutputFile {
                path,
                contents: code.into_bytes(),
            }],
        )
    }
}

#[async_trait]
impl Bundler for ScriptedBundler {
    async fn bundle(
        &self,
        config: BundleConfig,
        record: &mut ExternalizationRecord,
    ) -> Result<BundleOutput, BundleFailure> {
        self.calls.lock().push(config.clone());
        if !self.diagnostics.is_empty() {
            return Err(BundleFailure::Diagnostics(self.diagnostics.clone()));
        }

        let (metafile, output_files) = match &config.entry {
            EntrySource::File(entry) => self.emit_file_entry(&config, entry, record),
            EntrySource::Virtual { name, contents, .. } => match &self.virtual_entry {
                VirtualEntry::Echo => self.emit_virtual_entry(&config, name, contents, record),
                VirtualEntry::NoScript => (RawMetafile::new(&config.working_dir), Vec::new()),
                VirtualEntry::Fail(diagnostics) => {
                    return Err(BundleFailure::Diagnostics(diagnostics.clone()));
                }
            },
        };

        if config.write {
            for file in &output_files {
                let parent = file.path.parent().expect("output parent");
                fs::create_dir_all(parent).map_err(modular_bundler::Error::from)?;
                fs::write(&file.path, &file.contents).map_err(modular_bundler::Error::from)?;
            }
        }

        Ok(BundleOutput {
            metafile,
            output_files,
        })
    }
}
