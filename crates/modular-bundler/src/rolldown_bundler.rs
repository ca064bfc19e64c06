//! [`Bundler`] backed by Rolldown.
//!
//! Rolldown writes flat `[name].js` files. The outputs are renamed here to
//! the configured [`NamingTemplates`] with a content hash, references between
//! them are rewritten, and an esbuild-shaped [`RawMetafile`] is derived from
//! the chunk information.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use rolldown::{
    BundlerBuilder as RolldownBundlerBuilder, BundlerOptions, InputItem, OutputFormat, Platform,
    RawMinifyOptions,
};
use rolldown_common::Output;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::bundler::{
    BundleConfig, BundleFailure, BundleOutput, Bundler, EntrySource, NamingTemplates, OutputFile,
};
use crate::diagnostics::extract_from_rolldown_error;
use crate::externalize::ExternalizationRecord;
use crate::metafile::{RawImport, RawMetafile, RawOutput, RawOutputInput};
use crate::plugins::externalize::{EXTERNAL_MARKER, strip_external_markers};
use crate::plugins::{ExternalizePlugin, PluginRegistry, VirtualEntryPlugin};
use crate::relocate::is_style_output;
use crate::writer;

/// Length of the content hash in file names.
const HASH_LENGTH: usize = 8;

/// Production bundler.
#[derive(Debug, Clone)]
pub struct RolldownBundler {
    minify: bool,
}

impl RolldownBundler {
    pub fn new() -> Self {
        Self { minify: true }
    }

    /// Disable minification, mostly useful to inspect output.
    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    fn options(&self, config: &BundleConfig, import: String) -> BundlerOptions {
        BundlerOptions {
            input: Some(vec![InputItem {
                name: Some(config.entry.name()),
                import,
            }]),
            cwd: Some(config.working_dir.clone()),
            format: Some(OutputFormat::Esm),
            platform: Some(Platform::Browser),
            minify: self.minify.then(|| RawMinifyOptions::from(true)),
            ..Default::default()
        }
    }
}

impl Default for RolldownBundler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bundler for RolldownBundler {
    async fn bundle(
        &self,
        config: BundleConfig,
        record: &mut ExternalizationRecord,
    ) -> Result<BundleOutput, BundleFailure> {
        let externalized = Arc::new(Mutex::new(ExternalizationRecord::new()));
        let mut registry = PluginRegistry::new();

        let import = match &config.entry {
            EntrySource::File(path) => path.to_string_lossy().into_owned(),
            EntrySource::Virtual {
                name,
                contents,
                resolve_dir,
            } => {
                let plugin = VirtualEntryPlugin::new(name, contents.clone(), resolve_dir.clone())
                    .with_externals(config.externals.clone());
                let id = plugin.id().to_string();
                registry.add(plugin);
                id
            }
        };
        registry.add(ExternalizePlugin::new(
            config.externalizer.clone(),
            config.externals.clone(),
            Arc::clone(&externalized),
        ));

        debug!(
            "Bundling {} for {} from {}",
            config.entry.name(),
            config.target,
            config.working_dir.display()
        );

        let mut bundler = RolldownBundlerBuilder::default()
            .with_options(self.options(&config, import))
            .with_plugins(registry.into_rolldown_plugins())
            .build()
            .map_err(|e| BundleFailure::Diagnostics(extract_from_rolldown_error(&e)))?;

        let bundle = bundler
            .generate()
            .await
            .map_err(|e| BundleFailure::Diagnostics(extract_from_rolldown_error(&e)))?;

        record.merge(std::mem::take(&mut *externalized.lock()));

        let emitted: Vec<Emitted> = bundle.assets.iter().map(Emitted::from_rolldown).collect();
        let output = assemble(&config, emitted)?;

        if config.write {
            let files = output
                .output_files
                .iter()
                .map(|file| (file.path.clone(), file.contents.clone()))
                .collect();
            writer::write_all_atomic(files).await?;
        }

        Ok(output)
    }
}

/// What Rolldown emitted, reduced to what assembly needs.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Emitted {
    Chunk(EmittedChunk),
    Asset(EmittedAsset),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EmittedChunk {
    filename: String,
    name: String,
    code: String,
    is_entry: bool,
    facade_module_id: Option<String>,
    /// Module ids with their rendered size.
    modules: Vec<(String, u64)>,
    imports: Vec<String>,
    dynamic_imports: Vec<String>,
    exports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EmittedAsset {
    filename: String,
    names: Vec<String>,
    original_file_names: Vec<String>,
    source: Vec<u8>,
}

impl Emitted {
    fn from_rolldown(output: &Output) -> Self {
        match output {
            Output::Chunk(chunk) => {
                let rendered: IndexMap<String, u64> = chunk
                    .modules
                    .keys
                    .iter()
                    .zip(chunk.modules.values.iter())
                    .map(|(id, module)| {
                        let bytes = module.code().map(|code| code.len() as u64).unwrap_or(0);
                        (id.to_string(), bytes)
                    })
                    .collect();
                let modules = chunk
                    .module_ids
                    .iter()
                    .map(|id| {
                        let id = id.to_string();
                        let bytes = rendered.get(&id).copied().unwrap_or(0);
                        (id, bytes)
                    })
                    .collect();

                Emitted::Chunk(EmittedChunk {
                    filename: chunk.filename.to_string(),
                    name: chunk.name.to_string(),
                    code: chunk.code.clone(),
                    is_entry: chunk.is_entry,
                    facade_module_id: chunk.facade_module_id.as_ref().map(|id| id.to_string()),
                    modules,
                    imports: chunk.imports.iter().map(|s| s.to_string()).collect(),
                    dynamic_imports: chunk.dynamic_imports.iter().map(|s| s.to_string()).collect(),
                    exports: chunk.exports.iter().map(|s| s.to_string()).collect(),
                })
            }
            Output::Asset(asset) => Emitted::Asset(EmittedAsset {
                filename: asset.filename.to_string(),
                names: asset.names.clone(),
                original_file_names: asset.original_file_names.clone(),
                source: asset.source.as_bytes().to_vec(),
            }),
        }
    }

    fn filename(&self) -> &str {
        match self {
            Emitted::Chunk(chunk) => &chunk.filename,
            Emitted::Asset(asset) => &asset.filename,
        }
    }
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let mut hash = format!("{:x}", hasher.finalize());
    hash.truncate(HASH_LENGTH);
    hash
}

/// `(stem, extension)` of a flat or nested file name; the extension keeps
/// its dot and covers `.css.map`-style double extensions.
fn split_name(filename: &str) -> (&str, &str) {
    let base = filename.rsplit('/').next().unwrap_or(filename);
    match base.find('.') {
        Some(0) | None => (base, ""),
        Some(dot) => (&base[..dot], &base[dot..]),
    }
}

/// Style sheets and their maps, both named with the style template.
fn is_style(filename: &str) -> bool {
    is_style_output(filename)
}

/// Final name of one output under `naming`.
fn final_name(emitted: &Emitted, naming: &NamingTemplates) -> String {
    match emitted {
        Emitted::Chunk(chunk) => {
            let (stem, ext) = split_name(&chunk.filename);
            let name = if chunk.name.is_empty() { stem } else { &chunk.name };
            let template = if chunk.is_entry {
                &naming.entries
            } else {
                &naming.chunks
            };
            NamingTemplates::render(template, name, &content_hash(chunk.code.as_bytes()), ext)
        }
        Emitted::Asset(asset) => {
            let (stem, ext) = split_name(&asset.filename);
            let name = asset
                .names
                .first()
                .map(|n| split_name(n).0)
                .unwrap_or(stem);
            let template = if is_style(&asset.filename) {
                &naming.styles
            } else {
                &naming.assets
            };
            NamingTemplates::render(template, name, &content_hash(&asset.source), ext)
        }
    }
}

/// Relative URL from the file `from` to the file `to`, both relative to the
/// output directory.
fn relative_url(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = from.split('/').collect();
    let from_dir = &from_dir[..from_dir.len().saturating_sub(1)];
    let to_parts: Vec<&str> = to.split('/').collect();

    let common = from_dir
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let ups = from_dir.len() - common;
    let mut url = if ups == 0 {
        String::from("./")
    } else {
        "../".repeat(ups)
    };
    url.push_str(&to_parts[common..].join("/"));
    url
}

/// Point `./old` references in `code` at the renamed outputs.
fn rewrite_references(code: &str, own_name: &str, renamed: &IndexMap<String, String>) -> String {
    let mut code = strip_external_markers(code).into_owned();
    for (old, new) in renamed {
        let url = relative_url(own_name, new);
        for quote in ['"', '\''] {
            let needle = format!("{quote}./{old}{quote}");
            if code.contains(&needle) {
                code = code.replace(&needle, &format!("{quote}{url}{quote}"));
            }
        }
    }
    code
}

fn import_entry(
    path: &str,
    kind: &str,
    renamed: &IndexMap<String, String>,
    out_dir: &Path,
) -> RawImport {
    match renamed.get(path) {
        Some(new) => RawImport {
            path: out_dir.join(new).to_string_lossy().into_owned(),
            kind: kind.to_string(),
            external: false,
        },
        None => RawImport {
            path: path.strip_prefix(EXTERNAL_MARKER).unwrap_or(path).to_string(),
            kind: kind.to_string(),
            external: true,
        },
    }
}

/// Rename, relink and describe everything Rolldown emitted.
fn assemble(config: &BundleConfig, emitted: Vec<Emitted>) -> Result<BundleOutput, BundleFailure> {
    let renamed: IndexMap<String, String> = emitted
        .iter()
        .map(|output| {
            (
                output.filename().to_string(),
                final_name(output, &config.naming),
            )
        })
        .collect();

    let absolute = |name: &str| -> Result<String, BundleFailure> {
        let path = writer::validate_output_path(&config.out_dir, name)?;
        Ok(path.to_string_lossy().into_owned())
    };

    // Style sheets are linked to the entry chunk sharing their name.
    let mut styles_by_name: IndexMap<String, String> = IndexMap::new();
    for output in &emitted {
        if let Emitted::Asset(asset) = output {
            if asset.filename.ends_with(".css") {
                let name = asset
                    .names
                    .first()
                    .map(|n| split_name(n).0)
                    .unwrap_or_else(|| split_name(&asset.filename).0);
                styles_by_name.insert(name.to_string(), renamed[&asset.filename].clone());
            }
        }
    }

    let mut metafile = RawMetafile::new(config.working_dir.clone());
    let mut output_files = Vec::with_capacity(emitted.len());
    let mut style_entries: IndexMap<String, String> = IndexMap::new();

    for output in emitted {
        match output {
            Emitted::Chunk(chunk) => {
                let new_name = &renamed[&chunk.filename];
                let code = rewrite_references(&chunk.code, new_name, &renamed);

                let css_bundle = if chunk.is_entry {
                    styles_by_name.get(&chunk.name).cloned()
                } else {
                    None
                };
                if let (Some(css), Some(entry)) = (&css_bundle, &chunk.facade_module_id) {
                    style_entries.insert(css.clone(), entry.clone());
                }

                let mut raw = RawOutput {
                    bytes: code.len() as u64,
                    inputs: chunk
                        .modules
                        .iter()
                        .map(|(id, bytes)| {
                            (
                                id.clone(),
                                RawOutputInput {
                                    bytes_in_output: *bytes,
                                },
                            )
                        })
                        .collect(),
                    exports: chunk.exports.clone(),
                    entry_point: if chunk.is_entry {
                        chunk.facade_module_id.clone()
                    } else {
                        None
                    },
                    css_bundle: css_bundle.as_deref().map(&absolute).transpose()?,
                    ..Default::default()
                };
                raw.imports.extend(chunk.imports.iter().map(|path| {
                    import_entry(path, "import-statement", &renamed, &config.out_dir)
                }));
                raw.imports.extend(chunk.dynamic_imports.iter().map(|path| {
                    import_entry(path, "dynamic-import", &renamed, &config.out_dir)
                }));

                let path = absolute(new_name)?;
                metafile.insert(path.clone(), raw);
                output_files.push(OutputFile {
                    path: path.into(),
                    contents: code.into_bytes(),
                });
            }
            Emitted::Asset(asset) => {
                let new_name = &renamed[&asset.filename];
                let raw = RawOutput::with_inputs(
                    asset.source.len() as u64,
                    asset.original_file_names.iter().cloned(),
                );
                let path = absolute(new_name)?;
                metafile.insert(path.clone(), raw);
                output_files.push(OutputFile {
                    path: path.into(),
                    contents: asset.source,
                });
            }
        }
    }

    // Style sheets report the entry they were extracted from.
    for (css, entry) in style_entries {
        let path = absolute(&css)?;
        if let Some(output) = metafile.outputs.get_mut(&path) {
            output.entry_point = Some(entry);
        }
    }

    Ok(BundleOutput {
        metafile,
        output_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> BundleConfig {
        BundleConfig::new(
            EntrySource::File(PathBuf::from("/repo/packages/app/src/index.tsx")),
            PathBuf::from("/repo/packages/app"),
            PathBuf::from("/repo/dist/app"),
        )
    }

    fn entry_chunk() -> EmittedChunk {
        EmittedChunk {
            filename: "index.js".into(),
            name: "index".into(),
            code: "import(\"./lazy-abc.js\");import \"modular-external:./other.js\";".into(),
            is_entry: true,
            facade_module_id: Some("/repo/packages/app/src/index.tsx".into()),
            modules: vec![("/repo/packages/app/src/index.tsx".into(), 40)],
            imports: vec!["modular-external:./other.js".into()],
            dynamic_imports: vec!["lazy-abc.js".into()],
            exports: vec!["default".into()],
        }
    }

    fn lazy_chunk() -> EmittedChunk {
        EmittedChunk {
            filename: "lazy-abc.js".into(),
            name: "lazy".into(),
            code: "export default 1;".into(),
            is_entry: false,
            facade_module_id: None,
            modules: vec![("/repo/packages/app/src/lazy.ts".into(), 17)],
            imports: Vec::new(),
            dynamic_imports: Vec::new(),
            exports: vec!["default".into()],
        }
    }

    fn style_asset() -> EmittedAsset {
        EmittedAsset {
            filename: "index.css".into(),
            names: vec!["index.css".into()],
            original_file_names: vec!["/repo/packages/app/src/index.css".into()],
            source: b"body{margin:0}".to_vec(),
        }
    }

    #[test]
    fn relative_urls_between_outputs() {
        assert_eq!(relative_url("static/js/a.js", "static/js/b.js"), "./b.js");
        assert_eq!(
            relative_url("static/js/a.js", "static/media/logo.png"),
            "../media/logo.png"
        );
        assert_eq!(relative_url("a.js", "static/js/b.js"), "./static/js/b.js");
    }

    #[test]
    fn split_names_keep_double_extensions() {
        assert_eq!(split_name("index.css.map"), ("index", ".css.map"));
        assert_eq!(split_name("static/js/lazy-abc.js"), ("lazy-abc", ".js"));
    }

    #[test]
    fn outputs_follow_naming_templates() {
        let output = assemble(
            &config(),
            vec![
                Emitted::Chunk(entry_chunk()),
                Emitted::Chunk(lazy_chunk()),
                Emitted::Asset(style_asset()),
            ],
        )
        .unwrap();

        let keys: Vec<_> = output.metafile.outputs.keys().cloned().collect();
        assert_eq!(keys.len(), 3);
        assert!(keys[0].starts_with("/repo/dist/app/static/js/index-"));
        assert!(keys[0].ends_with(".js"));
        assert!(keys[1].starts_with("/repo/dist/app/static/js/lazy-"));
        assert!(keys[2].starts_with("/repo/dist/app/static/css/index-"));
        assert!(keys[2].ends_with(".css"));

        let entry = &output.metafile.outputs[&keys[0]];
        assert_eq!(
            entry.entry_point.as_deref(),
            Some("/repo/packages/app/src/index.tsx")
        );
        assert_eq!(entry.css_bundle.as_deref(), Some(keys[2].as_str()));
        assert_eq!(
            entry.inputs["/repo/packages/app/src/index.tsx"].bytes_in_output,
            40
        );

        let style = &output.metafile.outputs[&keys[2]];
        assert_eq!(
            style.entry_point.as_deref(),
            Some("/repo/packages/app/src/index.tsx")
        );
    }

    #[test]
    fn references_and_markers_are_rewritten() {
        let output = assemble(
            &config(),
            vec![Emitted::Chunk(entry_chunk()), Emitted::Chunk(lazy_chunk())],
        )
        .unwrap();

        let entry = String::from_utf8(output.output_files[0].contents.clone()).unwrap();
        let lazy_name = output.output_files[1]
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(entry.contains(&format!("import(\"./{lazy_name}\")")));
        assert!(entry.contains("import \"./other.js\""));
        assert!(!entry.contains(EXTERNAL_MARKER));

        let entry_key = output.output_files[0].path.to_string_lossy().into_owned();
        let imports = &output.metafile.outputs[&entry_key].imports;
        assert_eq!(imports[0].path, "./other.js");
        assert!(imports[0].external);
        assert_eq!(imports[1].kind, "dynamic-import");
        assert!(!imports[1].external);
    }

    #[test]
    fn style_maps_are_named_like_style_sheets() {
        let map = EmittedAsset {
            filename: "index.css.map".into(),
            names: vec!["index.css.map".into()],
            original_file_names: Vec::new(),
            source: b"{}".to_vec(),
        };
        let name = final_name(&Emitted::Asset(map.clone()), &NamingTemplates::default());
        assert!(name.starts_with("static/css/index-"), "{name}");
        assert!(name.ends_with(".css.map"));

        let output = assemble(
            &config(),
            vec![
                Emitted::Chunk(entry_chunk()),
                Emitted::Asset(style_asset()),
                Emitted::Asset(map),
            ],
        )
        .unwrap();
        let entry_key = output.output_files[0].path.to_string_lossy().into_owned();
        let css_bundle = output.metafile.outputs[&entry_key]
            .css_bundle
            .clone()
            .unwrap();
        assert!(css_bundle.ends_with(".css"), "{css_bundle}");
    }

    #[test]
    fn hashes_follow_content() {
        let a = final_name(&Emitted::Chunk(lazy_chunk()), &NamingTemplates::default());
        let mut changed = lazy_chunk();
        changed.code.push_str("export const b = 2;");
        let b = final_name(&Emitted::Chunk(changed), &NamingTemplates::default());
        assert_ne!(a, b);
        assert_eq!(
            a,
            final_name(&Emitted::Chunk(lazy_chunk()), &NamingTemplates::default())
        );
    }
}
