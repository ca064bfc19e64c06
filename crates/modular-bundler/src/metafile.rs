//! The bundler's raw output description.
//!
//! Shaped like an esbuild metafile: output paths may be absolute or relative
//! to `working_dir`, and input paths may carry bundler-internal prefixes for
//! virtual modules.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetafile {
    /// Directory relative paths are resolved against.
    pub working_dir: PathBuf,
    #[serde(default)]
    pub outputs: IndexMap<String, RawOutput>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOutput {
    pub bytes: u64,
    #[serde(default)]
    pub inputs: IndexMap<String, RawOutputInput>,
    #[serde(default)]
    pub imports: Vec<RawImport>,
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_bundle: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOutputInput {
    pub bytes_in_output: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImport {
    pub path: String,
    pub kind: String,
    #[serde(default)]
    pub external: bool,
}

impl RawMetafile {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            outputs: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, path: impl Into<String>, output: RawOutput) {
        self.outputs.insert(path.into(), output);
    }
}

impl RawOutput {
    pub fn with_inputs<I, S>(bytes: u64, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bytes,
            inputs: inputs
                .into_iter()
                .map(|input| (input.into(), RawOutputInput::default()))
                .collect(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_esbuild_shaped_json() {
        let raw: RawMetafile = serde_json::from_str(
            r#"{
                "workingDir": "/repo",
                "outputs": {
                    "dist/app/static/js/index-ABC.js": {
                        "bytes": 120,
                        "inputs": { "packages/app/src/index.ts": { "bytesInOutput": 80 } },
                        "imports": [{ "path": "https://esm.sh/react@%5E18", "kind": "import-statement", "external": true }],
                        "exports": ["default"],
                        "entryPoint": "packages/app/src/index.ts",
                        "cssBundle": "dist/app/static/css/index-DEF.css"
                    }
                }
            }"#,
        )
        .unwrap();
        let output = &raw.outputs["dist/app/static/js/index-ABC.js"];
        assert_eq!(output.bytes, 120);
        assert_eq!(output.inputs["packages/app/src/index.ts"].bytes_in_output, 80);
        assert!(output.imports[0].external);
        assert_eq!(
            output.css_bundle.as_deref(),
            Some("dist/app/static/css/index-DEF.css")
        );
    }
}
