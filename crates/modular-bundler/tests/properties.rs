//! Property tests for manifest sanitizing and style relocation.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use proptest::prelude::*;

use modular_bundler::manifest::to_raw;
use modular_bundler::metafile::RawOutput;
use modular_bundler::relocate::{is_style_output, relocated_path};
use modular_bundler::{BuildManifest, ManifestEntry, RawMetafile, relocate_styles, sanitize};

const ROOT: &str = "/repo";

fn file_name() -> impl Strategy<Value = String> {
    ("[a-z]{1,8}", "[0-9a-f]{8}").prop_map(|(name, hash)| format!("{name}-{hash}"))
}

fn output_key() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["app", "view", "shop-admin"]),
        prop::sample::select(vec!["js", "css", "media"]),
        file_name(),
        prop::sample::select(vec![".js", ".css", ".css.map", ".svg"]),
    )
        .prop_map(|(target, dir, name, ext)| format!("dist/{target}/static/{dir}/{name}{ext}"))
}

fn manifest_entry() -> impl Strategy<Value = ManifestEntry> {
    (
        0u64..100_000,
        prop::collection::vec("packages/[a-z]{1,6}/src/[a-z]{1,6}\\.tsx", 0..4),
        prop::collection::btree_set("[a-z]{1,6}", 0..3),
        prop::option::of("packages/[a-z]{1,6}/src/index\\.tsx"),
    )
        .prop_map(|(bytes, mut inputs, exports, entry_point)| {
            let mut seen = HashSet::new();
            inputs.retain(|input| seen.insert(input.clone()));
            ManifestEntry {
                bytes,
                inputs,
                exports,
                entry_point,
                css_bundle: None,
                is_entry_point: false,
            }
        })
}

fn manifest() -> impl Strategy<Value = BuildManifest> {
    prop::collection::btree_map(output_key(), manifest_entry(), 0..12).prop_map(|outputs| {
        outputs
            .into_iter()
            .map(|(path, mut entry)| {
                entry.is_entry_point = entry.entry_point.is_some() && path.ends_with(".js");
                (path, entry)
            })
            .collect()
    })
}

/// The same outputs as reported by a bundler running in `working_dir`.
fn reported_from(manifest: &BuildManifest, working_dir: &str) -> RawMetafile {
    let depth = working_dir.split('/').filter(|s| !s.is_empty()).count();
    let up = "../".repeat(depth);
    let mut raw = RawMetafile::new(Path::new(ROOT).join(working_dir));
    for (path, entry) in manifest.iter() {
        let mut output = RawOutput::with_inputs(
            entry.bytes,
            entry.inputs.iter().map(|input| format!("{up}{input}")),
        );
        output.exports = entry.exports.iter().cloned().collect();
        output.entry_point = entry.entry_point.as_ref().map(|e| format!("{up}{e}"));
        raw.insert(format!("{ROOT}/{path}"), output);
    }
    raw
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn sanitizing_a_sanitized_manifest_is_a_no_op(manifest in manifest()) {
        let root = Path::new(ROOT);
        let once = sanitize(&to_raw(&manifest, root), root).unwrap();
        let twice = sanitize(&to_raw(&once, root), root).unwrap();
        prop_assert_eq!(&once, &manifest);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn working_directory_does_not_leak_into_the_manifest(
        manifest in manifest(),
        working_dir in prop::sample::select(vec!["", "packages/app", "packages/deep/nested/view"]),
    ) {
        let root = Path::new(ROOT);
        let sanitized = sanitize(&reported_from(&manifest, working_dir), root).unwrap();
        prop_assert_eq!(sanitized, manifest);
    }

    #[test]
    fn relocation_is_injective_on_style_outputs(
        keys in prop::collection::btree_set(output_key(), 1..24),
    ) {
        let mut targets = BTreeSet::new();
        for key in &keys {
            match relocated_path(key) {
                Some(moved) => {
                    prop_assert!(is_style_output(key));
                    prop_assert!(!moved.contains("/static/css/"));
                    prop_assert_eq!(Path::new(&moved).file_name(), Path::new(key).file_name());
                    prop_assert!(targets.insert(moved));
                }
                None => prop_assert!(!key.contains("/static/css/") || !is_style_output(key)),
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn relocation_moves_every_style_file_exactly_once(
        names in prop::collection::btree_set(file_name(), 1..8),
        concurrency in 1usize..4,
    ) {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        let mut manifest_entries = Vec::new();
        for name in &names {
            for (sub, ext) in [("css", ".css"), ("js", ".js")] {
                let key = format!("dist/app/static/{sub}/{name}{ext}");
                let path = root.join(&key);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(&path, name).unwrap();
                manifest_entries.push((key, ManifestEntry {
                    bytes: name.len() as u64,
                    inputs: Vec::new(),
                    exports: BTreeSet::new(),
                    entry_point: None,
                    css_bundle: None,
                    is_entry_point: false,
                }));
            }
        }
        let manifest: BuildManifest = manifest_entries.into_iter().collect();

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let relocated = runtime
            .block_on(relocate_styles(manifest.clone(), root, concurrency))
            .unwrap();

        prop_assert_eq!(relocated.len(), manifest.len());
        for name in &names {
            let moved = format!("dist/app/static/js/{name}.css");
            prop_assert!(relocated.get(&moved).is_some());
            prop_assert!(root.join(&moved).is_file());
            prop_assert_eq!(std::fs::read_to_string(root.join(&moved)).unwrap(), name.clone());
            let original = root.join(format!("dist/app/static/css/{name}.css"));
            prop_assert!(!original.exists());
        }
    }
}
