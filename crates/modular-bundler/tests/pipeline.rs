//! End-to-end assembly of apps and views against a scripted bundler.

mod helpers;

use std::fs;

use helpers::{ENTRY_HASH, STYLE_HASH, ScriptedBundler, Workspace, deps};
use modular_bundler::{
    BuildOptions, BuildTarget, EntrySource, Error, ExtractedDiagnostic, RegistryTemplate, build,
    diagnostics::{DiagnosticKind, format_diagnostics},
};
use modular_config::{ClientEnvironment, PackageDependency, TargetType};

fn app_target(workspace: &Workspace, public_url: Option<&str>) -> BuildTarget {
    BuildTarget::new(
        workspace.name.clone(),
        TargetType::App,
        workspace.paths(public_url),
        PackageDependency::new(),
    )
}

fn view_target(workspace: &Workspace, dependencies: PackageDependency) -> BuildTarget {
    BuildTarget::new(
        workspace.name.clone(),
        TargetType::View,
        workspace.paths(None),
        dependencies,
    )
}

#[tokio::test]
async fn app_build_writes_relocated_outputs_and_document() {
    let workspace = Workspace::new("app-a", TargetType::App);
    workspace.write_public("favicon.ico", "icon");
    let bundler = ScriptedBundler::new().with_style();

    let result = build(
        &bundler,
        &app_target(&workspace, Some("/app-a")),
        &BuildOptions::default(),
    )
    .await
    .expect("app build");

    let script = format!("dist/app-a/static/js/index-{ENTRY_HASH}.js");
    let style = format!("dist/app-a/static/js/index-{STYLE_HASH}.css");
    let entry = result.manifest.get(&script).expect("script entry");
    assert!(entry.is_entry_point);
    assert_eq!(entry.css_bundle.as_deref(), Some(style.as_str()));
    assert_eq!(
        entry.entry_point.as_deref(),
        Some("packages/app-a/src/index.tsx")
    );
    assert!(result.manifest.get(&style).is_some());
    assert!(result.trampoline.is_none());
    assert!(result.externalized.is_empty());

    let build_dir = workspace.build_dir();
    assert!(build_dir.join(format!("static/js/index-{STYLE_HASH}.css")).is_file());
    assert!(!build_dir.join("static/css").join(format!("index-{STYLE_HASH}.css")).exists());
    assert!(build_dir.join("favicon.ico").is_file());

    let html = fs::read_to_string(build_dir.join("index.html")).unwrap();
    assert!(html.contains(&format!(
        r#"<script type="module" src="/app-a/static/js/index-{ENTRY_HASH}.js"></script>"#
    )));
    assert!(html.contains(&format!(
        r#"<link rel="stylesheet" href="/app-a/static/js/index-{STYLE_HASH}.css" />"#
    )));
    assert!(html.contains(r#""PUBLIC_URL":"/app-a""#));
}

#[tokio::test]
async fn app_build_bundles_every_dependency() {
    let workspace = Workspace::new("app-b", TargetType::App);
    let bundler = ScriptedBundler::new().importing(&["react"]);
    let mut target = app_target(&workspace, None);
    target.dependencies = deps(&[("react", "^18")]);

    let result = build(&bundler, &target, &BuildOptions::default())
        .await
        .expect("app build");

    assert!(result.externalized.is_empty());
    let calls = bundler.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].externalizer.is_none());
    assert!(matches!(calls[0].entry, EntrySource::File(_)));
}

#[tokio::test]
async fn custom_app_template_is_used() {
    let workspace = Workspace::new("app-c", TargetType::App);
    workspace.write_public(
        "index.html",
        "<html><head><title>%REACT_APP_TITLE%</title></head><body><main id=\"root\"></main></body></html>",
    );
    let bundler = ScriptedBundler::new();
    let options = BuildOptions {
        env: Some(ClientEnvironment::from_vars([("REACT_APP_TITLE", "Orders")], "")),
        ..BuildOptions::default()
    };

    build(&bundler, &app_target(&workspace, None), &options)
        .await
        .expect("app build");

    let html = fs::read_to_string(workspace.build_dir().join("index.html")).unwrap();
    assert!(html.contains("<title>Orders</title>"));
    assert!(html.contains(&format!(
        r#"<main id="root"></main><script type="module" src="/static/js/index-{ENTRY_HASH}.js"></script>"#
    )));
    assert!(html.contains(r#""PUBLIC_URL":"""#));
}

#[tokio::test]
async fn view_build_externalizes_shared_dependencies_and_writes_trampoline() {
    let workspace = Workspace::new("view-a", TargetType::View);
    let shared = deps(&[("react", "^18")]);
    let bundler = ScriptedBundler::new().importing(&["react", "lodash"]);

    let result = build(
        &bundler,
        &view_target(&workspace, shared.clone()),
        &BuildOptions::default(),
    )
    .await
    .expect("view build");

    assert_eq!(result.externalized.len(), 1);
    assert!(result.externalized.contains("react"));
    assert!(!result.externalized.contains("lodash"));

    let trampoline = result.trampoline.expect("trampoline");
    assert_eq!(
        trampoline.path,
        workspace.build_dir().join("static/js/_trampoline.js")
    );
    assert!(trampoline.path.is_file());
    assert_eq!(fs::read(&trampoline.path).unwrap(), trampoline.contents);
    assert_eq!(
        trampoline.dependencies.names().collect::<Vec<_>>(),
        shared.names().collect::<Vec<_>>()
    );

    let contents = String::from_utf8(trampoline.contents).unwrap();
    assert!(contents.contains(r#"import("https://esm.sh/react@%5E18")"#));
    assert!(contents.contains(&format!(r#"import("./index-{ENTRY_HASH}.js")"#)));

    let html = fs::read_to_string(workspace.build_dir().join("index.html")).unwrap();
    assert!(html.contains(r#"from "/static/js/_trampoline.js""#));

    let calls = bundler.calls();
    assert_eq!(calls.len(), 2);
    match &calls[1].entry {
        EntrySource::Virtual { resolve_dir, .. } => {
            assert_eq!(resolve_dir, &workspace.app_dir().join("src"));
        }
        other => panic!("trampoline should be a virtual entry, got {other:?}"),
    }
    assert!(!calls[1].write);
    assert_eq!(calls[1].externals, [format!("./index-{ENTRY_HASH}.js")]);
}

#[tokio::test]
async fn view_uses_the_configured_registry() {
    let workspace = Workspace::new("view-b", TargetType::View);
    let bundler = ScriptedBundler::new().importing(&["react"]);
    let options = BuildOptions {
        registry: RegistryTemplate::new("https://cdn.example.com/[name]/[version]").unwrap(),
        ..BuildOptions::default()
    };

    let result = build(
        &bundler,
        &view_target(&workspace, deps(&[("react", "18.2.0")])),
        &options,
    )
    .await
    .expect("view build");

    let contents = String::from_utf8(result.trampoline.unwrap().contents).unwrap();
    assert!(contents.contains(r#"import("https://cdn.example.com/react/18.2.0")"#));
}

#[tokio::test]
async fn view_without_trampoline_script_fails_after_the_document() {
    let workspace = Workspace::new("view-c", TargetType::View);
    let bundler = ScriptedBundler::new()
        .importing(&["react"])
        .trampoline_without_script();

    let err = build(
        &bundler,
        &view_target(&workspace, deps(&[("react", "^18")])),
        &BuildOptions::default(),
    )
    .await
    .unwrap_err();

    match &err {
        Error::Target { target, source } => {
            assert_eq!(target, "view-c");
            assert!(
                matches!(source.as_ref(), Error::AssemblyInvariant(reason) if reason.contains("produced no output")),
                "unexpected source: {source:?}"
            );
        }
        other => panic!("expected a target error, got {other:?}"),
    }
    assert!(workspace.build_dir().join("index.html").is_file());
    assert!(!workspace.build_dir().join("static/js/_trampoline.js").exists());
}

#[tokio::test]
async fn trampoline_compile_failure_is_an_assembly_error() {
    let workspace = Workspace::new("view-d", TargetType::View);
    let bundler = ScriptedBundler::new().trampoline_failing(vec![ExtractedDiagnostic::error(
        DiagnosticKind::UnresolvedImport,
        "Could not resolve 'react'",
    )]);

    let err = build(
        &bundler,
        &view_target(&workspace, deps(&[("react", "^18")])),
        &BuildOptions::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.target(), Some("view-d"));
    assert!(
        matches!(err.inner(), Error::AssemblyInvariant(reason)
            if reason.contains("trampoline failed to compile") && reason.contains("Could not resolve 'react'")),
        "unexpected error: {err:?}"
    );
    assert_eq!(bundler.calls().len(), 2);
    assert!(workspace.build_dir().join("index.html").is_file());
    assert!(!workspace.build_dir().join("static/js/_trampoline.js").exists());
}

#[tokio::test]
async fn compile_failures_report_every_diagnostic() {
    let workspace = Workspace::new("app-d", TargetType::App);
    let diagnostics = vec![
        ExtractedDiagnostic::error(DiagnosticKind::ParseError, "Unexpected token")
            .at("packages/app-d/src/index.tsx", 3, 7),
        ExtractedDiagnostic::error(DiagnosticKind::UnresolvedImport, "Could not resolve './missing'")
            .at("packages/app-d/src/index.tsx", 1, 1),
    ];
    let bundler = ScriptedBundler::new().failing(diagnostics);

    let err = build(&bundler, &app_target(&workspace, None), &BuildOptions::default())
        .await
        .unwrap_err();

    let (target, diagnostics) = match err {
        Error::Compile {
            target,
            diagnostics,
        } => (target, diagnostics),
        other => panic!("expected a compile error, got {other:?}"),
    };
    assert_eq!(target, "app-d");
    assert_eq!(diagnostics.len(), 2);

    let rendered = format_diagnostics(&diagnostics, workspace.root()).await;
    assert_eq!(rendered.len(), 2);
    assert!(rendered[0].contains("Unexpected token"));
    assert!(rendered[1].contains("Could not resolve './missing'"));

    assert!(!workspace.build_dir().join("index.html").exists());
}

#[tokio::test]
async fn missing_style_output_aborts_before_the_document() {
    let workspace = Workspace::new("app-e", TargetType::App);
    let bundler = ScriptedBundler::new().losing_style();

    let err = build(&bundler, &app_target(&workspace, None), &BuildOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.target(), Some("app-e"));
    assert!(
        matches!(err.inner(), Error::ManifestInconsistency { path } if path.ends_with(".css")),
        "unexpected error: {err:?}"
    );
    assert!(!workspace.build_dir().join("index.html").exists());
}

#[tokio::test]
async fn missing_entry_point_is_reported_for_the_target() {
    let workspace = Workspace::new("app-f", TargetType::App);
    fs::remove_file(workspace.app_dir().join("src/index.tsx")).unwrap();
    let bundler = ScriptedBundler::new();

    let err = build(&bundler, &app_target(&workspace, None), &BuildOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.target(), Some("app-f"));
    assert!(matches!(err.inner(), Error::Config(_)));
    assert!(bundler.calls().is_empty());
}

#[tokio::test]
async fn rebuilding_clears_stale_outputs() {
    let workspace = Workspace::new("app-g", TargetType::App);
    let stale = workspace.build_dir().join("static/js/index-00000000.js");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "stale").unwrap();

    build(
        &ScriptedBundler::new(),
        &app_target(&workspace, None),
        &BuildOptions::default(),
    )
    .await
    .expect("app build");

    assert!(!stale.exists());
    assert!(
        workspace
            .build_dir()
            .join(format!("static/js/index-{ENTRY_HASH}.js"))
            .is_file()
    );
}
