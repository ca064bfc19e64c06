//! `modular build <target>`.

use std::time::Instant;

use modular_bundler::{
    BuildOptions, BuildResult, BuildTarget, RegistryTemplate, RolldownBundler, build,
};
use modular_config::{ClientEnvironment, Paths, resolve_target};
use tracing::debug;

use crate::cli::BuildArgs;
use crate::commands::Context;
use crate::error::{CliError, Result};
use crate::ui;

/// Execute the build command.
///
/// The target is looked up by package name or directory, built into
/// `dist/<dirname>` under the modular root, and summarized on stdout.
pub async fn execute(args: BuildArgs, ctx: &Context) -> Result<()> {
    let start = Instant::now();
    let settings = &ctx.settings;

    let workspace = resolve_target(&ctx.modular_root, &args.target)?;
    let kind = workspace.target_type().ok_or_else(|| {
        CliError::InvalidArgument(format!("{} is not an app or a view", workspace.name))
    })?;

    let paths = Paths::new(
        &ctx.modular_root,
        &workspace.path,
        settings.public_url.as_deref(),
    )?;
    let options = BuildOptions {
        target: settings.target,
        registry: RegistryTemplate::new(&settings.dependency_registry)?,
        relocation_concurrency: settings.relocation_concurrency,
        env: Some(ClientEnvironment::from_process_env(paths.public_url())),
    };
    debug!(
        "Building {} ({kind}) for {} into {}",
        workspace.name,
        options.target.as_str(),
        paths.app_build().display()
    );

    ui::info(&format!("Building {}...", workspace.name));
    let target = BuildTarget::new(
        workspace.name.clone(),
        kind,
        paths,
        workspace.manifest.dependencies.clone(),
    );
    let bundler = RolldownBundler::new().with_minify(!args.no_minify);
    let result = build(&bundler, &target, &options).await?;

    print_summary(&target, &result);
    ui::success(&format!(
        "Built {} in {:.2}s",
        target.name,
        start.elapsed().as_secs_f64()
    ));
    Ok(())
}

fn print_summary(target: &BuildTarget, result: &BuildResult) {
    let rows: Vec<(String, u64)> = result
        .manifest
        .iter()
        .map(|(path, entry)| (path.to_string(), entry.bytes))
        .collect();
    println!("{}", ui::format_table(&rows));

    if let Some(trampoline) = &result.trampoline {
        let shown = trampoline
            .path
            .strip_prefix(target.paths.modular_root())
            .unwrap_or(&trampoline.path);
        println!("Trampoline: {}", shown.display());
    }
    if !result.externalized.is_empty() {
        let names: Vec<&str> = result.externalized.names().collect();
        println!("Shared dependencies: {}", names.join(", "));
    }
}
