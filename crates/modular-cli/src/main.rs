//! Entry point of the `modular` binary: parses arguments, finds the modular
//! root, loads settings, sets up logging and dispatches the command.

use clap::Parser;
use modular_cli::commands::{self, Context};
use modular_cli::{cli, error, logger};
use modular_config::{ModularSettings, SettingsOverrides, find_modular_root};
use tracing::warn;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = cli::Cli::parse();
    run(args).await.map_err(error::cli_error_to_miette)
}

async fn run(args: cli::Cli) -> error::Result<()> {
    let start = match &args.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let modular_root = find_modular_root(&start)?;

    let overrides = match &args.command {
        cli::Command::Build(build) => SettingsOverrides {
            target: build.es_target,
            dependency_registry: build.registry.clone(),
            public_url: build.public_url.clone(),
        },
        cli::Command::Test(_) => SettingsOverrides::default(),
    };
    let settings = ModularSettings::load(&modular_root, &overrides)?;

    // Settings come first so their log_level applies
    let (level, invalid) = logger::resolve_level(
        args.verbose,
        args.quiet,
        settings.log_level.as_deref(),
    );
    logger::init_logger(level, args.verbose || args.quiet, args.no_color);
    if let Some(message) = invalid {
        warn!("{message}; using {level}");
    }

    let ctx = Context {
        modular_root,
        settings,
    };
    match args.command {
        cli::Command::Build(build) => commands::build_execute(build, &ctx).await,
        cli::Command::Test(test) => commands::test_execute(test, &ctx).await,
    }
}
