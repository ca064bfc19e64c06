//! Command-line interface definition.
//!
//! - `modular build <target>` builds one app or view
//! - `modular test [patterns..]` runs the workspace test runner

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use modular_config::EsTarget;

#[derive(Parser, Debug)]
#[command(
    name = "modular",
    version,
    about = "Build and test the apps and views of a modular monorepo"
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Directory to start looking for the modular root from
    #[arg(long, global = true, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build an app or view into dist/<target>
    ///
    /// Views are built with their dependencies shared through the registry,
    /// and get a trampoline that loads them before the view itself.
    Build(BuildArgs),

    /// Run tests for the monorepo
    ///
    /// Arguments that look like `--option` are passed to the test runner;
    /// anything else is a test path pattern.
    Test(TestArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Package name or directory of the target
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// URL prefix the build is served from
    #[arg(long, value_name = "URL")]
    pub public_url: Option<String>,

    /// Registry URL template for shared dependencies, e.g.
    /// https://esm.sh/[name]@[version]
    #[arg(long, value_name = "TEMPLATE")]
    pub registry: Option<String>,

    /// Syntax level of the emitted JavaScript
    #[arg(long = "es-target", value_name = "LEVEL")]
    pub es_target: Option<EsTarget>,

    /// Keep the output readable
    #[arg(long)]
    pub no_minify: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TestArgs {
    /// Also test the workspaces that depend on changed ones (with --changed)
    #[arg(long)]
    pub ancestors: bool,

    /// Stop after the first failing test suite
    #[arg(long)]
    pub bail: bool,

    /// Start the runner under `node --inspect-brk`
    #[arg(long)]
    pub debug: bool,

    /// Only test workspaces changed relative to --compare-branch
    #[arg(long)]
    pub changed: bool,

    /// Delete the runner cache and exit
    #[arg(long)]
    pub clear_cache: bool,

    /// Branch or commit --changed compares against
    #[arg(long, value_name = "REF", default_value = "origin/main")]
    pub compare_branch: String,

    #[arg(long)]
    pub coverage: bool,

    #[arg(long)]
    pub force_exit: bool,

    /// Test environment
    #[arg(long, default_value = "jsdom")]
    pub env: String,

    #[arg(long)]
    pub json: bool,

    #[arg(long)]
    pub log_heap_usage: bool,

    #[arg(long, value_name = "N")]
    pub max_workers: Option<String>,

    #[arg(long)]
    pub no_cache: bool,

    #[arg(long, value_name = "REPORTER")]
    pub reporters: Vec<String>,

    #[arg(long, short = 'i')]
    pub run_in_band: bool,

    #[arg(long, short = 'o')]
    pub only_changed: bool,

    #[arg(long, value_name = "FILE")]
    pub output_file: Option<String>,

    #[arg(long)]
    pub silent: bool,

    #[arg(long, value_name = "MODULE")]
    pub test_results_processor: Option<String>,

    #[arg(long, short = 'u')]
    pub update_snapshot: bool,

    /// Runner verbosity; the global --verbose controls modular's own logs
    #[arg(long = "runner-verbose")]
    pub runner_verbose: bool,

    #[arg(long)]
    pub watch: bool,

    #[arg(long)]
    pub watch_all: bool,

    /// Test path patterns and `--option` pass-through arguments
    #[arg(value_name = "PATTERN", trailing_var_arg = true, allow_hyphen_values = true)]
    pub patterns: Vec<String>,
}
