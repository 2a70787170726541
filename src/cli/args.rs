//! CLI argument definitions using clap derive

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Skiff - incremental builds and deploys for multi-project workspaces
///
/// Resolves a project's dependency graph, rebuilds only the images whose
/// inputs changed and redeploys only what changed or went missing.
#[derive(Parser, Debug)]
#[command(name = "skiff")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SKIFF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Project directory (defaults to the nearest directory with skiff.toml)
    #[arg(long, global = true, env = "SKIFF_PROJECT")]
    pub project: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the images of the project and its dependencies
    Build(RunArgs),

    /// Build, then deploy the project and its dependencies
    Deploy(RunArgs),

    /// Build and deploy for a development loop
    Dev(RunArgs),

    /// Run a pipeline defined under [pipelines.<name>]
    RunPipeline(PipelineArgs),

    /// Inspect or clear the project cache
    Cache(CacheArgs),

    /// Print shell completions
    Completions(CompletionsArgs),
}

/// Flags shared by every command that runs the project graph
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Profile to load the root project with
    #[arg(long, env = "SKIFF_PROFILE")]
    pub profile: Option<String>,

    /// Rebuild images even if nothing changed
    #[arg(short = 'b', long)]
    pub force_build: bool,

    /// Redeploy even if nothing changed
    #[arg(short = 'd', long)]
    pub force_deploy: bool,

    /// Apply --force-build/--force-deploy to dependencies as well
    #[arg(long)]
    pub force_dependencies: bool,

    /// Ignore dependency cycles instead of failing
    #[arg(long)]
    pub allow_cyclic: bool,

    /// Never build; deploy the cached tags
    #[arg(long)]
    pub skip_build: bool,

    /// Build only
    #[arg(long)]
    pub skip_deploy: bool,

    /// Process the root project only
    #[arg(long)]
    pub skip_dependencies: bool,

    /// Build one image at a time
    #[arg(long)]
    pub build_sequential: bool,

    /// Maximum parallel image builds per project (0 = unbounded)
    #[arg(long)]
    pub max_concurrent_builds: Option<usize>,

    /// kube context to deploy into
    #[arg(long)]
    pub kube_context: Option<String>,

    /// Default namespace for deployments without one
    #[arg(short, long)]
    pub namespace: Option<String>,
}

/// Arguments for the run-pipeline command
#[derive(Args, Debug)]
pub struct PipelineArgs {
    /// Pipeline name
    pub name: String,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Arguments for the cache command
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Output format for cache show
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cached images and deployments
    Show {
        /// Only this profile
        #[arg(long)]
        profile: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Delete the cache so the next run rebuilds and redeploys
    Clear {
        /// Only this profile
        #[arg(long)]
        profile: Option<String>,
    },
}

/// Arguments for the completions command
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}
