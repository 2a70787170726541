//! Skiff - incremental builds and deploys
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use skiff::cli::commands::{self, project_root};
use skiff::cli::{interrupt, Cli, Commands};
use skiff::config::{ConfigManager, Settings};
use skiff::error::SkiffResult;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> SkiffResult<()> {
    let cli = Cli::parse();

    // Completions need neither settings nor a project
    if let Commands::Completions(args) = cli.command {
        commands::completions(args);
        return Ok(());
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let settings = config_manager.load().await?;
    init_logging(cli.verbose, &settings);
    debug!("Settings loaded from {}", config_manager.path().display());

    let root = project_root(cli.project.as_deref())?;
    debug!("Project root: {}", root.display());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if interrupt::watch(tokio::signal::ctrl_c, on_interrupt).await {
            eprintln!("{}", style("Aborted").red().bold());
            std::process::exit(interrupt::ABORT_EXIT_CODE);
        }
    });

    match cli.command {
        Commands::Completions(_) => unreachable!("Completions handled above"),
        Commands::Build(args) => commands::run("build", args, &root, &settings, cancel).await,
        Commands::Deploy(args) => commands::run("deploy", args, &root, &settings, cancel).await,
        Commands::Dev(args) => commands::run("dev", args, &root, &settings, cancel).await,
        Commands::RunPipeline(args) => {
            commands::run(&args.name, args.run, &root, &settings, cancel).await
        }
        Commands::Cache(args) => commands::cache(args, &root).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; RUST_LOG wins when set
fn init_logging(verbose: u8, settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("skiff=warn"),
        1 => EnvFilter::new("skiff=info"),
        _ => EnvFilter::new("skiff=debug"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if settings.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
