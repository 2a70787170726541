//! Run command - build and deploy the project graph for one pipeline

use crate::build::BackendBuilder;
use crate::cache::KubeTarget;
use crate::cli::args::RunArgs;
use crate::config::{ConfigLoader, ConfigManager, FileConfigLoader, LoadOptions, Settings};
use crate::deploy::BackendDeployer;
use crate::dependency::SourceCheckout;
use crate::error::SkiffResult;
use crate::event::Event;
use crate::pipeline::{pipeline_for, Driver, NodeOutcome, RunOptions, RunReport};
use crate::ui::{self, TaskSpinner, UiContext};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Execute the pipeline `pipeline` for the project at `root`
pub async fn execute(
    pipeline: &str,
    args: RunArgs,
    root: &Path,
    settings: &Settings,
    cancel: CancellationToken,
) -> SkiffResult<()> {
    let ctx = UiContext::detect();

    let loader = FileConfigLoader;
    let root_config = loader
        .load(
            root,
            &LoadOptions {
                profile: args.profile.clone(),
                ..Default::default()
            },
        )
        .await?;
    let preset = pipeline_for(&root_config, pipeline)?;

    let mut options = run_options(&args, settings);
    options.apply_pipeline(&preset);
    debug!("Pipeline {} options: {:?}", pipeline, options);

    ui::intro(&ctx, &format!("skiff {}", pipeline));
    ui::key_value(&ctx, "project", &root.display().to_string());
    ui::key_value(
        &ctx,
        "profile",
        options.profile.as_deref().unwrap_or("default"),
    );
    if !options.skip_deploy {
        ui::key_value(&ctx, "target", &options.deploy.target.to_string());
    }

    let fetcher = SourceCheckout::new(ConfigManager::checkout_dir(settings), &settings.tools.git);
    let builder = BackendBuilder::new(&settings.tools);
    let deployer = BackendDeployer::new(&settings.tools);
    let observer = |event: &Event| render_event(&ctx, event);
    let driver = Driver::new(&fetcher, &loader, &builder, &deployer)
        .with_cancellation(cancel)
        .with_observer(&observer);

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Resolving dependencies...");
    let resolved = match driver.resolve_loaded(root, root_config, &options).await {
        Ok(resolved) => {
            spinner.stop(&format!("Resolved {} project(s)", resolved.order().len()));
            resolved
        }
        Err(e) => {
            spinner.stop_error("Dependency resolution failed");
            return Err(e);
        }
    };

    let report = driver.execute_graph(&resolved, &options).await?;
    summarize(&ctx, &report);
    report.into_result().map(|_| ())
}

/// Command-line flags over settings defaults
fn run_options(args: &RunArgs, settings: &Settings) -> RunOptions {
    let mut options = RunOptions {
        profile: args.profile.clone(),
        allow_cyclic: args.allow_cyclic,
        skip_build: args.skip_build,
        skip_deploy: args.skip_deploy,
        force_dependencies: args.force_dependencies,
        skip_dependencies: args.skip_dependencies,
        ..Default::default()
    };

    options.build.force = args.force_build;
    options.build.sequential = args.build_sequential || settings.build.sequential;
    options.build.max_concurrent = args
        .max_concurrent_builds
        .unwrap_or(settings.build.max_concurrent_builds);

    options.deploy.force = args.force_deploy;
    options.deploy.target = KubeTarget {
        context: args
            .kube_context
            .clone()
            .or_else(|| settings.kubernetes.context.clone()),
        namespace: args
            .namespace
            .clone()
            .or_else(|| settings.kubernetes.namespace.clone()),
    };
    options
}

fn render_event(ctx: &UiContext, event: &Event) {
    match event {
        Event::ProjectStarted { project } => ui::section(ctx, &format!("[{}]", project)),
        Event::ProjectBlocked { project, failed } => ui::step_blocked(ctx, project, failed),
        Event::ImageBuilding { image, .. } => ui::remark(ctx, &format!("building image {}", image)),
        Event::ImageBuilt { image, tag, .. } => {
            ui::step_ok_detail(ctx, &format!("built image {}", image), tag)
        }
        Event::ImageSkipped { image, .. } => {
            ui::remark(ctx, &format!("image {} is up to date", image))
        }
        Event::DeploymentStarted { deployment, .. } => {
            ui::remark(ctx, &format!("deploying {}", deployment))
        }
        Event::Deployed { deployment, .. } => ui::step_ok(ctx, &format!("deployed {}", deployment)),
        Event::DeploymentSkipped { deployment, .. } => {
            ui::remark(ctx, &format!("deployment {} is up to date", deployment))
        }
    }
}

fn summarize(ctx: &UiContext, report: &RunReport) {
    let failed: Vec<&str> = report
        .nodes
        .iter()
        .filter(|n| matches!(n.outcome, NodeOutcome::Failed(_)))
        .map(|n| n.name.as_str())
        .collect();

    if failed.is_empty() {
        let built = report.built().len();
        let deployed = report.deployed().len();
        if built == 0 && deployed == 0 {
            ui::outro_success(ctx, "Everything is up to date");
        } else {
            ui::outro_success(
                ctx,
                &format!("{} image(s) built, {} deployment(s) rolled out", built, deployed),
            );
        }
        return;
    }

    for node in &report.nodes {
        if let NodeOutcome::Failed(ref reason) = node.outcome {
            ui::step_error_detail(ctx, &node.name, reason);
        }
    }
    let blocked = report.blocked();
    if !blocked.is_empty() {
        ui::step_warn(
            ctx,
            &format!("Not run because a dependency failed: {}", blocked.join(", ")),
        );
    }
    ui::outro_error(ctx, &format!("{} project(s) failed", failed.len()));
}
