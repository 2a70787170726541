//! Cache command - inspect or clear a project's build/deploy cache

use crate::cache::{Cache, ProfileCache};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::error::{SkiffError, SkiffResult};
use crate::ui::{self, UiContext};
use console::style;
use std::path::Path;

/// Execute the cache command
pub async fn execute(args: CacheArgs, root: &Path) -> SkiffResult<()> {
    let ctx = UiContext::detect();
    match args.action {
        CacheAction::Show { profile, format } => show(&ctx, root, profile.as_deref(), format).await,
        CacheAction::Clear { profile } => clear(&ctx, root, profile.as_deref()).await,
    }
}

async fn show(
    ctx: &UiContext,
    root: &Path,
    profile: Option<&str>,
    format: OutputFormat,
) -> SkiffResult<()> {
    let cache = Cache::load(root).await?;
    let profiles: Vec<(&String, &ProfileCache)> = cache
        .profiles
        .iter()
        .filter(|(name, _)| profile.map_or(true, |p| p == name.as_str()))
        .collect();

    if format == OutputFormat::Json {
        let selected: std::collections::BTreeMap<&String, &ProfileCache> =
            profiles.into_iter().collect();
        println!("{}", serde_json::to_string_pretty(&selected)?);
        return Ok(());
    }

    if profiles.is_empty() {
        println!("No cache entries for {}.", root.display());
        return Ok(());
    }

    for (name, entries) in profiles {
        ui::section(ctx, &format!("Profile {}", name));

        if !entries.images.is_empty() {
            println!(
                "  {:<20} {:<50} {:<20}",
                "IMAGE", "REFERENCE", "BUILT"
            );
            for (image, entry) in &entries.images {
                let reference = if entry.content_hash.is_some() {
                    entry.reference()
                } else {
                    format!("{} {}", entry.reference(), style("(unhashed)").yellow())
                };
                println!(
                    "  {:<20} {:<50} {:<20}",
                    image,
                    reference,
                    entry.built_at.format("%Y-%m-%d %H:%M")
                );
            }
        }

        if !entries.deployments.is_empty() {
            println!("  {:<20} {:<40} {:<20}", "DEPLOYMENT", "TARGET", "DEPLOYED");
            for (deployment, entry) in &entries.deployments {
                println!(
                    "  {:<20} {:<40} {:<20}",
                    deployment,
                    entry.target.to_string(),
                    entry.deployed_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }
    Ok(())
}

async fn clear(ctx: &UiContext, root: &Path, profile: Option<&str>) -> SkiffResult<()> {
    let Some(profile) = profile else {
        if Cache::remove(root).await? {
            ui::step_ok(ctx, &format!("Cleared cache of {}", root.display()));
        } else {
            ui::step_info(ctx, "No cache to clear");
        }
        return Ok(());
    };

    let mut cache = Cache::load(root).await?;
    if !cache.remove_profile(profile) {
        return Err(SkiffError::User(format!(
            "No cache entries for profile '{}'",
            profile
        )));
    }
    if cache.is_empty() {
        Cache::remove(root).await?;
    } else {
        cache.save(root).await?;
    }
    ui::step_ok(ctx, &format!("Cleared cache of profile {}", profile));
    Ok(())
}
