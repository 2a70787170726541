//! Per-project build planning and execution

use super::fingerprint::{fingerprint, image_paths, ImageFingerprint};
use super::tag::{fallback_tag, resolve_tag};
use super::{BuildRequest, Builder};
use crate::cache::{ImageCacheEntry, ProjectCache};
use crate::config::{ImageConfig, RebuildStrategy};
use crate::dependency::DependencyNode;
use crate::error::{SkiffError, SkiffResult};
use crate::event::{Event, Observer};
use crate::hash;
use crate::process::failure_reason;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Knobs for one node's builds
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Rebuild even when nothing changed
    pub force: bool,
    /// Build one image at a time
    pub sequential: bool,
    /// Parallel build limit (0 = unbounded)
    pub max_concurrent: usize,
    /// Build nothing; only report the cached tags
    pub reuse_only: bool,
}

/// An image reference produced (or reused) by a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltImage {
    pub image: String,
    pub tag: String,
}

impl BuiltImage {
    pub fn reference(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

impl From<&ImageCacheEntry> for BuiltImage {
    fn from(entry: &ImageCacheEntry) -> Self {
        Self {
            image: entry.image.clone(),
            tag: entry.tag.clone(),
        }
    }
}

/// Outcome of building one node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    /// Image config name to the reference now current for it
    pub images: BTreeMap<String, BuiltImage>,
    /// Images built this run
    pub built: Vec<String>,
    /// Images left alone this run
    pub skipped: Vec<String>,
}

struct PlannedBuild {
    request: BuildRequest,
    fingerprint: Option<ImageFingerprint>,
    content_hash: Option<String>,
    previous_tag: Option<String>,
}

/// Decides and runs the image builds of one project
pub struct BuildOrchestrator<'a> {
    builder: &'a dyn Builder,
    cancel: CancellationToken,
    observer: Option<Observer<'a>>,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(builder: &'a dyn Builder, cancel: CancellationToken) -> Self {
        Self {
            builder,
            cancel,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Observer<'a>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn emit(&self, event: Event) {
        if let Some(observer) = self.observer {
            observer(&event);
        }
    }

    /// Build whatever changed in `node`, recording each success in `cache`
    pub async fn build_node(
        &self,
        node: &DependencyNode,
        cache: &ProjectCache,
        options: &BuildOptions,
    ) -> SkiffResult<BuildReport> {
        let mut report = BuildReport::default();
        let mut planned = Vec::new();

        for (name, config) in &node.config.images {
            let cached = cache.image(name).await;

            if config.disabled || node.skip_build || options.reuse_only {
                debug!("Not building image {} of {}", name, node.name);
                if let Some(ref entry) = cached {
                    report.images.insert(name.clone(), BuiltImage::from(entry));
                }
                report.skipped.push(name.clone());
                continue;
            }

            let plan = self.plan(node, name, config, cache.profile()).await;
            match cached {
                Some(entry)
                    if !options.force
                        && config.rebuild_strategy != RebuildStrategy::Always
                        && plan.content_hash.is_some()
                        && entry.content_hash == plan.content_hash =>
                {
                    debug!("Image {} of {} is up to date ({})", name, node.name, entry.tag);
                    self.emit(Event::ImageSkipped {
                        project: node.name.clone(),
                        image: name.clone(),
                    });
                    report.images.insert(name.clone(), BuiltImage::from(&entry));
                    report.skipped.push(name.clone());
                }
                cached => planned.push(PlannedBuild {
                    previous_tag: cached.map(|entry| entry.tag),
                    ..plan
                }),
            }
        }

        if planned.is_empty() {
            return Ok(report);
        }
        info!("Building {} image(s) of {}", planned.len(), node.name);

        let outcomes: Vec<SkiffResult<(String, BuiltImage)>> =
            if options.sequential || planned.len() == 1 {
                let mut outcomes = Vec::new();
                for build in planned {
                    let outcome = self.run_build(build, cache).await;
                    let failed = outcome.is_err();
                    outcomes.push(outcome);
                    if failed {
                        break;
                    }
                }
                outcomes
            } else {
                let limit = match options.max_concurrent {
                    0 => planned.len(),
                    n => n,
                };
                stream::iter(planned.into_iter().map(|build| self.run_build(build, cache)))
                    .buffer_unordered(limit)
                    .collect()
                    .await
            };

        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok((name, image)) => {
                    report.built.push(name.clone());
                    report.images.insert(name, image);
                }
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => warn!("{}", e),
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        report.built.sort();
        Ok(report)
    }

    async fn plan(
        &self,
        node: &DependencyNode,
        name: &str,
        config: &ImageConfig,
        profile: &str,
    ) -> PlannedBuild {
        let root = node.root.clone();
        let image_config = config.clone();
        let fingerprinted = tokio::task::spawn_blocking(move || fingerprint(&root, &image_config))
            .await
            .unwrap_or_else(|e| Err(SkiffError::Internal(format!("hashing task failed: {}", e))));

        let (tag, fingerprint) = match fingerprinted {
            Ok(fp) => {
                let inputs = fp.inputs_hash();
                (
                    resolve_tag(&config.tag, hash::short(&inputs), profile, name),
                    Some(fp),
                )
            }
            Err(e) => {
                warn!(
                    "Cannot fingerprint image {} of {}, it will be rebuilt: {}",
                    name, node.name, e
                );
                (fallback_tag(), None)
            }
        };

        let content_hash = fingerprint.as_ref().map(|fp| fp.content_hash(&tag));
        let (context, dockerfile) = image_paths(&node.root, config);

        PlannedBuild {
            request: BuildRequest {
                project: node.name.clone(),
                name: name.to_string(),
                image: config.image.clone(),
                tag,
                project_root: node.root.clone(),
                context,
                dockerfile,
                config: config.clone(),
            },
            fingerprint,
            content_hash,
            previous_tag: None,
        }
    }

    async fn run_build(
        &self,
        build: PlannedBuild,
        cache: &ProjectCache,
    ) -> SkiffResult<(String, BuiltImage)> {
        if self.cancel.is_cancelled() {
            return Err(SkiffError::Cancelled);
        }

        let request = &build.request;
        self.emit(Event::ImageBuilding {
            project: request.project.clone(),
            image: request.name.clone(),
        });

        self.builder.build(request).await.map_err(|e| match e {
            e @ (SkiffError::Build { .. } | SkiffError::Cancelled) => e,
            other => request.error(failure_reason(&other)),
        })?;

        if build.previous_tag.as_deref() == Some(request.tag.as_str()) {
            warn!(
                "Image {} was rebuilt with its previous tag {}; clusters that already pulled it may keep running the old image",
                request.image, request.tag
            );
        }

        let entry = ImageCacheEntry {
            content_hash: build.content_hash.clone(),
            dockerfile_hash: build.fingerprint.as_ref().map(|fp| fp.dockerfile_hash.clone()),
            context_hash: build.fingerprint.as_ref().map(|fp| fp.context_hash.clone()),
            image: request.image.clone(),
            tag: request.tag.clone(),
            built_at: Utc::now(),
        };
        cache.record_image(&request.name, entry).await?;

        self.emit(Event::ImageBuilt {
            project: request.project.clone(),
            image: request.name.clone(),
            tag: request.tag.clone(),
        });

        Ok((
            request.name.clone(),
            BuiltImage {
                image: request.image.clone(),
                tag: request.tag.clone(),
            },
        ))
    }
}
