//! Per-project deploy decisions and execution

use super::images::ImageSubstitutions;
use super::values::{helm_values, manifest_files, manifest_text};
use super::{ChartSource, DeployRequest, Deployer, DeploymentStatus, Rendered};
use crate::cache::{DeploymentCacheEntry, KubeTarget, ProjectCache};
use crate::config::{DeploymentConfig, DeploymentKind};
use crate::dependency::DependencyNode;
use crate::error::{SkiffError, SkiffResult};
use crate::event::{Event, Observer};
use crate::hash;
use crate::process::failure_reason;
use chrono::Utc;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Knobs for one node's deployments
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Redeploy even when nothing changed
    pub force: bool,
    /// Cluster to deploy into
    pub target: KubeTarget,
}

/// Outcome of deploying one node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub deployed: Vec<String>,
    pub skipped: Vec<String>,
}

/// The three fingerprints that decide a redeploy; `chart` is `None` when it
/// could not be computed
#[derive(Debug, Clone, PartialEq, Eq)]
struct DeployHashes {
    chart: Option<String>,
    values: String,
    config: String,
}

impl DeployHashes {
    fn matches(&self, entry: &DeploymentCacheEntry) -> bool {
        self.chart.as_deref() == Some(entry.chart_hash.as_str())
            && self.values == entry.values_hash
            && self.config == entry.config_hash
    }
}

/// Decides and runs the deployments of one project
pub struct DeployOrchestrator<'a> {
    deployer: &'a dyn Deployer,
    cancel: CancellationToken,
    observer: Option<Observer<'a>>,
}

impl<'a> DeployOrchestrator<'a> {
    pub fn new(deployer: &'a dyn Deployer, cancel: CancellationToken) -> Self {
        Self {
            deployer,
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

    /// Deploy whatever changed in `node`, in declaration order.
    ///
    /// Stops at the first failure. Each deployment that went through is
    /// recorded together with the cluster target it went to.
    pub async fn deploy_node(
        &self,
        node: &DependencyNode,
        cache: &ProjectCache,
        images: &ImageSubstitutions,
        options: &DeployOptions,
    ) -> SkiffResult<DeployReport> {
        let mut report = DeployReport::default();

        for deployment in &node.config.deployments {
            if deployment.disabled {
                report.skipped.push(deployment.name.clone());
                continue;
            }
            if self.cancel.is_cancelled() {
                return Err(SkiffError::Cancelled);
            }

            let (request, hashes) = prepare(node, deployment, images, &options.target)?;

            if let Some(reason) = self
                .deploy_reason(&request, &hashes, cache, options.force)
                .await
            {
                debug!("Deploying {} of {}: {}", deployment.name, node.name, reason);
                self.emit(Event::DeploymentStarted {
                    project: node.name.clone(),
                    deployment: deployment.name.clone(),
                });

                self.deployer.deploy(&request).await.map_err(|e| match e {
                    e @ (SkiffError::Deploy { .. } | SkiffError::Cancelled) => e,
                    other => request.error(failure_reason(&other)),
                })?;

                match hashes.chart {
                    Some(chart_hash) => {
                        let entry = DeploymentCacheEntry {
                            chart_hash,
                            values_hash: hashes.values,
                            config_hash: hashes.config,
                            target: options.target.clone(),
                            deployed_at: Utc::now(),
                        };
                        cache.record_deployment(&deployment.name, entry).await?;
                    }
                    None => warn!(
                        "Not caching {} of {}: its chart could not be fingerprinted",
                        deployment.name, node.name
                    ),
                }

                self.emit(Event::Deployed {
                    project: node.name.clone(),
                    deployment: deployment.name.clone(),
                });
                report.deployed.push(deployment.name.clone());
            } else {
                debug!("Deployment {} of {} is up to date", deployment.name, node.name);
                self.emit(Event::DeploymentSkipped {
                    project: node.name.clone(),
                    deployment: deployment.name.clone(),
                });
                report.skipped.push(deployment.name.clone());
            }
        }

        Ok(report)
    }

    /// Why the deployment must run, or `None` to skip it
    async fn deploy_reason(
        &self,
        request: &DeployRequest,
        hashes: &DeployHashes,
        cache: &ProjectCache,
        force: bool,
    ) -> Option<String> {
        if force {
            return Some("forced".to_string());
        }
        let Some(entry) = cache.deployment(request.name()).await else {
            return Some("never deployed".to_string());
        };
        if hashes.chart.is_none() {
            return Some("chart fingerprint unknown".to_string());
        }
        if !hashes.matches(&entry) {
            return Some("inputs changed".to_string());
        }
        if entry.target != request.target {
            info!(
                "Cluster target of {} changed from {} to {}, redeploying",
                request.name(),
                entry.target,
                request.target
            );
            return Some("cluster target changed".to_string());
        }

        match self.deployer.status(request).await {
            Ok(DeploymentStatus::Deployed) => None,
            Ok(DeploymentStatus::NotDeployed) => Some("missing from the cluster".to_string()),
            Ok(DeploymentStatus::Error(reason)) => Some(format!("unhealthy: {}", reason)),
            Err(e) => {
                warn!("Cannot query status of {}: {}", request.name(), e);
                Some("status unknown".to_string())
            }
        }
    }
}

/// Render one deployment and compute its fingerprints
fn prepare(
    node: &DependencyNode,
    deployment: &DeploymentConfig,
    images: &ImageSubstitutions,
    target: &KubeTarget,
) -> SkiffResult<(DeployRequest, DeployHashes)> {
    let root = &node.root;
    let fail = |e: SkiffError| SkiffError::Deploy {
        project: node.name.clone(),
        deployment: deployment.name.clone(),
        reason: e.to_string(),
    };
    let kind = deployment.kind().map_err(|reason| SkiffError::Deploy {
        project: node.name.clone(),
        deployment: deployment.name.clone(),
        reason,
    })?;

    let (rendered, chart_hash, values_hash) = match kind {
        DeploymentKind::Helm(helm) => {
            let mut values = helm_values(root, helm).map_err(fail)?;
            if helm.replace_image_tags {
                images.apply_value(&mut values);
            }
            let values_hash = hash::hash_string(&serde_json::to_string(&values)?);

            let chart = chart_source(
                root,
                &helm.chart,
                helm.repo.as_deref(),
                helm.version.as_deref(),
            );
            let chart_hash = match chart {
                ChartSource::Local(ref path) => match hash::hash_directory(path) {
                    Ok(digest) => Some(digest),
                    Err(e) => {
                        warn!("Cannot fingerprint chart {}: {}", path.display(), e);
                        None
                    }
                },
                ChartSource::Remote {
                    ref name,
                    ref repo,
                    ref version,
                } => Some(hash::hash_string(&format!(
                    "{}|{}|{}",
                    repo.as_deref().unwrap_or(""),
                    name,
                    version.as_deref().unwrap_or("")
                ))),
            };
            (Rendered::Helm { chart, values }, chart_hash, values_hash)
        }
        DeploymentKind::Kubectl(kubectl) => {
            let mut manifests = manifest_text(root, &kubectl.manifests).map_err(fail)?;
            if kubectl.replace_image_tags {
                manifests = images.apply_manifest(&manifests);
            }
            let values_hash = hash::hash_string(&manifests);
            let chart_hash = manifests_hash(root, &kubectl.manifests);
            (Rendered::Kubectl { manifests }, chart_hash, values_hash)
        }
    };

    let hashes = DeployHashes {
        chart: chart_hash,
        values: values_hash,
        config: hash::hash_string(&serde_json::to_string(deployment)?),
    };
    let request = DeployRequest {
        project: node.name.clone(),
        project_root: root.clone(),
        config: deployment.clone(),
        namespace: deployment
            .namespace
            .clone()
            .or_else(|| target.namespace.clone()),
        target: target.clone(),
        rendered,
        images: images.clone(),
    };
    Ok((request, hashes))
}

/// A chart that exists as a directory under the project root is local
fn chart_source(
    root: &Path,
    chart: &str,
    repo: Option<&str>,
    version: Option<&str>,
) -> ChartSource {
    let local = root.join(chart);
    if repo.is_none() && local.is_dir() {
        ChartSource::Local(local)
    } else {
        ChartSource::Remote {
            name: chart.to_string(),
            repo: repo.map(str::to_string),
            version: version.map(str::to_string),
        }
    }
}

fn manifests_hash(root: &Path, manifests: &[std::path::PathBuf]) -> Option<String> {
    let files = manifest_files(root, manifests).ok()?;
    let mut parts = Vec::with_capacity(files.len());
    for file in files {
        let rel = file.strip_prefix(root).unwrap_or(&file).display().to_string();
        parts.push(format!("{}={}", rel, hash::hash_file(&file).ok()?));
    }
    Some(hash::hash_string(&parts.join("\n")))
}
