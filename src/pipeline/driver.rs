//! Runs a project graph: dependencies first, the root project last

use crate::build::{BuildOptions, BuildOrchestrator, BuildReport, Builder};
use crate::cache::ProjectCache;
use crate::config::{ConfigLoader, ProjectConfig};
use crate::dependency::{
    DependencyResolver, NodeId, ResolveOptions, ResolvedGraph, SourceFetcher,
};
use crate::deploy::{
    DeployOptions, DeployOrchestrator, DeployReport, Deployer, ImageSubstitutions,
};
use crate::error::{SkiffError, SkiffResult};
use crate::event::{Event, Observer};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Everything that shapes one run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Profile of the root project
    pub profile: Option<String>,
    pub allow_cyclic: bool,
    /// Reuse cached tags instead of building
    pub skip_build: bool,
    pub skip_deploy: bool,
    /// Apply the force flags to dependencies too, not just the root
    pub force_dependencies: bool,
    /// Process the root project only
    pub skip_dependencies: bool,
    pub build: BuildOptions,
    pub deploy: DeployOptions,
}

/// How a node's processing ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    Succeeded,
    Failed(String),
    /// Not processed because a dependency failed
    Blocked { by: String },
}

/// What happened to one project
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub name: String,
    pub root: PathBuf,
    pub outcome: NodeOutcome,
    pub build: BuildReport,
    pub deploy: DeployReport,
}

/// Per-project results of a run
#[derive(Debug, Default)]
pub struct RunReport {
    /// Processed projects in execution order
    pub nodes: Vec<NodeReport>,
    failures: Vec<SkiffError>,
}

impl RunReport {
    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// `project/image` for every image built this run
    pub fn built(&self) -> Vec<String> {
        self.nodes
            .iter()
            .flat_map(|n| n.build.built.iter().map(move |i| format!("{}/{}", n.name, i)))
            .collect()
    }

    /// `project/deployment` for every deployment rolled out this run
    pub fn deployed(&self) -> Vec<String> {
        self.nodes
            .iter()
            .flat_map(|n| n.deploy.deployed.iter().map(move |d| format!("{}/{}", n.name, d)))
            .collect()
    }

    pub fn blocked(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.outcome, NodeOutcome::Blocked { .. }))
            .map(|n| n.name.as_str())
            .collect()
    }

    /// Node failures, each wrapped with its root-to-project chain
    pub fn failures(&self) -> &[SkiffError] {
        &self.failures
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The report, or the first node failure when there was one
    pub fn into_result(mut self) -> SkiffResult<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(self.failures.remove(0))
        }
    }
}

/// Drives resolution, builds and deployments across a project graph
pub struct Driver<'a> {
    fetcher: &'a dyn SourceFetcher,
    loader: &'a dyn ConfigLoader,
    builder: &'a dyn Builder,
    deployer: &'a dyn Deployer,
    cancel: CancellationToken,
    observer: Option<Observer<'a>>,
}

impl<'a> Driver<'a> {
    pub fn new(
        fetcher: &'a dyn SourceFetcher,
        loader: &'a dyn ConfigLoader,
        builder: &'a dyn Builder,
        deployer: &'a dyn Deployer,
    ) -> Self {
        Self {
            fetcher,
            loader,
            builder,
            deployer,
            cancel: CancellationToken::new(),
            observer: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
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

    /// Run the graph rooted at `root_dir`, failing on the first node failure
    pub async fn run(&self, root_dir: &Path, options: &RunOptions) -> SkiffResult<RunReport> {
        self.execute(root_dir, options).await?.into_result()
    }

    /// Resolve and order the graph rooted at `root_dir`
    pub async fn resolve(
        &self,
        root_dir: &Path,
        options: &RunOptions,
    ) -> SkiffResult<ResolvedGraph> {
        DependencyResolver::new(self.fetcher, self.loader)
            .resolve(root_dir, &resolve_options(options))
            .await
    }

    /// Resolve the graph rooted at `root_dir` whose configuration the caller
    /// already loaded
    pub async fn resolve_loaded(
        &self,
        root_dir: &Path,
        config: ProjectConfig,
        options: &RunOptions,
    ) -> SkiffResult<ResolvedGraph> {
        DependencyResolver::new(self.fetcher, self.loader)
            .resolve_loaded(root_dir, config, &resolve_options(options))
            .await
    }

    /// Resolve, then run the graph rooted at `root_dir`
    pub async fn execute(&self, root_dir: &Path, options: &RunOptions) -> SkiffResult<RunReport> {
        let resolved = self.resolve(root_dir, options).await?;
        self.execute_graph(&resolved, options).await
    }

    /// Run an already resolved graph.
    ///
    /// Only cancellation aborts the run; node failures are collected in the
    /// report while independent projects keep going.
    pub async fn execute_graph(
        &self,
        resolved: &ResolvedGraph,
        options: &RunOptions,
    ) -> SkiffResult<RunReport> {
        let graph = resolved.graph();
        info!(
            "Running {} project(s) for {}",
            resolved.order().len(),
            resolved.root().name
        );

        let mut report = RunReport::default();
        let mut blocked: HashMap<NodeId, String> = HashMap::new();
        let mut effective: HashMap<NodeId, ImageSubstitutions> = HashMap::new();

        for &id in resolved.order() {
            if self.cancel.is_cancelled() {
                return Err(SkiffError::Cancelled);
            }
            let node = graph.node(id);

            if let Some(failed) = blocked.get(&id) {
                info!("Skipping {}: dependency {} failed", node.name, failed);
                self.emit(Event::ProjectBlocked {
                    project: node.name.clone(),
                    failed: failed.clone(),
                });
                report.nodes.push(NodeReport {
                    name: node.name.clone(),
                    root: node.root.clone(),
                    outcome: NodeOutcome::Blocked { by: failed.clone() },
                    build: BuildReport::default(),
                    deploy: DeployReport::default(),
                });
                continue;
            }

            self.emit(Event::ProjectStarted {
                project: node.name.clone(),
            });
            match self.run_node(resolved, id, &effective, options).await {
                Ok((build, deploy, images)) => {
                    effective.insert(id, images);
                    report.nodes.push(NodeReport {
                        name: node.name.clone(),
                        root: node.root.clone(),
                        outcome: NodeOutcome::Succeeded,
                        build,
                        deploy,
                    });
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!("{}", e);
                    for dependent in graph.dependents_of(id) {
                        blocked.entry(dependent).or_insert_with(|| node.name.clone());
                    }
                    report.nodes.push(NodeReport {
                        name: node.name.clone(),
                        root: node.root.clone(),
                        outcome: NodeOutcome::Failed(e.to_string()),
                        build: BuildReport::default(),
                        deploy: DeployReport::default(),
                    });
                    report.failures.push(e.in_chain(graph.chain_to(id)));
                }
            }
        }

        Ok(report)
    }

    async fn run_node(
        &self,
        resolved: &ResolvedGraph,
        id: NodeId,
        effective: &HashMap<NodeId, ImageSubstitutions>,
        options: &RunOptions,
    ) -> SkiffResult<(BuildReport, DeployReport, ImageSubstitutions)> {
        let graph = resolved.graph();
        let node = graph.node(id);
        let forced = id == graph.root() || options.force_dependencies;
        let cache = ProjectCache::open(&node.root, node.cache_profile()).await?;

        let build_options = BuildOptions {
            force: options.build.force && forced,
            reuse_only: options.build.reuse_only || options.skip_build,
            ..options.build.clone()
        };
        let mut builds = BuildOrchestrator::new(self.builder, self.cancel.clone());
        if let Some(observer) = self.observer {
            builds = builds.with_observer(observer);
        }
        let build = builds.build_node(node, &cache, &build_options).await?;

        // Dependency tags first so the node's own images win on a clash
        let mut images = ImageSubstitutions::new();
        let mut seen = HashSet::new();
        for child in &node.children {
            if !seen.insert(*child) {
                continue;
            }
            if let Some(inherited) = effective.get(child) {
                for (image, tag) in inherited.iter() {
                    images.insert(image, tag);
                }
            }
        }
        images.extend(build.images.values());

        if options.skip_deploy {
            debug!("Not deploying {}", node.name);
            return Ok((build, DeployReport::default(), images));
        }

        let deploy_options = DeployOptions {
            force: options.deploy.force && forced,
            target: options.deploy.target.clone(),
        };
        let mut deploys = DeployOrchestrator::new(self.deployer, self.cancel.clone());
        if let Some(observer) = self.observer {
            deploys = deploys.with_observer(observer);
        }
        let deploy = deploys
            .deploy_node(node, &cache, &images, &deploy_options)
            .await?;

        Ok((build, deploy, images))
    }
}

fn resolve_options(options: &RunOptions) -> ResolveOptions {
    ResolveOptions {
        profile: options.profile.clone(),
        allow_cyclic: options.allow_cyclic,
        skip_dependencies: options.skip_dependencies,
    }
}
