//! Dependency discovery and ordering
//!
//! Resolution runs in two phases. Discovery walks declarations from the root,
//! locating and loading every distinct project once. Ordering then runs a
//! three-colour DFS over the finished graph (see `DependencyGraph`).

use super::graph::{DependencyGraph, DependencyNode, NodeId};
use super::source::SourceFetcher;
use crate::config::{ConfigLoader, DependencyDeclaration, LoadOptions, ProjectConfig};
use crate::error::{SkiffError, SkiffResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options for one resolution
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Profile for the root project
    pub profile: Option<String>,
    /// Ignore cycles instead of failing
    pub allow_cyclic: bool,
    /// Only load the root project
    pub skip_dependencies: bool,
}

/// A fully discovered, ordered dependency graph
#[derive(Debug)]
pub struct ResolvedGraph {
    graph: DependencyGraph,
    order: Vec<NodeId>,
}

impl ResolvedGraph {
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Node ids in execution order (dependencies first, root last)
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes in execution order
    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> + '_ {
        self.order.iter().map(|&id| self.graph.node(id))
    }

    pub fn root(&self) -> &DependencyNode {
        self.graph.node(self.graph.root())
    }
}

/// Builds the dependency graph of a project
pub struct DependencyResolver<'a> {
    fetcher: &'a dyn SourceFetcher,
    loader: &'a dyn ConfigLoader,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(fetcher: &'a dyn SourceFetcher, loader: &'a dyn ConfigLoader) -> Self {
        Self { fetcher, loader }
    }

    /// Discover and order the graph rooted at `root_dir`
    pub async fn resolve(
        &self,
        root_dir: &Path,
        options: &ResolveOptions,
    ) -> SkiffResult<ResolvedGraph> {
        let root = canonical(root_dir).await?;
        let load = LoadOptions {
            profile: options.profile.clone(),
            ..Default::default()
        };
        let config = self.loader.load(&root, &load).await?;
        self.resolve_loaded(&root, config, options).await
    }

    /// Like `resolve`, reusing an already loaded root configuration
    pub async fn resolve_loaded(
        &self,
        root_dir: &Path,
        config: ProjectConfig,
        options: &ResolveOptions,
    ) -> SkiffResult<ResolvedGraph> {
        let root = canonical(root_dir).await?;
        let graph = self.discover(root, config, options).await?;
        let order = graph.execution_order(options.allow_cyclic)?;
        debug!("Resolved {} project(s)", order.len());
        Ok(ResolvedGraph { graph, order })
    }

    async fn discover(
        &self,
        root: PathBuf,
        config: ProjectConfig,
        options: &ResolveOptions,
    ) -> SkiffResult<DependencyGraph> {
        let mut graph = DependencyGraph::new();
        let root_id = graph.insert(DependencyNode {
            name: config.display_name(&root),
            root,
            profile: options.profile.clone(),
            config: Arc::new(config),
            children: Vec::new(),
            skip_build: false,
            follow_dependencies: !options.skip_dependencies,
        });

        let mut pending = vec![root_id];
        while let Some(parent) = pending.pop() {
            let node = graph.node(parent);
            if !node.follow_dependencies {
                continue;
            }
            let base = node.root.clone();
            let parent_name = node.name.clone();
            let config = Arc::clone(&node.config);

            for declaration in &config.dependencies {
                let wrap = |source: SkiffError| SkiffError::DependencyLoad {
                    name: declaration.name.clone(),
                    parent: parent_name.clone(),
                    source: Box::new(source),
                };

                let located = self
                    .fetcher
                    .locate(&base, declaration)
                    .await
                    .map_err(wrap)?;
                let dep_root = canonical(&located).await.map_err(wrap)?;

                if let Some(existing) = graph.find(&dep_root) {
                    warn_on_profile_conflict(graph.node(existing), declaration);
                    graph.add_edge(parent, existing);
                    continue;
                }

                let load = LoadOptions {
                    config_name: declaration.config_name.clone(),
                    profile: declaration.profile.clone(),
                    vars: declaration.vars.clone(),
                };
                let dep_config = self.loader.load(&dep_root, &load).await.map_err(wrap)?;
                info!("Loaded dependency '{}' from {}", declaration.name, dep_root.display());

                let child = graph.insert(DependencyNode {
                    root: dep_root,
                    name: declaration.name.clone(),
                    profile: declaration.profile.clone(),
                    config: Arc::new(dep_config),
                    children: Vec::new(),
                    skip_build: declaration.skip_build,
                    follow_dependencies: !declaration.ignore_dependencies,
                });
                graph.add_edge(parent, child);
                pending.push(child);
            }
        }

        Ok(graph)
    }
}

async fn canonical(path: &Path) -> SkiffResult<PathBuf> {
    tokio::fs::canonicalize(path)
        .await
        .map_err(|e| SkiffError::io(format!("resolving {}", path.display()), e))
}

fn warn_on_profile_conflict(existing: &DependencyNode, declaration: &DependencyDeclaration) {
    if existing.profile != declaration.profile {
        warn!(
            "Dependency '{}' at {} is declared with profile {:?} but was already loaded with {:?}; keeping the first",
            declaration.name,
            existing.root.display(),
            declaration.profile,
            existing.profile
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileConfigLoader, PROJECT_CONFIG_FILE};
    use crate::dependency::SourceCheckout;
    use tempfile::TempDir;

    fn project(dir: &Path, name: &str, content: &str) -> PathBuf {
        let root = dir.join(name);
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(PROJECT_CONFIG_FILE), content).unwrap();
        root
    }

    async fn resolve(root: &Path, options: ResolveOptions) -> SkiffResult<ResolvedGraph> {
        let fetcher = SourceCheckout::new(root.join(".checkouts"), "git");
        let loader = FileConfigLoader;
        DependencyResolver::new(&fetcher, &loader)
            .resolve(root, &options)
            .await
    }

    #[tokio::test]
    async fn resolves_local_chain_leaf_first() {
        let temp = TempDir::new().unwrap();
        project(temp.path(), "db", "");
        project(
            temp.path(),
            "api",
            "[[dependencies]]\nname = \"db\"\npath = \"../db\"\n",
        );
        let web = project(
            temp.path(),
            "web",
            "[[dependencies]]\nname = \"api\"\npath = \"../api\"\n",
        );

        let resolved = resolve(&web, ResolveOptions::default()).await.unwrap();
        let names: Vec<&str> = resolved.nodes().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["db", "api", "web"]);
    }

    #[tokio::test]
    async fn same_path_declared_twice_is_one_node() {
        let temp = TempDir::new().unwrap();
        project(temp.path(), "shared", "");
        project(
            temp.path(),
            "a",
            "[[dependencies]]\nname = \"shared\"\npath = \"../shared\"\n",
        );
        let root = project(
            temp.path(),
            "root",
            r#"
[[dependencies]]
name = "a"
path = "../a"

[[dependencies]]
name = "shared-again"
path = "../a/../shared"
"#,
        );

        let resolved = resolve(&root, ResolveOptions::default()).await.unwrap();
        assert_eq!(resolved.graph().len(), 3);
        assert_eq!(resolved.order().len(), 3);
    }

    #[tokio::test]
    async fn cycle_fails_resolution() {
        let temp = TempDir::new().unwrap();
        project(
            temp.path(),
            "b",
            "[[dependencies]]\nname = \"a\"\npath = \"../a\"\n",
        );
        let a = project(
            temp.path(),
            "a",
            "[[dependencies]]\nname = \"b\"\npath = \"../b\"\n",
        );

        let err = resolve(&a, ResolveOptions::default()).await.unwrap_err();
        assert!(matches!(err, SkiffError::CyclicDependency { ref cycle } if cycle.len() == 3));

        let allowed = resolve(
            &a,
            ResolveOptions {
                allow_cyclic: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(allowed.order().len(), 2);
    }

    #[tokio::test]
    async fn ignore_dependencies_stops_recursion() {
        let temp = TempDir::new().unwrap();
        project(
            temp.path(),
            "api",
            "[[dependencies]]\nname = \"missing\"\npath = \"../nowhere\"\n",
        );
        let web = project(
            temp.path(),
            "web",
            "[[dependencies]]\nname = \"api\"\npath = \"../api\"\nignore_dependencies = true\n",
        );

        let resolved = resolve(&web, ResolveOptions::default()).await.unwrap();
        assert_eq!(resolved.order().len(), 2);
    }

    #[tokio::test]
    async fn skip_dependencies_loads_root_only() {
        let temp = TempDir::new().unwrap();
        let web = project(
            temp.path(),
            "web",
            "[[dependencies]]\nname = \"api\"\npath = \"../nowhere\"\n",
        );

        let resolved = resolve(
            &web,
            ResolveOptions {
                skip_dependencies: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(resolved.root().name, "web");
        assert_eq!(resolved.order().len(), 1);
    }

    #[tokio::test]
    async fn load_failure_names_dependency_and_parent() {
        let temp = TempDir::new().unwrap();
        let web = project(
            temp.path(),
            "web",
            "[[dependencies]]\nname = \"api\"\npath = \"../api\"\n",
        );

        let err = resolve(&web, ResolveOptions::default()).await.unwrap_err();
        match err {
            SkiffError::DependencyLoad { name, parent, .. } => {
                assert_eq!(name, "api");
                assert_eq!(parent, "web");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn dependency_profile_and_vars_apply() {
        let temp = TempDir::new().unwrap();
        project(
            temp.path(),
            "api",
            r#"
[images.api]
image = "${REGISTRY}/api"

[profiles.dev.images.api]
image = "${REGISTRY}/api-dev"
"#,
        );
        let web = project(
            temp.path(),
            "web",
            r#"
[[dependencies]]
name = "api"
path = "../api"
profile = "dev"
skip_build = true
vars = { REGISTRY = "reg.local" }
"#,
        );

        let resolved = resolve(&web, ResolveOptions::default()).await.unwrap();
        let api = resolved.nodes().next().unwrap();
        assert_eq!(api.config.images["api"].image, "reg.local/api-dev");
        assert_eq!(api.cache_profile(), "dev");
        assert!(api.skip_build);
    }
}
