//! Project configuration schema (`skiff.toml`)
//!
//! A project declares the images it builds, the deployments it rolls out,
//! the other projects it depends on, and optional named profiles that
//! overlay any of these.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Profile name used when none is selected
pub const DEFAULT_PROFILE: &str = "default";

/// Parsed configuration of one project (root or dependency)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Display name (defaults to the project directory name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Images built by this project, keyed by image config name
    pub images: BTreeMap<String, ImageConfig>,

    /// Deployments, in declaration order
    pub deployments: Vec<DeploymentConfig>,

    /// Projects this project depends on, in declaration order
    pub dependencies: Vec<DependencyDeclaration>,

    /// Named overlays
    pub profiles: BTreeMap<String, ProfileOverlay>,

    /// Named flag presets for `skiff run-pipeline`
    pub pipelines: BTreeMap<String, PipelineConfig>,
}

impl ProjectConfig {
    /// Name shown in logs and error chains
    pub fn display_name(&self, root: &Path) -> String {
        self.name.clone().unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| root.display().to_string())
        })
    }

    /// Look up a deployment by name
    pub fn deployment(&self, name: &str) -> Option<&DeploymentConfig> {
        self.deployments.iter().find(|d| d.name == name)
    }
}

/// Image build configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Repository name, e.g. `registry.local/web`
    pub image: String,

    /// Build context, relative to the project root
    #[serde(default = "default_context")]
    pub context: PathBuf,

    /// Dockerfile, relative to the project root
    #[serde(default = "default_dockerfile")]
    pub dockerfile: PathBuf,

    /// Tag template: `{hash}`, `{profile}` and `{name}` are expanded
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Which builder backend builds this image
    #[serde(default)]
    pub backend: BuildBackend,

    /// Shell command for the custom backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// `--build-arg` values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub build_args: BTreeMap<String, String>,

    /// Context paths ignored for change detection, on top of `.dockerignore`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// When a build is due
    #[serde(default)]
    pub rebuild_strategy: RebuildStrategy,

    /// Never build this image
    #[serde(default)]
    pub disabled: bool,
}

fn default_context() -> PathBuf {
    PathBuf::from(".")
}

fn default_dockerfile() -> PathBuf {
    PathBuf::from("Dockerfile")
}

fn default_tag() -> String {
    "{hash}".to_string()
}

/// When an image counts as changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildStrategy {
    /// Dockerfile, context or image config changed
    #[default]
    Default,
    /// Every run
    Always,
    /// Dockerfile or image config changed; context edits are ignored
    IgnoreContextChanges,
}

/// Image builder backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildBackend {
    /// `docker build` (or a compatible CLI)
    #[default]
    Docker,
    /// Arbitrary shell command
    Custom,
}

/// One deployment: a Helm release or a set of raw manifests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default)]
    pub disabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm: Option<HelmConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubectl: Option<KubectlConfig>,
}

/// Borrowed view of a deployment's kind
#[derive(Debug, Clone, Copy)]
pub enum DeploymentKind<'a> {
    Helm(&'a HelmConfig),
    Kubectl(&'a KubectlConfig),
}

impl DeploymentConfig {
    /// The deployment kind, or a reason when it is not exactly one kind
    pub fn kind(&self) -> Result<DeploymentKind<'_>, String> {
        match (&self.helm, &self.kubectl) {
            (Some(helm), None) => Ok(DeploymentKind::Helm(helm)),
            (None, Some(kubectl)) => Ok(DeploymentKind::Kubectl(kubectl)),
            (Some(_), Some(_)) => Err("both [helm] and [kubectl] are set".to_string()),
            (None, None) => Err("one of [helm] or [kubectl] is required".to_string()),
        }
    }
}

/// Helm release configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelmConfig {
    /// Local chart directory (relative to the project root) or remote chart name
    pub chart: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    /// YAML values files, relative to the project root, merged in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_files: Vec<PathBuf>,

    /// Inline values, merged over the values files
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub values: serde_json::Map<String, serde_json::Value>,

    /// Substitute freshly built image tags into the values
    #[serde(default = "default_true")]
    pub replace_image_tags: bool,
}

/// Raw manifest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KubectlConfig {
    /// Manifest files or directories, relative to the project root
    pub manifests: Vec<PathBuf>,

    /// Substitute freshly built image tags into `image:` fields
    #[serde(default = "default_true")]
    pub replace_image_tags: bool,
}

fn default_true() -> bool {
    true
}

/// A dependency on another project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyDeclaration {
    pub name: String,

    /// Local path, relative to the declaring project's root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Git repository URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,

    /// URL of a single remote `skiff.toml`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Pinned commit; disables pulling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    /// Project directory inside the git repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<PathBuf>,

    /// Alternate config file name inside the dependency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_name: Option<String>,

    /// Profile to load the dependency with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Variables for `${NAME}` substitution in the dependency's config
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,

    /// Do not build the dependency's images
    pub skip_build: bool,

    /// Do not recurse into the dependency's own dependencies
    pub ignore_dependencies: bool,

    /// Do not refresh an existing git checkout
    pub disable_pull: bool,
}

/// Partial project configuration applied on top of the base config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOverlay {
    /// Images to add or replace by name
    pub images: BTreeMap<String, ImageConfig>,

    /// Deployments to replace by name, or append
    pub deployments: Vec<DeploymentConfig>,

    /// Replaces the dependency list when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<DependencyDeclaration>>,
}

impl ProfileOverlay {
    /// Apply this overlay to a config
    pub fn apply(&self, config: &mut ProjectConfig) {
        for (name, image) in &self.images {
            config.images.insert(name.clone(), image.clone());
        }

        for deployment in &self.deployments {
            match config
                .deployments
                .iter_mut()
                .find(|d| d.name == deployment.name)
            {
                Some(existing) => *existing = deployment.clone(),
                None => config.deployments.push(deployment.clone()),
            }
        }

        if let Some(ref dependencies) = self.dependencies {
            config.dependencies = dependencies.clone();
        }
    }
}

/// Flag preset for `skiff run-pipeline <name>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub build: bool,
    pub deploy: bool,
    pub force_build: bool,
    pub force_deploy: bool,
    pub force_dependencies: bool,
    pub allow_cyclic: bool,
    pub skip_dependencies: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            build: true,
            deploy: true,
            force_build: false,
            force_deploy: false,
            force_dependencies: false,
            allow_cyclic: false,
            skip_dependencies: false,
        }
    }
}
