//! Incremental deployments
//!
//! `DeployOrchestrator` renders each deployment (values or manifests with
//! image tags substituted), fingerprints chart, values and config, and only
//! hands the deployment to a `Deployer` when something changed or the
//! cluster no longer has it.

mod backend;
mod helm;
pub mod images;
mod kubectl;
mod orchestrator;
pub mod values;

pub use backend::BackendDeployer;
pub use helm::HelmDeployer;
pub use images::ImageSubstitutions;
pub use kubectl::KubectlDeployer;
pub use orchestrator::{DeployOptions, DeployOrchestrator, DeployReport};

use crate::cache::KubeTarget;
use crate::config::DeploymentConfig;
use crate::error::{SkiffError, SkiffResult};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

/// Where a Helm chart comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartSource {
    /// Absolute path of a chart directory
    Local(PathBuf),
    Remote {
        name: String,
        repo: Option<String>,
        version: Option<String>,
    },
}

/// Deployment inputs after rendering and image substitution
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Helm { chart: ChartSource, values: Value },
    Kubectl { manifests: String },
}

/// Everything a backend needs to query or roll out one deployment
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub project: String,
    pub project_root: PathBuf,
    pub config: DeploymentConfig,
    /// Effective namespace (deployment's own, else the target's)
    pub namespace: Option<String>,
    pub target: KubeTarget,
    pub rendered: Rendered,
    /// Tags substituted into `rendered`
    pub images: ImageSubstitutions,
}

impl DeployRequest {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub(crate) fn error(&self, reason: String) -> SkiffError {
        SkiffError::Deploy {
            project: self.project.clone(),
            deployment: self.config.name.clone(),
            reason,
        }
    }
}

/// State of a deployment in the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentStatus {
    Deployed,
    NotDeployed,
    /// Present but unhealthy (e.g. a failed Helm release)
    Error(String),
}

/// Deployment backend
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Whether the deployment currently exists and is healthy
    async fn status(&self, request: &DeployRequest) -> SkiffResult<DeploymentStatus>;

    /// Install or upgrade the deployment
    async fn deploy(&self, request: &DeployRequest) -> SkiffResult<()>;
}
