use super::{DeployRequest, Deployer, DeploymentStatus, HelmDeployer, KubectlDeployer, Rendered};
use crate::config::schema::ToolsConfig;
use crate::error::SkiffResult;
use async_trait::async_trait;

/// Routes each deployment to the backend matching its kind
pub struct BackendDeployer {
    helm: HelmDeployer,
    kubectl: KubectlDeployer,
}

impl BackendDeployer {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            helm: HelmDeployer::new(&tools.helm),
            kubectl: KubectlDeployer::new(&tools.kubectl),
        }
    }

    fn backend(&self, request: &DeployRequest) -> &dyn Deployer {
        match request.rendered {
            Rendered::Helm { .. } => &self.helm,
            Rendered::Kubectl { .. } => &self.kubectl,
        }
    }
}

#[async_trait]
impl Deployer for BackendDeployer {
    async fn status(&self, request: &DeployRequest) -> SkiffResult<DeploymentStatus> {
        self.backend(request).status(request).await
    }

    async fn deploy(&self, request: &DeployRequest) -> SkiffResult<()> {
        self.backend(request).deploy(request).await
    }
}
