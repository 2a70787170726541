//! Raw manifest backend

use super::{DeployRequest, Deployer, DeploymentStatus, Rendered};
use crate::error::{SkiffError, SkiffResult};
use crate::process::{failure_reason, output_tail, ToolCommand};
use async_trait::async_trait;
use tracing::info;

/// Applies manifests with `kubectl apply`, feeding them on stdin
pub struct KubectlDeployer {
    binary: String,
}

impl KubectlDeployer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, request: &DeployRequest, verb: &str) -> SkiffResult<ToolCommand> {
        let Rendered::Kubectl { manifests } = &request.rendered else {
            return Err(request.error("not a kubectl deployment".to_string()));
        };

        let mut cmd = ToolCommand::new(&self.binary).arg(verb).args(["-f", "-"]);
        if let Some(ref namespace) = request.namespace {
            cmd = cmd.arg("--namespace").arg(namespace.as_str());
        }
        if let Some(ref context) = request.target.context {
            cmd = cmd.arg("--context").arg(context.as_str());
        }
        Ok(cmd.stdin(manifests.as_str()))
    }
}

#[async_trait]
impl Deployer for KubectlDeployer {
    async fn status(&self, request: &DeployRequest) -> SkiffResult<DeploymentStatus> {
        let cmd = self.command(request, "get")?.args(["-o", "name"]);
        let output = cmd.output().await?;
        if output.status.success() {
            return Ok(DeploymentStatus::Deployed);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("NotFound") || stderr.contains("not found") {
            Ok(DeploymentStatus::NotDeployed)
        } else {
            Err(SkiffError::command_exec(
                cmd.display(),
                output_tail(&stdout, &stderr),
            ))
        }
    }

    async fn deploy(&self, request: &DeployRequest) -> SkiffResult<()> {
        info!("Applying manifests of {}", request.name());
        self.command(request, "apply")?
            .run()
            .await
            .map(|_| ())
            .map_err(|e| request.error(failure_reason(&e)))
    }
}
