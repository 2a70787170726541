//! Helm release backend

use super::{ChartSource, DeployRequest, Deployer, DeploymentStatus, Rendered};
use crate::cache::STATE_DIR;
use crate::error::{SkiffError, SkiffResult};
use crate::process::{failure_reason, output_tail, ToolCommand};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

/// Deploys Helm releases with `helm upgrade --install`
pub struct HelmDeployer {
    binary: String,
}

impl HelmDeployer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn with_target(&self, mut cmd: ToolCommand, request: &DeployRequest) -> ToolCommand {
        if let Some(ref namespace) = request.namespace {
            cmd = cmd.arg("--namespace").arg(namespace.as_str());
        }
        if let Some(ref context) = request.target.context {
            cmd = cmd.arg("--kube-context").arg(context.as_str());
        }
        cmd
    }

    /// Rendered values are written under the project's state directory
    fn values_path(request: &DeployRequest) -> PathBuf {
        request
            .project_root
            .join(STATE_DIR)
            .join("values")
            .join(format!("{}.json", request.name()))
    }

    fn upgrade_command(&self, request: &DeployRequest, chart: &ChartSource) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.binary)
            .args(["upgrade", "--install"])
            .arg(request.name());

        match chart {
            ChartSource::Local(path) => cmd = cmd.arg(path.display().to_string()),
            ChartSource::Remote {
                name,
                repo,
                version,
            } => {
                cmd = cmd.arg(name.as_str());
                if let Some(repo) = repo {
                    cmd = cmd.arg("--repo").arg(repo.as_str());
                }
                if let Some(version) = version {
                    cmd = cmd.arg("--version").arg(version.as_str());
                }
            }
        }

        cmd = self.with_target(cmd, request);
        if request.namespace.is_some() {
            cmd = cmd.arg("--create-namespace");
        }
        cmd.arg("--values")
            .arg(Self::values_path(request).display().to_string())
    }
}

#[async_trait]
impl Deployer for HelmDeployer {
    async fn status(&self, request: &DeployRequest) -> SkiffResult<DeploymentStatus> {
        let cmd = self.with_target(
            ToolCommand::new(&self.binary)
                .arg("status")
                .arg(request.name())
                .args(["-o", "json"]),
            request,
        );
        let output = cmd.output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            if stderr.contains("not found") {
                return Ok(DeploymentStatus::NotDeployed);
            }
            return Err(SkiffError::command_exec(
                cmd.display(),
                output_tail(&stdout, &stderr),
            ));
        }

        let parsed: serde_json::Value = serde_json::from_str(&stdout)?;
        let status = parsed["info"]["status"].as_str().unwrap_or("unknown");
        debug!("Release {} status: {}", request.name(), status);

        Ok(match status {
            "deployed" => DeploymentStatus::Deployed,
            "uninstalled" => DeploymentStatus::NotDeployed,
            other => DeploymentStatus::Error(format!("release is {}", other)),
        })
    }

    async fn deploy(&self, request: &DeployRequest) -> SkiffResult<()> {
        let Rendered::Helm { chart, values } = &request.rendered else {
            return Err(request.error("not a Helm deployment".to_string()));
        };

        let path = Self::values_path(request);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SkiffError::io(format!("creating {}", parent.display()), e))?;
        }
        tokio::fs::write(&path, serde_json::to_string_pretty(values)?)
            .await
            .map_err(|e| SkiffError::io(format!("writing {}", path.display()), e))?;

        info!("Upgrading Helm release {}", request.name());
        self.upgrade_command(request, chart)
            .run()
            .await
            .map(|_| ())
            .map_err(|e| request.error(failure_reason(&e)))
    }
}
