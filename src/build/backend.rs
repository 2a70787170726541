//! Builder backends that shell out to a container CLI or a user command

use super::{BuildRequest, Builder};
use crate::config::BuildBackend;
use crate::config::schema::ToolsConfig;
use crate::error::SkiffResult;
use crate::process::{failure_reason, ToolCommand};
use async_trait::async_trait;
use tracing::info;

/// `docker build` (or any CLI with the same interface, e.g. podman)
pub struct DockerBuilder {
    binary: String,
}

impl DockerBuilder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, request: &BuildRequest) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.binary)
            .arg("build")
            .arg("-t")
            .arg(request.reference())
            .arg("-f")
            .arg(request.dockerfile.display().to_string());
        for (key, value) in &request.config.build_args {
            cmd = cmd.args(["--build-arg".to_string(), format!("{}={}", key, value)]);
        }
        cmd.arg(request.context.display().to_string())
    }
}

#[async_trait]
impl Builder for DockerBuilder {
    async fn build(&self, request: &BuildRequest) -> SkiffResult<()> {
        info!("Building {} with {}", request.reference(), self.binary);
        self.command(request)
            .run()
            .await
            .map(|_| ())
            .map_err(|e| request.error(failure_reason(&e)))
    }
}

/// Runs the image's `command` through a shell.
///
/// The command sees `IMAGE`, `TAG`, `CONTEXT` and `DOCKERFILE` in its
/// environment and runs from the project root.
pub struct CustomBuilder {
    shell: String,
}

impl CustomBuilder {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl Builder for CustomBuilder {
    async fn build(&self, request: &BuildRequest) -> SkiffResult<()> {
        let command = request.config.command.as_deref().ok_or_else(|| {
            request.error("the custom backend requires a `command`".to_string())
        })?;

        info!("Building {} with `{}`", request.reference(), command);
        let mut cmd = ToolCommand::new(&self.shell)
            .args(["-c", command])
            .current_dir(&request.project_root)
            .env("IMAGE", &request.image)
            .env("TAG", &request.tag)
            .env("CONTEXT", request.context.display().to_string())
            .env("DOCKERFILE", request.dockerfile.display().to_string());
        for (key, value) in &request.config.build_args {
            cmd = cmd.env(key, value);
        }

        cmd.run()
            .await
            .map(|_| ())
            .map_err(|e| request.error(failure_reason(&e)))
    }
}

/// Picks the backend each image asks for
pub struct BackendBuilder {
    docker: DockerBuilder,
    custom: CustomBuilder,
}

impl BackendBuilder {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            docker: DockerBuilder::new(&tools.docker),
            custom: CustomBuilder::new(&tools.shell),
        }
    }
}

#[async_trait]
impl Builder for BackendBuilder {
    async fn build(&self, request: &BuildRequest) -> SkiffResult<()> {
        match request.config.backend {
            BuildBackend::Docker => self.docker.build(request).await,
            BuildBackend::Custom => self.custom.build(request).await,
        }
    }
}
