//! Incremental image builds
//!
//! `BuildOrchestrator` decides which of a project's images need building by
//! comparing input fingerprints with the cache, then drives a `Builder` for
//! the ones that do.

mod backend;
pub mod dockerignore;
pub mod fingerprint;
mod orchestrator;
pub mod tag;

pub use backend::{BackendBuilder, CustomBuilder, DockerBuilder};
pub use orchestrator::{BuildOptions, BuildOrchestrator, BuildReport, BuiltImage};

use crate::config::ImageConfig;
use crate::error::{SkiffError, SkiffResult};
use async_trait::async_trait;
use std::path::PathBuf;

/// Everything a backend needs to build one image
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Project the image belongs to
    pub project: String,
    /// Image config name
    pub name: String,
    /// Repository name
    pub image: String,
    pub tag: String,
    pub project_root: PathBuf,
    /// Absolute build context
    pub context: PathBuf,
    /// Absolute Dockerfile path
    pub dockerfile: PathBuf,
    pub config: ImageConfig,
}

impl BuildRequest {
    /// `image:tag`
    pub fn reference(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    pub(crate) fn error(&self, reason: String) -> SkiffError {
        SkiffError::Build {
            project: self.project.clone(),
            image: self.name.clone(),
            reason,
        }
    }
}

/// Image builder backend
#[async_trait]
pub trait Builder: Send + Sync {
    /// Build and tag one image
    async fn build(&self, request: &BuildRequest) -> SkiffResult<()>;
}
