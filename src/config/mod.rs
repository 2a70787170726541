//! Configuration management for Skiff
//!
//! Two layers: global user settings (`Settings`, managed by `ConfigManager`)
//! and per-project `skiff.toml` files (`ProjectConfig`, loaded through a
//! `ConfigLoader`).

pub mod loader;
pub mod project;
pub mod schema;

pub use loader::{ConfigLoader, FileConfigLoader, LoadOptions, PROJECT_CONFIG_FILE};
pub use project::{
    BuildBackend, DependencyDeclaration, DeploymentConfig, DeploymentKind, HelmConfig,
    ImageConfig, KubectlConfig, PipelineConfig, ProfileOverlay, ProjectConfig, RebuildStrategy,
    DEFAULT_PROFILE,
};
pub use schema::Settings;

use crate::error::{SkiffError, SkiffResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Global settings manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default settings file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skiff")
            .join("config.toml")
    }

    /// Get the default directory for git and URL dependency checkouts
    pub fn default_checkout_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skiff")
            .join("dependencies")
    }

    /// Checkout directory, honoring the settings override
    pub fn checkout_dir(settings: &Settings) -> PathBuf {
        settings
            .dependencies
            .checkout_dir
            .clone()
            .unwrap_or_else(Self::default_checkout_dir)
    }

    /// Load settings, falling back to defaults if the file is absent
    pub async fn load(&self) -> SkiffResult<Settings> {
        if !self.config_path.exists() {
            debug!("Settings file not found, using defaults");
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&self.config_path).await.map_err(|e| {
            SkiffError::io(
                format!("reading settings from {}", self.config_path.display()),
                e,
            )
        })?;

        toml::from_str(&content).map_err(|e| SkiffError::ConfigInvalid {
            path: self.config_path.clone(),
            reason: e.to_string(),
        })
    }

    /// Get the settings file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Walk up from `start` to the first directory containing `skiff.toml`
    pub fn find_project_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(PROJECT_CONFIG_FILE).is_file())
            .map(Path::to_path_buf)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
