//! Global settings schema for Skiff
//!
//! Settings are stored at `~/.config/skiff/config.toml`. Project-specific
//! configuration lives in each project's `skiff.toml` (see `config::project`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// General settings
    pub general: GeneralConfig,

    /// External tool binaries
    pub tools: ToolsConfig,

    /// Build defaults
    pub build: BuildDefaults,

    /// Dependency checkout settings
    pub dependencies: DependenciesConfig,

    /// Default cluster target
    pub kubernetes: KubernetesConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Binaries used by the built-in builder and deployer backends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Image build CLI (`docker` or a compatible CLI such as `podman`)
    pub docker: String,

    /// Helm CLI
    pub helm: String,

    /// kubectl CLI
    pub kubectl: String,

    /// git CLI used for remote dependencies
    pub git: String,

    /// Shell used by the custom build backend
    pub shell: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            docker: "docker".to_string(),
            helm: "helm".to_string(),
            kubectl: "kubectl".to_string(),
            git: "git".to_string(),
            shell: "sh".to_string(),
        }
    }
}

/// Build defaults (overridable per invocation)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildDefaults {
    /// Build images one at a time
    pub sequential: bool,

    /// Maximum parallel image builds per project (0 = unbounded)
    pub max_concurrent_builds: usize,
}

/// Dependency checkout settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DependenciesConfig {
    /// Where git and URL dependencies are checked out
    /// (defaults to `~/.local/share/skiff/dependencies`)
    pub checkout_dir: Option<PathBuf>,
}

/// Default cluster target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    /// kube context to deploy into (current context when unset)
    pub context: Option<String>,

    /// Namespace for deployments without an explicit namespace
    pub namespace: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serialize() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[tools]"));
    }

    #[test]
    fn settings_deserialize_empty() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.tools.helm, "helm");
        assert_eq!(settings.build.max_concurrent_builds, 0);
    }

    #[test]
    fn settings_deserialize_partial() {
        let toml = r#"
            [tools]
            docker = "podman"

            [kubernetes]
            namespace = "dev"
        "#;
        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.tools.docker, "podman");
        assert_eq!(settings.tools.kubectl, "kubectl"); // default preserved
        assert_eq!(settings.kubernetes.namespace.as_deref(), Some("dev"));
    }
}
