//! Project config loading
//!
//! `ConfigLoader` is the seam the dependency resolver uses to turn a project
//! root into a `ProjectConfig`. `FileConfigLoader` reads `skiff.toml`,
//! substitutes `${NAME}` variables and applies the selected profile.

use crate::config::project::{DeploymentKind, ProjectConfig};
use crate::error::{SkiffError, SkiffResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default project config file name
pub const PROJECT_CONFIG_FILE: &str = "skiff.toml";

/// Parameters for loading one project's config
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Config file name inside the project root (defaults to `skiff.toml`)
    pub config_name: Option<String>,
    /// Profile overlay to apply
    pub profile: Option<String>,
    /// Variables for `${NAME}` substitution
    pub vars: BTreeMap<String, String>,
}

impl LoadOptions {
    /// Path of the config file for a project root
    pub fn config_path(&self, root: &Path) -> PathBuf {
        root.join(self.config_name.as_deref().unwrap_or(PROJECT_CONFIG_FILE))
    }
}

/// Loads a project's configuration
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    async fn load(&self, root: &Path, options: &LoadOptions) -> SkiffResult<ProjectConfig>;
}

/// Reads project configs from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FileConfigLoader;

#[async_trait]
impl ConfigLoader for FileConfigLoader {
    async fn load(&self, root: &Path, options: &LoadOptions) -> SkiffResult<ProjectConfig> {
        let path = options.config_path(root);
        if !path.exists() {
            return Err(SkiffError::ConfigNotFound(path));
        }

        debug!("Loading project config {}", path.display());
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SkiffError::io(format!("reading {}", path.display()), e))?;

        let content = substitute_vars(&content, &options.vars);
        parse_project(&content, &path, options.profile.as_deref())
    }
}

/// Parse, apply a profile, and validate a project config
pub fn parse_project(
    content: &str,
    path: &Path,
    profile: Option<&str>,
) -> SkiffResult<ProjectConfig> {
    let mut config: ProjectConfig =
        toml::from_str(content).map_err(|e| SkiffError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if let Some(profile) = profile {
        let overlay = config
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| SkiffError::ProfileNotFound {
                profile: profile.to_string(),
                path: path.to_path_buf(),
            })?;
        overlay.apply(&mut config);
    }

    validate(&config).map_err(|reason| SkiffError::ConfigInvalid {
        path: path.to_path_buf(),
        reason,
    })?;

    Ok(config)
}

/// Replace `${NAME}` with `vars[NAME]`, falling back to the environment.
/// Unknown variables are left as written.
pub fn substitute_vars(content: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after[..end];
        let value = if is_var_name(name) {
            vars.get(name)
                .cloned()
                .or_else(|| std::env::var(name).ok())
        } else {
            None
        };

        match value {
            Some(v) => out.push_str(&v),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn validate(config: &ProjectConfig) -> Result<(), String> {
    for (name, image) in &config.images {
        if image.image.trim().is_empty() {
            return Err(format!("image '{}' has an empty `image` field", name));
        }
        if image.backend == crate::config::BuildBackend::Custom && image.command.is_none() {
            return Err(format!(
                "image '{}' uses the custom backend but sets no `command`",
                name
            ));
        }
    }

    let mut seen = HashSet::new();
    for deployment in &config.deployments {
        if deployment.name.is_empty() {
            return Err("deployment with an empty name".to_string());
        }
        if !seen.insert(deployment.name.as_str()) {
            return Err(format!("duplicate deployment '{}'", deployment.name));
        }
        match deployment.kind() {
            Ok(DeploymentKind::Kubectl(k)) if k.manifests.is_empty() => {
                return Err(format!("deployment '{}' lists no manifests", deployment.name));
            }
            Ok(_) => {}
            Err(reason) => return Err(format!("deployment '{}': {}", deployment.name, reason)),
        }
    }

    let mut seen = HashSet::new();
    for dependency in &config.dependencies {
        if dependency.name.is_empty() {
            return Err("dependency with an empty name".to_string());
        }
        if !seen.insert(dependency.name.as_str()) {
            return Err(format!("duplicate dependency '{}'", dependency.name));
        }
        let sources = [&dependency.path, &dependency.git, &dependency.url]
            .iter()
            .filter(|s| s.is_some())
            .count();
        if sources != 1 {
            return Err(format!(
                "dependency '{}' needs exactly one of `path`, `git` or `url`",
                dependency.name
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn substitutes_declared_vars() {
        let mut vars = BTreeMap::new();
        vars.insert("REPLICAS".to_string(), "3".to_string());
        assert_eq!(
            substitute_vars("replicas = ${REPLICAS}", &vars),
            "replicas = 3"
        );
    }

    #[test]
    fn unknown_vars_left_untouched() {
        let vars = BTreeMap::new();
        let input = "a = \"${SKIFF_TEST_SURELY_UNSET_VAR}\" b = \"${\" c = \"${not a var}\"";
        assert_eq!(substitute_vars(input, &vars), input);
    }

    #[test]
    fn declared_vars_win_over_environment() {
        let mut vars = BTreeMap::new();
        vars.insert("PATH".to_string(), "mine".to_string());
        assert_eq!(substitute_vars("${PATH}", &vars), "mine");
    }

    #[test]
    fn missing_profile_is_error() {
        let err = parse_project("", Path::new("skiff.toml"), Some("prod")).unwrap_err();
        assert!(matches!(err, SkiffError::ProfileNotFound { .. }));
    }

    #[test]
    fn rejects_dependency_without_source() {
        let content = r#"
[[dependencies]]
name = "api"
"#;
        let err = parse_project(content, Path::new("skiff.toml"), None).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn rejects_duplicate_deployments() {
        let content = r#"
[[deployments]]
name = "web"
kubectl = { manifests = ["a.yaml"] }

[[deployments]]
name = "web"
kubectl = { manifests = ["b.yaml"] }
"#;
        let err = parse_project(content, Path::new("skiff.toml"), None).unwrap_err();
        assert!(err.to_string().contains("duplicate deployment"));
    }

    #[tokio::test]
    async fn file_loader_reads_and_applies_profile() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(PROJECT_CONFIG_FILE),
            r#"
[images.web]
image = "${REGISTRY}/web"

[profiles.dev.images.web]
image = "${REGISTRY}/web-dev"
"#,
        )
        .unwrap();

        let mut options = LoadOptions::default();
        options
            .vars
            .insert("REGISTRY".to_string(), "reg.local".to_string());

        let base = FileConfigLoader.load(temp.path(), &options).await.unwrap();
        assert_eq!(base.images["web"].image, "reg.local/web");

        options.profile = Some("dev".to_string());
        let dev = FileConfigLoader.load(temp.path(), &options).await.unwrap();
        assert_eq!(dev.images["web"].image, "reg.local/web-dev");
    }

    #[tokio::test]
    async fn file_loader_missing_config() {
        let temp = TempDir::new().unwrap();
        let err = FileConfigLoader
            .load(temp.path(), &LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SkiffError::ConfigNotFound(_)));
    }
}
