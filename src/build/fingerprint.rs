//! Fingerprint of everything that decides an image's content

use super::dockerignore::DockerIgnore;
use crate::config::{BuildBackend, ImageConfig, RebuildStrategy};
use crate::error::SkiffResult;
use crate::hash::{self, Visit};
use std::path::{Path, PathBuf};

/// Hashes of an image's build inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFingerprint {
    pub dockerfile_hash: String,
    pub context_hash: String,
    pub config_hash: String,
}

impl ImageFingerprint {
    /// Hash of all inputs, before the tag is known
    pub fn inputs_hash(&self) -> String {
        hash::hash_string(&format!(
            "{}:{}:{}",
            self.dockerfile_hash, self.context_hash, self.config_hash
        ))
    }

    /// Hash stored in the cache: inputs plus the resolved tag
    pub fn content_hash(&self, tag: &str) -> String {
        hash::hash_string(&format!("{}:{}", self.inputs_hash(), tag))
    }
}

/// Absolute build context and Dockerfile of an image
pub fn image_paths(project_root: &Path, config: &ImageConfig) -> (PathBuf, PathBuf) {
    (
        project_root.join(&config.context),
        project_root.join(&config.dockerfile),
    )
}

/// Fingerprint an image's Dockerfile, context and configuration.
///
/// A custom-backend image without a Dockerfile hashes the Dockerfile as
/// empty; for the docker backend a missing Dockerfile is an error. The
/// context leaves out `.dockerignore`d and `exclude`d paths, and is not
/// hashed at all under `RebuildStrategy::IgnoreContextChanges`.
pub fn fingerprint(project_root: &Path, config: &ImageConfig) -> SkiffResult<ImageFingerprint> {
    let (context, dockerfile) = image_paths(project_root, config);

    let dockerfile_hash = if config.backend == BuildBackend::Custom && !dockerfile.exists() {
        hash::hash_string("")
    } else {
        hash::hash_file(&dockerfile)?
    };
    let context_hash = match config.rebuild_strategy {
        RebuildStrategy::IgnoreContextChanges => hash::hash_string(""),
        RebuildStrategy::Default | RebuildStrategy::Always => {
            context_hash(&context, &dockerfile, &config.exclude)?
        }
    };
    let config_hash = hash::hash_string(&serde_json::to_string(config)?);

    Ok(ImageFingerprint {
        dockerfile_hash,
        context_hash,
        config_hash,
    })
}

fn context_hash(context: &Path, dockerfile: &Path, exclude: &[String]) -> SkiffResult<String> {
    let ignore = DockerIgnore::read(context, dockerfile)?;
    hash::hash_directory_with(context, |rel, is_dir| {
        if exclude.iter().any(|p| hash::matches_pattern(rel, p)) {
            Visit::Prune
        } else {
            ignore.visit(rel, is_dir)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn image(backend: BuildBackend) -> ImageConfig {
        ImageConfig {
            image: "web".to_string(),
            context: PathBuf::from("."),
            dockerfile: PathBuf::from("Dockerfile"),
            tag: "{hash}".to_string(),
            backend,
            command: Some("true".to_string()),
            build_args: BTreeMap::new(),
            exclude: vec![],
            rebuild_strategy: Default::default(),
            disabled: false,
        }
    }

    #[test]
    fn stable_until_an_input_changes() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Dockerfile"), "FROM alpine").unwrap();
        std::fs::write(temp.path().join("app.sh"), "echo 1").unwrap();
        let config = image(BuildBackend::Docker);

        let first = fingerprint(temp.path(), &config).unwrap();
        assert_eq!(first, fingerprint(temp.path(), &config).unwrap());

        std::fs::write(temp.path().join("app.sh"), "echo 2").unwrap();
        let second = fingerprint(temp.path(), &config).unwrap();
        assert_ne!(first.context_hash, second.context_hash);
        assert_eq!(first.dockerfile_hash, second.dockerfile_hash);

        let mut changed = config.clone();
        changed.build_args.insert("V".to_string(), "1".to_string());
        let third = fingerprint(temp.path(), &changed).unwrap();
        assert_ne!(second.config_hash, third.config_hash);
    }

    #[test]
    fn dockerignored_paths_do_not_count() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Dockerfile"), "FROM alpine").unwrap();
        std::fs::write(temp.path().join(".dockerignore"), "node_modules\n*.log\n").unwrap();
        std::fs::write(temp.path().join("app.js"), "1").unwrap();
        std::fs::create_dir_all(temp.path().join("node_modules/left-pad")).unwrap();
        let config = image(BuildBackend::Docker);
        let before = fingerprint(temp.path(), &config).unwrap();

        std::fs::write(temp.path().join("node_modules/left-pad/index.js"), "x").unwrap();
        std::fs::write(temp.path().join("server.log"), "noise").unwrap();
        assert_eq!(before, fingerprint(temp.path(), &config).unwrap());

        std::fs::write(temp.path().join("app.js"), "2").unwrap();
        assert_ne!(before, fingerprint(temp.path(), &config).unwrap());
    }

    #[test]
    fn ignore_context_changes_strategy() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Dockerfile"), "FROM alpine").unwrap();
        std::fs::write(temp.path().join("app.js"), "1").unwrap();
        let mut config = image(BuildBackend::Docker);
        config.rebuild_strategy = RebuildStrategy::IgnoreContextChanges;
        let before = fingerprint(temp.path(), &config).unwrap();

        std::fs::write(temp.path().join("app.js"), "2").unwrap();
        assert_eq!(before, fingerprint(temp.path(), &config).unwrap());

        std::fs::write(temp.path().join("Dockerfile"), "FROM debian").unwrap();
        assert_ne!(before, fingerprint(temp.path(), &config).unwrap());
    }

    #[test]
    fn missing_dockerfile() {
        let temp = TempDir::new().unwrap();
        assert!(fingerprint(temp.path(), &image(BuildBackend::Docker)).is_err());
        assert!(fingerprint(temp.path(), &image(BuildBackend::Custom)).is_ok());
    }

    #[test]
    fn content_hash_covers_tag() {
        let fp = ImageFingerprint {
            dockerfile_hash: "d".to_string(),
            context_hash: "c".to_string(),
            config_hash: "k".to_string(),
        };
        assert_ne!(fp.content_hash("a"), fp.content_hash("b"));
    }
}
