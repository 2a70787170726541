//! Locating dependency projects on disk
//!
//! Local dependencies are plain directories. Git dependencies are cloned into
//! a per-source checkout directory and refreshed on later runs. URL
//! dependencies are a single config file downloaded into its own directory.

use crate::config::{DependencyDeclaration, PROJECT_CONFIG_FILE};
use crate::error::{SkiffError, SkiffResult};
use crate::hash;
use crate::process::{failure_reason, ToolCommand};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Which commit of a git source to use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitReference {
    /// The remote's default branch
    Default,
    Branch(String),
    Tag(String),
    /// A pinned commit; never pulled
    Revision(String),
}

impl GitReference {
    fn label(&self) -> String {
        match self {
            Self::Default => String::new(),
            Self::Branch(b) => format!("branch:{}", b),
            Self::Tag(t) => format!("tag:{}", t),
            Self::Revision(r) => format!("rev:{}", r),
        }
    }
}

/// Where a dependency comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencySource {
    /// Path relative to the declaring project
    Local(PathBuf),
    Git {
        url: String,
        reference: GitReference,
        sub_path: Option<PathBuf>,
    },
    /// A single remote config file
    Url(String),
}

impl DependencySource {
    /// Interpret a declaration's source fields
    pub fn from_declaration(decl: &DependencyDeclaration) -> SkiffResult<Self> {
        let invalid = |reason: &str| SkiffError::DependencyInvalid {
            name: decl.name.clone(),
            reason: reason.to_string(),
        };

        match (&decl.path, &decl.git, &decl.url) {
            (Some(path), None, None) => Ok(Self::Local(PathBuf::from(path))),
            (None, Some(url), None) => {
                let reference = match (&decl.branch, &decl.tag, &decl.revision) {
                    (None, None, None) => GitReference::Default,
                    (Some(b), None, None) => GitReference::Branch(b.clone()),
                    (None, Some(t), None) => GitReference::Tag(t.clone()),
                    (None, None, Some(r)) => GitReference::Revision(r.clone()),
                    _ => {
                        return Err(invalid(
                            "only one of `branch`, `tag` or `revision` may be set",
                        ))
                    }
                };
                Ok(Self::Git {
                    url: url.clone(),
                    reference,
                    sub_path: decl.sub_path.clone(),
                })
            }
            (None, None, Some(url)) => Ok(Self::Url(url.clone())),
            _ => Err(invalid("exactly one of `path`, `git` or `url` is required")),
        }
    }

    /// Stable directory name for a remote source
    pub fn checkout_key(&self) -> Option<String> {
        match self {
            Self::Local(_) => None,
            Self::Git { url, reference, .. } => {
                let digest = hash::hash_string(&format!("{}#{}", url, reference.label()));
                Some(hash::short(&digest).to_string())
            }
            Self::Url(url) => Some(hash::short(&hash::hash_string(url)).to_string()),
        }
    }
}

/// Resolves a dependency declaration to the project root it refers to
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn locate(&self, base_dir: &Path, declaration: &DependencyDeclaration)
        -> SkiffResult<PathBuf>;
}

/// Fetches dependencies with the local filesystem, `git` and HTTP
pub struct SourceCheckout {
    checkout_dir: PathBuf,
    git: String,
}

impl SourceCheckout {
    pub fn new(checkout_dir: PathBuf, git: impl Into<String>) -> Self {
        Self {
            checkout_dir,
            git: git.into(),
        }
    }

    async fn locate_local(&self, base_dir: &Path, name: &str, path: &Path) -> SkiffResult<PathBuf> {
        let candidate = base_dir.join(path);
        match fs::canonicalize(&candidate).await {
            Ok(root) if root.is_dir() => Ok(root),
            _ => Err(SkiffError::DependencyNotFound {
                name: name.to_string(),
                path: candidate,
            }),
        }
    }

    async fn locate_git(
        &self,
        decl: &DependencyDeclaration,
        source: &DependencySource,
    ) -> SkiffResult<PathBuf> {
        let DependencySource::Git {
            url,
            reference,
            sub_path,
        } = source
        else {
            return Err(SkiffError::Internal("expected a git source".to_string()));
        };

        let key = source.checkout_key().unwrap_or_default();
        let dir = self.checkout_dir.join(key);
        let git_error = |e: SkiffError| SkiffError::Git {
            url: url.clone(),
            reason: failure_reason(&e),
        };

        if !dir.join(".git").exists() {
            fs::create_dir_all(&self.checkout_dir).await.map_err(|e| {
                SkiffError::io(format!("creating {}", self.checkout_dir.display()), e)
            })?;

            info!("Cloning {} into {}", url, dir.display());
            let mut clone = ToolCommand::new(&self.git).arg("clone");
            if let GitReference::Branch(name) | GitReference::Tag(name) = reference {
                clone = clone.args(["--branch", name.as_str()]);
            }
            clone
                .arg(url.as_str())
                .arg(dir.display().to_string())
                .run()
                .await
                .map_err(git_error)?;

            if let GitReference::Revision(rev) = reference {
                self.git_in(&dir)
                    .args(["checkout", rev.as_str()])
                    .run()
                    .await
                    .map_err(git_error)?;
            }
        } else {
            match reference {
                GitReference::Revision(rev) => {
                    let checkout = self.git_in(&dir).args(["checkout", rev.as_str()]);
                    if checkout.run().await.is_err() {
                        debug!("Revision {} not present, fetching", rev);
                        self.git_in(&dir)
                            .arg("fetch")
                            .run()
                            .await
                            .map_err(git_error)?;
                        checkout.run().await.map_err(git_error)?;
                    }
                }
                GitReference::Tag(_) => {}
                GitReference::Default | GitReference::Branch(_) => {
                    if decl.disable_pull {
                        debug!("Pull disabled for {}", decl.name);
                    } else if let Err(e) = self.git_in(&dir).arg("pull").run().await {
                        warn!(
                            "Failed to update dependency '{}', using existing checkout: {}",
                            decl.name,
                            failure_reason(&e)
                        );
                    }
                }
            }
        }

        let root = match sub_path {
            Some(sub) => dir.join(sub),
            None => dir,
        };
        self.locate_local(&self.checkout_dir, &decl.name, &root).await
    }

    async fn locate_url(&self, decl: &DependencyDeclaration, source: &DependencySource) -> SkiffResult<PathBuf> {
        let DependencySource::Url(url) = source else {
            return Err(SkiffError::Internal("expected a url source".to_string()));
        };

        let dir = self
            .checkout_dir
            .join(source.checkout_key().unwrap_or_default());
        let file = dir.join(decl.config_name.as_deref().unwrap_or(PROJECT_CONFIG_FILE));

        match download(url.clone()).await {
            Ok(content) => {
                fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| SkiffError::io(format!("creating {}", dir.display()), e))?;
                fs::write(&file, content)
                    .await
                    .map_err(|e| SkiffError::io(format!("writing {}", file.display()), e))?;
            }
            Err(e) if file.exists() => {
                warn!(
                    "Failed to refresh dependency '{}', using previous download: {}",
                    decl.name, e
                );
            }
            Err(e) => return Err(e),
        }

        Ok(dir)
    }

    fn git_in(&self, dir: &Path) -> ToolCommand {
        ToolCommand::new(&self.git)
            .arg("-C")
            .arg(dir.display().to_string())
    }
}

async fn download(url: String) -> SkiffResult<String> {
    debug!("Downloading {}", url);
    let target = url.clone();
    tokio::task::spawn_blocking(move || {
        let mut response = ureq::get(&target).call()?;
        response.body_mut().read_to_string()
    })
    .await
    .map_err(|e| SkiffError::Internal(format!("download task failed: {}", e)))?
    .map_err(|e| SkiffError::Download {
        url,
        reason: e.to_string(),
    })
}

#[async_trait]
impl SourceFetcher for SourceCheckout {
    async fn locate(
        &self,
        base_dir: &Path,
        declaration: &DependencyDeclaration,
    ) -> SkiffResult<PathBuf> {
        let source = DependencySource::from_declaration(declaration)?;
        match source {
            DependencySource::Local(ref path) => {
                self.locate_local(base_dir, &declaration.name, path).await
            }
            DependencySource::Git { .. } => self.locate_git(declaration, &source).await,
            DependencySource::Url(_) => self.locate_url(declaration, &source).await,
        }
    }
}
