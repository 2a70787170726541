//! Shared, lock-guarded cache handle for one project and profile

use super::entry::{DeploymentCacheEntry, ImageCacheEntry};
use super::store::Cache;
use crate::error::SkiffResult;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Cache of one project, scoped to the active profile.
///
/// Every `record_*` call mutates and saves while holding the lock, so
/// concurrent builds of the same project never interleave writes. The
/// in-memory copy only changes once the save succeeded.
#[derive(Debug)]
pub struct ProjectCache {
    root: PathBuf,
    profile: String,
    inner: Mutex<Cache>,
}

impl ProjectCache {
    /// Load the cache of `root` for `profile`
    pub async fn open(root: &Path, profile: &str) -> SkiffResult<Self> {
        let cache = Cache::load(root).await?;
        Ok(Self::from_cache(root, profile, cache))
    }

    pub fn from_cache(root: &Path, profile: &str, cache: Cache) -> Self {
        Self {
            root: root.to_path_buf(),
            profile: profile.to_string(),
            inner: Mutex::new(cache),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub async fn image(&self, name: &str) -> Option<ImageCacheEntry> {
        self.inner
            .lock()
            .await
            .image_entry(&self.profile, name)
            .cloned()
    }

    pub async fn deployment(&self, name: &str) -> Option<DeploymentCacheEntry> {
        self.inner
            .lock()
            .await
            .deployment_entry(&self.profile, name)
            .cloned()
    }

    /// Record a successful build and persist it
    pub async fn record_image(&self, name: &str, entry: ImageCacheEntry) -> SkiffResult<()> {
        debug!("Recording image {} -> {}", name, entry.tag);
        self.update(|cache, profile| cache.set_image_entry(profile, name, entry))
            .await
    }

    /// Record a successful deploy and persist it
    pub async fn record_deployment(
        &self,
        name: &str,
        entry: DeploymentCacheEntry,
    ) -> SkiffResult<()> {
        debug!("Recording deployment {}", name);
        self.update(|cache, profile| cache.set_deployment_entry(profile, name, entry))
            .await
    }

    async fn update<F>(&self, mutate: F) -> SkiffResult<()>
    where
        F: FnOnce(&mut Cache, &str),
    {
        let mut guard = self.inner.lock().await;
        let mut next = guard.clone();
        mutate(&mut next, &self.profile);
        next.save(&self.root).await?;
        *guard = next;
        Ok(())
    }
}
