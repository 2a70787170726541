//! On-disk cache file
//!
//! One JSON document per project at `<root>/.skiff/cache.json`, keyed by
//! profile. Saves go through a uniquely named temp file and a rename so a
//! crash mid-write leaves either the old file or the new one, never a mix.

use super::entry::{DeploymentCacheEntry, ImageCacheEntry, ProfileCache};
use crate::error::{SkiffError, SkiffResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory under a project root that holds skiff state
pub const STATE_DIR: &str = ".skiff";

/// Cache file name inside `STATE_DIR`
pub const CACHE_FILE: &str = "cache.json";

/// Persisted build/deploy cache of one project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cache {
    pub profiles: BTreeMap<String, ProfileCache>,
}

impl Cache {
    /// Cache file location for a project root
    pub fn path(project_root: &Path) -> PathBuf {
        project_root.join(STATE_DIR).join(CACHE_FILE)
    }

    /// Load the cache; an absent file is an empty cache, an unreadable one is an error
    pub async fn load(project_root: &Path) -> SkiffResult<Self> {
        let path = Self::path(project_root);
        if !path.exists() {
            debug!("No cache at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| SkiffError::io(format!("reading cache file {}", path.display()), e))?;

        serde_json::from_str(&content).map_err(|e| SkiffError::CorruptCache {
            path,
            reason: e.to_string(),
        })
    }

    /// Persist atomically
    pub async fn save(&self, project_root: &Path) -> SkiffResult<()> {
        let path = Self::path(project_root);
        let dir = project_root.join(STATE_DIR);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| SkiffError::io(format!("creating {}", dir.display()), e))?;

        let content = serde_json::to_string_pretty(self)?;
        let tmp = dir.join(format!("{}.{}.tmp", CACHE_FILE, Uuid::new_v4()));

        fs::write(&tmp, content)
            .await
            .map_err(|e| SkiffError::io(format!("writing {}", tmp.display()), e))?;

        if let Err(e) = fs::rename(&tmp, &path).await {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                warn!("Failed to remove {}: {}", tmp.display(), cleanup);
            }
            return Err(SkiffError::io(
                format!("replacing cache file {}", path.display()),
                e,
            ));
        }

        debug!("Saved cache {}", path.display());
        Ok(())
    }

    /// Delete the cache file of a project, if present
    pub async fn remove(project_root: &Path) -> SkiffResult<bool> {
        let path = Self::path(project_root);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .await
            .map_err(|e| SkiffError::io(format!("deleting {}", path.display()), e))?;
        Ok(true)
    }

    pub fn profile(&self, profile: &str) -> Option<&ProfileCache> {
        self.profiles.get(profile)
    }

    fn profile_mut(&mut self, profile: &str) -> &mut ProfileCache {
        self.profiles.entry(profile.to_string()).or_default()
    }

    pub fn image_entry(&self, profile: &str, name: &str) -> Option<&ImageCacheEntry> {
        self.profile(profile).and_then(|p| p.images.get(name))
    }

    pub fn deployment_entry(&self, profile: &str, name: &str) -> Option<&DeploymentCacheEntry> {
        self.profile(profile).and_then(|p| p.deployments.get(name))
    }

    pub fn set_image_entry(&mut self, profile: &str, name: &str, entry: ImageCacheEntry) {
        self.profile_mut(profile).images.insert(name.to_string(), entry);
    }

    pub fn set_deployment_entry(&mut self, profile: &str, name: &str, entry: DeploymentCacheEntry) {
        self.profile_mut(profile)
            .deployments
            .insert(name.to_string(), entry);
    }

    /// Drop everything cached for one profile
    pub fn remove_profile(&mut self, profile: &str) -> bool {
        self.profiles.remove(profile).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.values().all(ProfileCache::is_empty)
    }
}
