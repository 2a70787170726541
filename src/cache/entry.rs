//! Cache records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Last successful build of one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageCacheEntry {
    /// Combined fingerprint of every build input plus the tag.
    /// `None` when hashing failed, which forces the next run to rebuild.
    pub content_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_hash: Option<String>,

    /// Repository name the image was pushed under
    pub image: String,

    /// Tag produced by the build
    pub tag: String,

    pub built_at: DateTime<Utc>,
}

impl ImageCacheEntry {
    /// `image:tag`
    pub fn reference(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

/// Last successful deploy of one deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentCacheEntry {
    pub chart_hash: String,
    pub values_hash: String,
    pub config_hash: String,

    /// Cluster the deploy went to; a different target means it must run again
    #[serde(default)]
    pub target: KubeTarget,

    pub deployed_at: DateTime<Utc>,
}

/// Cluster target of a deploy round
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KubeTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl fmt::Display for KubeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.context.as_deref().unwrap_or("(current)"),
            self.namespace.as_deref().unwrap_or("(default)")
        )
    }
}

/// Everything cached for one profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileCache {
    pub images: BTreeMap<String, ImageCacheEntry>,
    pub deployments: BTreeMap<String, DeploymentCacheEntry>,
}

impl ProfileCache {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.deployments.is_empty()
    }
}
