//! Persistent build/deploy cache
//!
//! Records, per project and profile, the fingerprints of the inputs that
//! produced the last successful build of each image and the last successful
//! deploy of each deployment. A run compares fresh fingerprints against these
//! records to decide what to redo.
//!
//! # Layout
//!
//! | Path | Contents |
//! |------|----------|
//! | `<root>/.skiff/cache.json` | `{ "profiles": { "<profile>": { images, deployments } } }` |
//!
//! Entries are only written after the matching build or deploy succeeded,
//! and every write is persisted before the run moves on.

pub mod entry;
pub mod project;
pub mod store;

pub use entry::{DeploymentCacheEntry, ImageCacheEntry, KubeTarget, ProfileCache};
pub use project::ProjectCache;
pub use store::{Cache, CACHE_FILE, STATE_DIR};
