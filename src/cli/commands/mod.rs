//! CLI command implementations

pub mod cache;
pub mod completions;
pub mod run;

pub use cache::execute as cache;
pub use completions::execute as completions;
pub use run::execute as run;

use crate::config::{ConfigManager, PROJECT_CONFIG_FILE};
use crate::error::{SkiffError, SkiffResult};
use std::path::{Path, PathBuf};

/// The explicit `--project` directory, else the nearest one with a skiff.toml
pub fn project_root(project: Option<&Path>) -> SkiffResult<PathBuf> {
    if let Some(dir) = project {
        return Ok(dir.to_path_buf());
    }
    let cwd =
        std::env::current_dir().map_err(|e| SkiffError::io("getting current directory", e))?;
    ConfigManager::find_project_root(&cwd)
        .ok_or_else(|| SkiffError::ConfigNotFound(cwd.join(PROJECT_CONFIG_FILE)))
}
