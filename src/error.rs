//! Error types for Skiff
//!
//! All modules use `SkiffResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Skiff operations
pub type SkiffResult<T> = Result<T, SkiffError>;

/// All errors that can occur in Skiff
#[derive(Error, Debug)]
pub enum SkiffError {
    // Dependency graph errors
    #[error("Cyclic dependency found: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Dependency '{name}' not found at {path}")]
    DependencyNotFound { name: String, path: PathBuf },

    #[error("Invalid dependency '{name}': {reason}")]
    DependencyInvalid { name: String, reason: String },

    #[error("Failed to load dependency '{name}' declared by {parent}: {source}")]
    DependencyLoad {
        name: String,
        parent: String,
        #[source]
        source: Box<SkiffError>,
    },

    #[error("Git operation failed for {url}: {reason}")]
    Git { url: String, reason: String },

    #[error("Download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    // Cache errors
    #[error("Corrupt cache file {path}: {reason}")]
    CorruptCache { path: PathBuf, reason: String },

    #[error("Failed to hash {path}: {reason}")]
    Hash { path: PathBuf, reason: String },

    // Build and deploy errors
    #[error("Failed to build image '{image}' of {project}: {reason}")]
    Build {
        project: String,
        image: String,
        reason: String,
    },

    #[error("Failed to deploy '{deployment}' of {project}: {reason}")]
    Deploy {
        project: String,
        deployment: String,
        reason: String,
    },

    #[error("{source} (via {})", chain.join(" -> "))]
    Chain {
        chain: Vec<String>,
        #[source]
        source: Box<SkiffError>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Profile '{profile}' is not defined in {path}")]
    ProfileNotFound { profile: String, path: PathBuf },

    #[error("Pipeline '{0}' is not defined")]
    PipelineNotFound(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, output: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl SkiffError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a hash error for a path
    pub fn hash(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Hash {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap an error with the chain of projects that led to it
    pub fn in_chain(self, chain: Vec<String>) -> Self {
        Self::Chain {
            chain,
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through chain and dependency wrappers
    pub fn root_cause(&self) -> &SkiffError {
        match self {
            Self::Chain { source, .. } | Self::DependencyLoad { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the error must stop the whole run before any node is processed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::CyclicDependency { .. } | Self::Cancelled
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root_cause() {
            Self::CyclicDependency { .. } => Some(
                "Remove one of the listed dependency declarations, or re-run with --allow-cyclic",
            ),
            Self::CorruptCache { .. } => {
                Some("Run: skiff cache clear (the next run rebuilds and redeploys everything)")
            }
            Self::ConfigNotFound(_) => {
                Some("Run inside a project containing skiff.toml, or pass --project <dir>")
            }
            Self::Git { .. } => Some("Check the repository URL and your git credentials"),
            Self::CommandFailed { .. } => Some("Check the [tools] section of your skiff config"),
            _ => None,
        }
    }
}
