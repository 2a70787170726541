//! Skiff - incremental container builds and Kubernetes deploys
//!
//! Resolves a project's dependency graph, rebuilds only the images whose
//! inputs changed and redeploys only what changed or disappeared from the
//! cluster, dependencies first.

pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod dependency;
pub mod deploy;
pub mod error;
pub mod event;
pub mod hash;
pub mod pipeline;
pub mod process;
pub mod ui;

pub use error::{SkiffError, SkiffResult};
