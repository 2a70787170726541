//! Project dependency resolution
//!
//! - `source`: turning a declaration into a project root on disk
//! - `graph`: the arena graph, execution order and cycle detection
//! - `resolver`: discovery of the whole graph from the root project

pub mod graph;
pub mod resolver;
pub mod source;

pub use graph::{DependencyGraph, DependencyNode, NodeId};
pub use resolver::{DependencyResolver, ResolveOptions, ResolvedGraph};
pub use source::{DependencySource, GitReference, SourceCheckout, SourceFetcher};
