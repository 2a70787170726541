//! Arena-backed dependency graph
//!
//! Nodes are owned by the graph and addressed by index; each project root
//! appears once no matter how many projects declare it. Traversal marks live
//! in a side table, so the graph itself is read-only once built.

use crate::config::{ProjectConfig, DEFAULT_PROFILE};
use crate::error::{SkiffError, SkiffResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Index of a node in its graph
pub type NodeId = usize;

/// One project in the graph
#[derive(Debug, Clone)]
pub struct DependencyNode {
    /// Canonical project root; the node's identity
    pub root: PathBuf,
    /// Declared name (display name for the root project)
    pub name: String,
    /// Profile the config was loaded with
    pub profile: Option<String>,
    pub config: Arc<ProjectConfig>,
    /// Children in declaration order
    pub children: Vec<NodeId>,
    /// Images of this node are never built
    pub skip_build: bool,
    /// Whether the node's own dependency declarations are followed
    pub follow_dependencies: bool,
}

impl DependencyNode {
    /// Profile used to scope this node's cache
    pub fn cache_profile(&self) -> &str {
        self.profile.as_deref().unwrap_or(DEFAULT_PROFILE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// Dependency graph rooted at the project skiff was invoked on
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
    index: HashMap<PathBuf, NodeId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, or return the id of the node already holding its root
    pub fn insert(&mut self, node: DependencyNode) -> NodeId {
        if let Some(&id) = self.index.get(&node.root) {
            return id;
        }
        let id = self.nodes.len();
        self.index.insert(node.root.clone(), id);
        self.nodes.push(node);
        id
    }

    /// Record that `parent` depends on `child`
    pub fn add_edge(&mut self, parent: NodeId, child: NodeId) {
        let children = &mut self.nodes[parent].children;
        if !children.contains(&child) {
            children.push(child);
        }
    }

    pub fn find(&self, root: &Path) -> Option<NodeId> {
        self.index.get(root).copied()
    }

    pub fn node(&self, id: NodeId) -> &DependencyNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The root is always the first node inserted
    pub fn root(&self) -> NodeId {
        0
    }

    /// Post-order DFS from the root: every node after all of its dependencies.
    ///
    /// A back edge is a cycle. Without `allow_cyclic` it fails with the cycle
    /// path (first occurrence through the revisit); with it, the edge is
    /// ignored. Each node is emitted exactly once.
    pub fn execution_order(&self, allow_cyclic: bool) -> SkiffResult<Vec<NodeId>> {
        let mut order = Vec::with_capacity(self.nodes.len());
        if self.nodes.is_empty() {
            return Ok(order);
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut stack = Vec::new();
        self.visit(self.root(), &mut marks, &mut stack, &mut order, allow_cyclic)?;
        Ok(order)
    }

    fn visit(
        &self,
        id: NodeId,
        marks: &mut [Mark],
        stack: &mut Vec<NodeId>,
        order: &mut Vec<NodeId>,
        allow_cyclic: bool,
    ) -> SkiffResult<()> {
        marks[id] = Mark::Visiting;
        stack.push(id);

        for &child in &self.nodes[id].children {
            match marks[child] {
                Mark::Visited => {}
                Mark::Unvisited => self.visit(child, marks, stack, order, allow_cyclic)?,
                Mark::Visiting => {
                    let start = stack.iter().position(|&n| n == child).unwrap_or(0);
                    let mut cycle: Vec<String> = stack[start..]
                        .iter()
                        .map(|&n| self.nodes[n].root.display().to_string())
                        .collect();
                    cycle.push(self.nodes[child].root.display().to_string());

                    if !allow_cyclic {
                        return Err(SkiffError::CyclicDependency { cycle });
                    }
                    warn!("Ignoring cyclic dependency: {}", cycle.join(" -> "));
                }
            }
        }

        stack.pop();
        marks[id] = Mark::Visited;
        order.push(id);
        Ok(())
    }

    /// Every node that depends on `id`, directly or transitively
    pub fn dependents_of(&self, id: NodeId) -> HashSet<NodeId> {
        let mut parents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (parent, node) in self.nodes.iter().enumerate() {
            for &child in &node.children {
                parents.entry(child).or_default().push(parent);
            }
        }

        let mut seen = HashSet::new();
        let mut queue: VecDeque<NodeId> = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for &parent in parents.get(&current).into_iter().flatten() {
                if parent != id && seen.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        seen
    }

    /// Names along the shortest declaration path from the root to `id`
    pub fn chain_to(&self, id: NodeId) -> Vec<String> {
        if self.nodes.is_empty() {
            return Vec::new();
        }

        let root = self.root();
        let mut previous: HashMap<NodeId, NodeId> = HashMap::new();
        let mut queue = VecDeque::from([root]);
        let mut seen = HashSet::from([root]);

        while let Some(current) = queue.pop_front() {
            if current == id {
                break;
            }
            for &child in &self.nodes[current].children {
                if seen.insert(child) {
                    previous.insert(child, current);
                    queue.push_back(child);
                }
            }
        }

        let mut chain = vec![self.nodes[id].name.clone()];
        let mut current = id;
        while let Some(&prev) = previous.get(&current) {
            chain.push(self.nodes[prev].name.clone());
            current = prev;
        }
        chain.reverse();
        chain
    }
}
