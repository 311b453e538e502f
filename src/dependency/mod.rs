//! Dependency graph construction and analysis.
//!
//! Resources are tracked one at a time by the [`DependencyTracker`], which
//! classifies every reference found in a resource's configuration and records
//! it in the [`DependencyGraph`]. Once the graph is complete the
//! [`CycleAnalyzer`] reports circular dependencies and the
//! [`TopologicalOrderer`] computes a deployment order.
//!
//! # Edge direction
//!
//! `dependencies[a]` lists what `a` needs; `dependents[b]` lists who needs `b`.
//! `dependents` is always the exact transpose of the resource-type entries of
//! `dependencies`. Schema dependencies are recorded but never produce
//! dependents, since the input schema is not a deployable node.
//!
//! # Example
//!
//! ```rust
//! use refgraph_cli::dependency::{CycleAnalyzer, DependencyTracker, TopologicalOrderer, TrackingOptions};
//! use refgraph_cli::references::SymbolicReference;
//!
//! let options = TrackingOptions::default();
//! let mut tracker = DependencyTracker::new();
//! tracker.track("app", &[SymbolicReference::new("db", "status.podIP")], &["spec.dbHost".to_string()], &options);
//! tracker.track("db", &[SymbolicReference::new("volume", "status.phase")], &["spec.volume".to_string()], &options);
//!
//! assert!(!CycleAnalyzer::analyze(tracker.graph()).has_cycles);
//! let order = TopologicalOrderer::order(tracker.graph());
//! assert_eq!(order.order, vec!["volume", "db", "app"]);
//! ```

mod cycles;
mod order;
mod tracker;

pub use cycles::{
    CircularDependency, CycleAnalysis, CycleAnalyzer, Recommendation, RecommendationKind, RiskLevel,
};
pub use order::{DeploymentOrder, TopologicalOrderer};
pub use tracker::{
    DependencyTracker, TrackingOptions, affects_readiness, classify_dependency_type,
    is_conditional_path, is_required_field,
};

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt;

use crate::references::{SymbolicReference, TypeTag};

/// What a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    /// The input schema
    Schema,
    /// Another resource in the same graph
    Resource,
    /// Something managed outside the graph
    External,
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyType::Schema => write!(f, "schema"),
            DependencyType::Resource => write!(f, "resource"),
            DependencyType::External => write!(f, "external"),
        }
    }
}

/// One discovered reference, classified, attached to its owning resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyInfo {
    /// The reference itself
    pub reference: SymbolicReference,
    /// Where the reference sits in the owning configuration
    pub field_path: String,
    pub dependency_type: DependencyType,
    /// Whether deployment must wait for this value
    pub required: bool,
    /// Declared type of the referenced field, `unknown` when not declared
    pub expected_type: TypeTag,
    /// Whether the value participates in readiness evaluation
    pub affects_readiness: bool,
    /// Whether the owning field is conditional
    pub conditional: bool,
}

impl DependencyInfo {
    /// Whether two infos describe the same reference at the same location.
    pub fn same_site(&self, other: &DependencyInfo) -> bool {
        self.reference == other.reference && self.field_path == other.field_path
    }
}

/// Directed graph of "resource A needs a value from resource B".
///
/// Maps iterate in tracking order, so every derived output is deterministic.
/// `circular_chains` and `deployment_order` are derived; refresh them with
/// [`DependencyGraph::refresh_derived`] after tracking changes.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraph {
    dependencies: IndexMap<String, Vec<DependencyInfo>>,
    dependents: IndexMap<String, Vec<String>>,
    circular_chains: Vec<Vec<String>>,
    deployment_order: Vec<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if it doesn't already exist.
    pub fn ensure_node(&mut self, resource_id: &str) {
        if !self.dependencies.contains_key(resource_id) {
            self.dependencies.insert(resource_id.to_string(), Vec::new());
        }
    }

    /// Record dependencies of `resource_id`, skipping ones already recorded at the
    /// same site. Returns the newly recorded entries.
    ///
    /// Resource-type targets become nodes themselves so ordering sees them even
    /// before they are tracked.
    pub fn add_dependencies(
        &mut self,
        resource_id: &str,
        infos: Vec<DependencyInfo>,
    ) -> Vec<DependencyInfo> {
        self.ensure_node(resource_id);
        let mut added = Vec::new();
        for info in infos {
            let exists = self
                .dependencies
                .get(resource_id)
                .is_some_and(|existing| existing.iter().any(|e| e.same_site(&info)));
            if exists {
                continue;
            }

            if info.dependency_type == DependencyType::Resource {
                let target = info.reference.resource_id.clone();
                self.ensure_node(&target);
                let dependents = self.dependents.entry(target).or_default();
                if !dependents.iter().any(|d| d == resource_id) {
                    dependents.push(resource_id.to_string());
                }
            }
            if let Some(existing) = self.dependencies.get_mut(resource_id) {
                existing.push(info.clone());
            }
            added.push(info);
        }
        added
    }

    /// Every node, in tracking order.
    pub fn resource_ids(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    pub fn contains(&self, resource_id: &str) -> bool {
        self.dependencies.contains_key(resource_id)
    }

    /// The full dependency map.
    pub fn dependencies(&self) -> &IndexMap<String, Vec<DependencyInfo>> {
        &self.dependencies
    }

    /// The full dependents map.
    pub fn dependents(&self) -> &IndexMap<String, Vec<String>> {
        &self.dependents
    }

    /// Direct dependencies of one resource.
    pub fn dependencies_of(&self, resource_id: &str) -> &[DependencyInfo] {
        self.dependencies.get(resource_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Resources that directly need `resource_id`.
    pub fn dependents_of(&self, resource_id: &str) -> &[String] {
        self.dependents.get(resource_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Distinct resource-type targets of `resource_id`, in discovery order.
    pub fn resource_targets(&self, resource_id: &str) -> Vec<&str> {
        let mut targets: Vec<&str> = Vec::new();
        for info in self.dependencies_of(resource_id) {
            if info.dependency_type == DependencyType::Resource
                && !targets.contains(&info.reference.resource_id.as_str())
            {
                targets.push(&info.reference.resource_id);
            }
        }
        targets
    }

    /// All resources `resource_id` depends on, directly or indirectly, in
    /// breadth-first order.
    pub fn transitive_dependencies(&self, resource_id: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::from([resource_id]);

        while let Some(current) = queue.pop_front() {
            for target in self.resource_targets(current) {
                if seen.insert(target) {
                    result.push(target.to_string());
                    queue.push_back(target);
                }
            }
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Number of distinct resource-to-resource edges.
    pub fn edge_count(&self) -> usize {
        self.dependents.values().map(Vec::len).sum()
    }

    /// Chains found by the last [`refresh_derived`](Self::refresh_derived).
    pub fn circular_chains(&self) -> &[Vec<String>] {
        &self.circular_chains
    }

    /// Order computed by the last [`refresh_derived`](Self::refresh_derived).
    pub fn deployment_order(&self) -> &[String] {
        &self.deployment_order
    }

    /// Recompute `circular_chains`.
    pub fn refresh_cycles(&mut self) {
        self.circular_chains = CycleAnalyzer::detect_basic(self);
    }

    /// Recompute `deployment_order`. Incomplete when the graph is cyclic.
    pub fn refresh_order(&mut self) {
        self.deployment_order = TopologicalOrderer::order(self).order;
    }

    /// Recompute both derived fields.
    pub fn refresh_derived(&mut self) {
        self.refresh_cycles();
        self.refresh_order();
    }

    /// Whether `dependents` is exactly the transpose of the resource-type
    /// entries of `dependencies`.
    pub fn is_consistent(&self) -> bool {
        let mut forward = HashSet::new();
        for id in self.resource_ids() {
            for target in self.resource_targets(id) {
                forward.insert((id, target));
            }
        }
        let mut backward = HashSet::new();
        for (target, dependents) in &self.dependents {
            for dependent in dependents {
                if !backward.insert((dependent.as_str(), target.as_str())) {
                    return false;
                }
            }
        }
        forward == backward
    }

    /// Build a human-readable dependency tree rooted at `root`.
    pub fn to_tree_string(&self, root: &str) -> String {
        let mut result = String::new();
        let mut visited = HashSet::new();
        self.build_tree_string(root, &mut result, "", true, &mut visited);
        result
    }

    fn build_tree_string<'g>(
        &'g self,
        node: &'g str,
        result: &mut String,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<&'g str>,
    ) {
        let connector = if is_last {
            "└── "
        } else {
            "├── "
        };
        result.push_str(&format!("{prefix}{connector}{node}\n"));

        let child_prefix = if is_last {
            format!("{prefix}    ")
        } else {
            format!("{prefix}│   ")
        };
        if !visited.insert(node) {
            result.push_str(&format!("{child_prefix}└── (circular reference)\n"));
            return;
        }

        let deps = self.resource_targets(node);
        for (i, dep) in deps.iter().enumerate() {
            let is_last_child = i == deps.len() - 1;
            self.build_tree_string(*dep, result, &child_prefix, is_last_child, visited);
        }
        visited.remove(node);
    }
}
