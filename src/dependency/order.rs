//! Deployment ordering with Kahn's algorithm.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::VecDeque;

use super::DependencyGraph;
use crate::core::RefgraphError;

/// Result of ordering a dependency graph.
///
/// When the graph is cyclic `order` is incomplete and `unordered` holds every
/// node that never reached zero in-degree. An incomplete order is not a valid
/// deployment plan; use [`DeploymentOrder::into_result`] to enforce that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOrder {
    /// Dependencies before dependents
    pub order: Vec<String>,
    /// Nodes in or behind a cycle, in tracking order
    pub unordered: Vec<String>,
}

impl DeploymentOrder {
    pub fn is_complete(&self) -> bool {
        self.unordered.is_empty()
    }

    /// The order, or an error naming the nodes that could not be placed.
    pub fn into_result(self) -> Result<Vec<String>, RefgraphError> {
        if self.is_complete() {
            Ok(self.order)
        } else {
            Err(RefgraphError::CircularDependency {
                chain: self.unordered.join(" → "),
            })
        }
    }
}

/// Computes a deployment order over resource-type edges.
pub struct TopologicalOrderer;

impl TopologicalOrderer {
    /// Order every node so each appears after all of its resource dependencies.
    ///
    /// Schema and external dependencies do not constrain the order. Ties are
    /// broken by tracking order.
    pub fn order(graph: &DependencyGraph) -> DeploymentOrder {
        let mut in_degree: IndexMap<&str, usize> = graph
            .resource_ids()
            .map(|id| (id, graph.resource_targets(id).len()))
            .collect();

        let mut queue: VecDeque<&str> =
            in_degree.iter().filter(|(_, degree)| **degree == 0).map(|(id, _)| *id).collect();
        let mut order = Vec::with_capacity(in_degree.len());

        while let Some(id) = queue.pop_front() {
            order.push(id.to_string());
            for dependent in graph.dependents_of(id) {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(dependent.as_str());
                    }
                }
            }
        }

        let unordered: Vec<String> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(id, _)| id.to_string())
            .collect();
        if !unordered.is_empty() {
            tracing::warn!(
                "Deployment order is incomplete; {} resource(s) are in or behind a cycle: {}",
                unordered.len(),
                unordered.join(", ")
            );
        }

        DeploymentOrder {
            order,
            unordered,
        }
    }
}
