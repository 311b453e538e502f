//! Property-based checks of ordering and cycle analysis.

use proptest::prelude::*;
use refgraph_cli::dependency::{
    CycleAnalyzer, DependencyGraph, DependencyTracker, TopologicalOrderer, TrackingOptions,
};
use refgraph_cli::references::SymbolicReference;

fn id(i: usize) -> String {
    format!("r{i}")
}

/// Build a graph of `n` nodes from `(from, to)` edges, skipping self-loops.
fn build(n: usize, edges: &[(usize, usize)]) -> DependencyGraph {
    let options = TrackingOptions::default();
    let mut tracker = DependencyTracker::new();
    for node in 0..n {
        let targets: Vec<usize> = edges
            .iter()
            .filter(|(from, to)| *from == node && from != to)
            .map(|(_, to)| *to)
            .collect();
        let references: Vec<SymbolicReference> =
            targets.iter().map(|t| SymbolicReference::new(id(*t), "status.ip")).collect();
        let fields: Vec<String> = targets.iter().map(|t| format!("spec.dep{t}")).collect();
        tracker.track(&id(node), &references, &fields, &options);
    }
    tracker.into_graph()
}

fn position(order: &[String], node: &str) -> Option<usize> {
    order.iter().position(|n| n == node)
}

fn edges(max_nodes: usize) -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (1..max_nodes).prop_flat_map(|n| (Just(n), prop::collection::vec((0..n, 0..n), 0..n * 2)))
}

proptest! {
    #[test]
    fn acyclic_graphs_order_completely((n, raw) in edges(12)) {
        // Point every edge from the higher index to the lower one.
        let dag: Vec<(usize, usize)> = raw
            .into_iter()
            .filter(|(a, b)| a != b)
            .map(|(a, b)| (a.max(b), a.min(b)))
            .collect();
        let graph = build(n, &dag);

        let order = TopologicalOrderer::order(&graph);
        prop_assert!(order.is_complete());
        prop_assert_eq!(order.order.len(), n);
        for (from, to) in &dag {
            let dependency = position(&order.order, &id(*to));
            let dependent = position(&order.order, &id(*from));
            prop_assert!(dependency < dependent);
        }
        prop_assert!(!CycleAnalyzer::analyze(&graph).has_cycles);
    }

    #[test]
    fn order_and_cycles_partition_nodes((n, raw) in edges(10)) {
        let graph = build(n, &raw);
        let order = TopologicalOrderer::order(&graph);
        let analysis = CycleAnalyzer::analyze(&graph);

        prop_assert_eq!(order.order.len() + order.unordered.len(), n);
        prop_assert_eq!(analysis.has_cycles, !order.is_complete());

        // Every ordered node follows all of its dependencies.
        for (index, node) in order.order.iter().enumerate() {
            for target in graph.resource_targets(node) {
                let target_index = position(&order.order, target);
                prop_assert!(target_index.is_some_and(|t| t < index));
            }
        }

        // Cycle members can never be ordered.
        for cycle in &analysis.cycles {
            for member in &cycle.members {
                prop_assert!(order.unordered.contains(member));
            }
        }
    }

    #[test]
    fn basic_chains_close_on_themselves((n, raw) in edges(8)) {
        let graph = build(n, &raw);
        for chain in CycleAnalyzer::detect_basic(&graph) {
            prop_assert!(chain.len() >= 2);
            prop_assert_eq!(chain.first(), chain.last());
        }
    }
}
