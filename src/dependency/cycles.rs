//! Circular dependency detection and analysis.
//!
//! Two levels are provided. [`CycleAnalyzer::detect_basic`] walks the graph
//! depth-first and reports one chain per back edge, which is what the graph's
//! `circular_chains` field holds. [`CycleAnalyzer::analyze`] runs Tarjan's
//! strongly-connected-components algorithm, so overlapping cycles that share
//! nodes are reported as one component, and scores each component.
//!
//! Detecting a cycle is never an error here; the caller decides whether a cycle
//! is fatal.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;

use super::{DependencyGraph, DependencyInfo, DependencyType};
use crate::constants::{
    HIGH_RISK_CHAIN_LENGTH, HIGH_RISK_SEVERITY, LONG_CHAIN_LENGTH, LOW_RISK_CHAIN_LENGTH,
    LOW_RISK_SEVERITY,
};

/// Advisory risk of a circular dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// One strongly connected component with more than one member.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircularDependency {
    /// Member ids in tracking order
    pub members: Vec<String>,
    /// Score in `[0, 1]`
    pub severity: f64,
    /// Members with an optional or conditional dependency inside the component
    pub break_points: Vec<String>,
    /// `resourceId.fieldPath` values whose resolution would deadlock
    pub affected_fields: Vec<String>,
    pub risk_level: RiskLevel,
    /// Distinct member-to-member edges
    pub edge_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecommendationKind {
    /// Decouple at an optional or conditional dependency
    BreakAtOptionalEdge,
    /// Restructure the resources involved
    Refactor,
    /// Move the shared value into externally configured input
    ExtractSharedState,
}

/// Human-readable advice for one circular dependency.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub risk_level: RiskLevel,
    pub severity: f64,
    pub members: Vec<String>,
    pub message: String,
}

/// Result of exhaustive cycle analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleAnalysis {
    pub cycles: Vec<CircularDependency>,
    /// Ranked by risk, then severity
    pub recommendations: Vec<Recommendation>,
    pub has_cycles: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Cycle detection over a [`DependencyGraph`]. Only resource-type edges count.
pub struct CycleAnalyzer;

impl CycleAnalyzer {
    /// Report one chain per back edge found by a depth-first walk.
    ///
    /// Each chain runs from the repeated id back to itself, so `a → b → a` is
    /// reported as `["a", "b", "a"]`. A self-reference is `["a", "a"]`.
    pub fn detect_basic(graph: &DependencyGraph) -> Vec<Vec<String>> {
        let mut colors: HashMap<&str, Color> =
            graph.resource_ids().map(|id| (id, Color::White)).collect();
        let mut path = Vec::new();
        let mut chains = Vec::new();

        for id in graph.resource_ids() {
            if colors.get(id) == Some(&Color::White) {
                Self::dfs_visit(graph, id, &mut colors, &mut path, &mut chains);
            }
        }
        chains
    }

    fn dfs_visit<'g>(
        graph: &'g DependencyGraph,
        node: &'g str,
        colors: &mut HashMap<&'g str, Color>,
        path: &mut Vec<&'g str>,
        chains: &mut Vec<Vec<String>>,
    ) {
        colors.insert(node, Color::Gray);
        path.push(node);

        for neighbor in graph.resource_targets(node) {
            match colors.get(neighbor).copied().unwrap_or(Color::White) {
                Color::Gray => {
                    if let Some(start) = path.iter().position(|n| *n == neighbor) {
                        let mut chain: Vec<String> =
                            path[start..].iter().map(|n| n.to_string()).collect();
                        chain.push(neighbor.to_string());
                        chains.push(chain);
                    }
                }
                Color::White => Self::dfs_visit(graph, neighbor, colors, path, chains),
                Color::Black => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
    }

    /// Find every multi-member strongly connected component and score it.
    pub fn analyze(graph: &DependencyGraph) -> CycleAnalysis {
        let mut petgraph: DiGraph<&str, ()> = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
        for id in graph.resource_ids() {
            indices.insert(id, petgraph.add_node(id));
        }
        for id in graph.resource_ids() {
            for target in graph.resource_targets(id) {
                if let (Some(&from), Some(&to)) = (indices.get(id), indices.get(target)) {
                    petgraph.add_edge(from, to, ());
                }
            }
        }

        let mut components: Vec<Vec<NodeIndex>> = tarjan_scc(&petgraph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .collect();
        for component in &mut components {
            component.sort();
        }
        components.sort_by_key(|component| component.first().copied());

        let cycles: Vec<CircularDependency> = components
            .iter()
            .map(|component| {
                let members: Vec<&str> = component.iter().map(|&ix| petgraph[ix]).collect();
                Self::describe(graph, &members)
            })
            .collect();

        for cycle in &cycles {
            tracing::warn!(
                "Circular dependency between {} (severity {:.2}, {} risk)",
                cycle.members.join(", "),
                cycle.severity,
                cycle.risk_level
            );
        }

        let recommendations = Self::recommend(&cycles);
        CycleAnalysis {
            has_cycles: !cycles.is_empty(),
            cycles,
            recommendations,
        }
    }

    /// Risk of a component with the given severity and member count.
    pub fn risk_level(severity: f64, length: usize) -> RiskLevel {
        if severity > HIGH_RISK_SEVERITY || length > HIGH_RISK_CHAIN_LENGTH {
            RiskLevel::High
        } else if severity < LOW_RISK_SEVERITY && length <= LOW_RISK_CHAIN_LENGTH {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        }
    }

    fn describe(graph: &DependencyGraph, members: &[&str]) -> CircularDependency {
        let inside = |info: &DependencyInfo| {
            info.dependency_type == DependencyType::Resource
                && members.contains(&info.reference.resource_id.as_str())
        };

        let mut internal = 0usize;
        let mut required = 0usize;
        let mut readiness = 0usize;
        let mut edge_count = 0usize;
        let mut break_points = Vec::new();
        let mut affected_fields: Vec<String> = Vec::new();

        for &member in members {
            let mut breakable = false;
            for info in graph.dependencies_of(member).iter().filter(|info| inside(*info)) {
                internal += 1;
                if info.required {
                    required += 1;
                }
                if info.affects_readiness {
                    readiness += 1;
                }
                if !info.required || info.conditional {
                    breakable = true;
                }
                let field = info.reference.cache_key();
                if !affected_fields.contains(&field) {
                    affected_fields.push(field);
                }
            }
            edge_count += graph
                .resource_targets(member)
                .iter()
                .filter(|target| members.contains(target))
                .count();
            if breakable {
                break_points.push(member.to_string());
            }
        }

        let n = members.len();
        let fraction = |count: usize| {
            if internal == 0 {
                0.0
            } else {
                count as f64 / internal as f64
            }
        };
        let density = if n > 1 {
            edge_count as f64 / (n * (n - 1)) as f64
        } else {
            0.0
        };
        let severity =
            (0.5 * fraction(required) + 0.3 * fraction(readiness) + 0.2 * density).clamp(0.0, 1.0);

        CircularDependency {
            members: members.iter().map(|m| m.to_string()).collect(),
            severity,
            break_points,
            affected_fields,
            risk_level: Self::risk_level(severity, n),
            edge_count,
        }
    }

    fn recommend(cycles: &[CircularDependency]) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();
        for cycle in cycles {
            let chain = cycle.members.join(" → ");
            let base = |kind: RecommendationKind, message: String| Recommendation {
                kind,
                risk_level: cycle.risk_level,
                severity: cycle.severity,
                members: cycle.members.clone(),
                message,
            };

            if !cycle.break_points.is_empty() {
                recommendations.push(base(
                    RecommendationKind::BreakAtOptionalEdge,
                    format!(
                        "Break the cycle {chain} at an optional or conditional dependency of {}",
                        cycle.break_points.join(", ")
                    ),
                ));
            }
            if cycle.risk_level == RiskLevel::High || cycle.break_points.is_empty() {
                recommendations.push(base(
                    RecommendationKind::Refactor,
                    format!(
                        "Refactor {chain}: every dependency in the cycle is required, so none of these resources can become ready first"
                    ),
                ));
            }
            if cycle.members.len() > LONG_CHAIN_LENGTH {
                recommendations.push(base(
                    RecommendationKind::ExtractSharedState,
                    format!(
                        "Extract the values shared across {chain} into externally configured input"
                    ),
                ));
            }
        }

        recommendations.sort_by(|a, b| {
            Reverse(a.risk_level)
                .cmp(&Reverse(b.risk_level))
                .then(b.severity.total_cmp(&a.severity))
        });
        recommendations
    }
}
