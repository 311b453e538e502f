//! `refgraph analyze`: dependency, cycle and ordering report.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::PathBuf;

use super::OutputFormat;
use crate::config::RefgraphConfig;
use crate::core::RefgraphError;
use crate::dependency::{
    CycleAnalysis, CycleAnalyzer, DependencyGraph, DependencyInfo, DependencyType,
    TopologicalOrderer,
};
use crate::manifest::GraphManifest;

/// Analyze the dependencies of a resource graph.
#[derive(Args, Debug)]
pub struct AnalyzeCommand {
    /// Resource-graph file (YAML or JSON)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Fail when a circular dependency is found
    #[arg(long)]
    pub strict: bool,

    /// Treat only the graph's own resource ids as resources
    #[arg(long)]
    pub registry: bool,

    /// Print the dependency tree rooted at this resource
    #[arg(long, value_name = "ID")]
    pub tree: Option<String>,
}

/// Machine-readable analysis result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport<'g> {
    pub resources: usize,
    pub edges: usize,
    pub dependencies: &'g IndexMap<String, Vec<DependencyInfo>>,
    pub dependents: &'g IndexMap<String, Vec<String>>,
    pub circular_chains: &'g [Vec<String>],
    pub analysis: CycleAnalysis,
    pub deployment_order: Vec<String>,
    pub unordered: Vec<String>,
}

impl AnalyzeCommand {
    pub async fn execute(self, config: &RefgraphConfig) -> Result<()> {
        let manifest = GraphManifest::load(&self.file).await?;
        let mut options = config.tracking_options();
        if self.registry {
            options.known_resources = Some(manifest.resource_ids().map(str::to_string).collect());
        }

        let tracker = manifest.track(&options)?;
        let graph = tracker.graph();
        if let Some(root) = &self.tree {
            manifest.resource(root)?;
        }

        let analysis = CycleAnalyzer::analyze(graph);
        let order = TopologicalOrderer::order(graph);
        let has_cycles = analysis.has_cycles;
        let first_cycle = analysis.cycles.first().map(|c| c.members.join(" → "));

        match self.format {
            OutputFormat::Json => {
                let report = AnalysisReport {
                    resources: graph.node_count(),
                    edges: graph.edge_count(),
                    dependencies: graph.dependencies(),
                    dependents: graph.dependents(),
                    circular_chains: graph.circular_chains(),
                    analysis,
                    deployment_order: order.order,
                    unordered: order.unordered,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            OutputFormat::Text => {
                print_dependencies(graph);
                if let Some(root) = &self.tree {
                    println!("\n{}", "Dependency tree:".bold());
                    print!("{}", graph.to_tree_string(root));
                }
                print_cycles(&analysis);
                if order.is_complete() {
                    println!("\n{} {}", "Deployment order:".bold(), order.order.join(" → "));
                } else {
                    println!(
                        "\n{} {} (cannot order: {})",
                        "Deployment order:".bold(),
                        order.order.join(" → "),
                        order.unordered.join(", ").red()
                    );
                }
            }
        }

        if self.strict && has_cycles {
            return Err(RefgraphError::CircularDependency {
                chain: first_cycle.unwrap_or_default(),
            }
            .into());
        }
        Ok(())
    }
}

fn print_dependencies(graph: &DependencyGraph) {
    println!(
        "{} {} resource(s), {} edge(s)",
        "Graph:".bold(),
        graph.node_count(),
        graph.edge_count()
    );
    for (id, infos) in graph.dependencies() {
        if infos.is_empty() {
            continue;
        }
        println!("  {}", id.cyan());
        for info in infos {
            let mut flags = vec![if info.required {
                "required"
            } else {
                "optional"
            }];
            if info.affects_readiness {
                flags.push("readiness");
            }
            if info.conditional {
                flags.push("conditional");
            }
            let target = match info.dependency_type {
                DependencyType::Resource => info.reference.to_string().normal(),
                DependencyType::Schema => info.reference.to_string().dimmed(),
                DependencyType::External => info.reference.to_string().yellow(),
            };
            println!(
                "    {} ← {} ({}, {})",
                if info.field_path.is_empty() {
                    "<root>"
                } else {
                    info.field_path.as_str()
                },
                target,
                info.dependency_type,
                flags.join(", ")
            );
        }
    }
}

fn print_cycles(analysis: &CycleAnalysis) {
    if !analysis.has_cycles {
        println!("\n{} No circular dependencies", "✓".green());
        return;
    }

    for cycle in &analysis.cycles {
        println!(
            "\n{} Circular dependency: {} (severity {:.2}, {} risk)",
            "✗".red(),
            cycle.members.join(" → "),
            cycle.severity,
            cycle.risk_level
        );
        if !cycle.break_points.is_empty() {
            println!("    break points: {}", cycle.break_points.join(", "));
        }
        println!("    affected fields: {}", cycle.affected_fields.join(", "));
    }

    println!("\n{}", "Recommendations:".bold());
    for (i, recommendation) in analysis.recommendations.iter().enumerate() {
        println!("  {}. [{}] {}", i + 1, recommendation.risk_level, recommendation.message);
    }
}
