//! Tracking, cycle analysis and ordering over whole graphs.

use anyhow::Result;
use refgraph_cli::dependency::{
    CycleAnalyzer, DependencyTracker, DependencyType, RiskLevel, TopologicalOrderer,
    TrackingOptions,
};
use refgraph_cli::manifest::GraphManifest;
use refgraph_cli::references::ConfigValue;
use refgraph_cli::test_utils::{GraphFixture, init_test_logging};
use serde_json::json;

fn config(value: serde_json::Value) -> ConfigValue {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_chain_deploys_leaves_first() -> Result<()> {
    init_test_logging(None);
    let manifest = GraphManifest::parse(&GraphFixture::chain().content, false).unwrap();
    let tracker = manifest.track(&TrackingOptions::default())?;

    let order = TopologicalOrderer::order(tracker.graph());
    assert!(order.is_complete());
    assert_eq!(order.order, vec!["c", "b", "a"]);
    assert_eq!(tracker.graph().deployment_order(), &["c", "b", "a"]);
    assert!(tracker.graph().circular_chains().is_empty());
    Ok(())
}

#[test]
fn test_mutual_references_form_medium_risk_cycle() -> Result<()> {
    let manifest = GraphManifest::parse(&GraphFixture::cycle().content, false).unwrap();
    let tracker = manifest.track(&TrackingOptions::default())?;

    let analysis = CycleAnalyzer::analyze(tracker.graph());
    assert!(analysis.has_cycles);
    assert_eq!(analysis.cycles.len(), 1);

    let cycle = &analysis.cycles[0];
    let mut members = cycle.members.clone();
    members.sort();
    assert_eq!(members, vec!["a", "b"]);
    assert!(cycle.risk_level >= RiskLevel::Medium);
    assert!(!analysis.recommendations.is_empty());

    let order = TopologicalOrderer::order(tracker.graph());
    assert!(!order.is_complete());
    assert!(order.into_result().is_err());
    Ok(())
}

#[test]
fn test_schema_references_never_order_resources() -> Result<()> {
    let mut tracker = DependencyTracker::new();
    let options = TrackingOptions::default();
    tracker.track_resource(
        "app",
        &config(json!({"metadata": {"name": {"$ref": "schema.spec.name"}}})),
        &options,
    )?;

    let deps = tracker.dependencies_of("app");
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].dependency_type, DependencyType::Schema);

    tracker.graph_mut().refresh_derived();
    assert_eq!(tracker.graph().deployment_order(), &["app"]);
    Ok(())
}

#[test]
fn test_transpose_stays_consistent() -> Result<()> {
    let manifest = GraphManifest::parse(&GraphFixture::web().content, false).unwrap();
    let tracker = manifest.track(&TrackingOptions::default())?;
    let graph = tracker.graph();

    assert!(graph.is_consistent());
    assert_eq!(graph.dependents_of("svc"), &["ingress"]);
    assert!(graph.transitive_dependencies("ingress").contains(&"svc".to_string()));
    Ok(())
}

#[test]
fn test_expression_references_become_dependencies() -> Result<()> {
    let mut tracker = DependencyTracker::new();
    tracker.track_resource(
        "ingress",
        &config(json!({"spec": {"url": {"$cel": "concat('http://', svc.status.clusterIP)"}}})),
        &TrackingOptions::default(),
    )?;

    let deps = tracker.dependencies_of("ingress");
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].reference.resource_id, "svc");
    assert_eq!(deps[0].reference.field_path, "status.clusterIP");
    assert_eq!(deps[0].field_path, "spec.url");
    Ok(())
}
