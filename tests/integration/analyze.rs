use predicates::prelude::*;
use serde_json::Value;

use crate::common::TestProject;
use refgraph_cli::test_utils::GraphFixture;

#[test]
fn test_analyze_chain_text() {
    let project = TestProject::new().unwrap();
    let graph = project.write_fixture(&GraphFixture::chain()).unwrap();

    project
        .refgraph()
        .arg("analyze")
        .arg(&graph)
        .assert()
        .success()
        .stdout(predicate::str::contains("No circular dependencies"))
        .stdout(predicate::str::contains("Deployment order: c → b → a"));
}

#[test]
fn test_analyze_chain_json() {
    let project = TestProject::new().unwrap();
    let graph = project.write_fixture(&GraphFixture::chain()).unwrap();

    let output = project
        .refgraph()
        .args(["analyze", "--format", "json"])
        .arg(&graph)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["deploymentOrder"], serde_json::json!(["c", "b", "a"]));
    assert_eq!(report["resources"], 3);
    assert_eq!(report["analysis"]["hasCycles"], false);
}

#[test]
fn test_analyze_cycle_reports_and_recommends() {
    let project = TestProject::new().unwrap();
    let graph = project.write_fixture(&GraphFixture::cycle()).unwrap();

    project
        .refgraph()
        .arg("analyze")
        .arg(&graph)
        .assert()
        .success()
        .stdout(predicate::str::contains("Circular dependency: a → b"))
        .stdout(predicate::str::contains("Recommendations:"))
        .stdout(predicate::str::contains("cannot order: a, b"));
}

#[test]
fn test_analyze_strict_fails_on_cycle() {
    let project = TestProject::new().unwrap();
    let graph = project.write_fixture(&GraphFixture::cycle()).unwrap();

    project
        .refgraph()
        .args(["analyze", "--strict"])
        .arg(&graph)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Circular dependency detected"));
}

#[test]
fn test_analyze_tree() {
    let project = TestProject::new().unwrap();
    let graph = project.write_fixture(&GraphFixture::chain()).unwrap();

    project
        .refgraph()
        .args(["analyze", "--tree", "a"])
        .arg(&graph)
        .assert()
        .success()
        .stdout(predicate::str::contains("└── b"));
}

#[test]
fn test_analyze_unknown_tree_root() {
    let project = TestProject::new().unwrap();
    let graph = project.write_fixture(&GraphFixture::chain()).unwrap();

    project
        .refgraph()
        .args(["analyze", "--tree", "zzz"])
        .arg(&graph)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Resource 'zzz' is not defined in the graph"));
}

#[test]
fn test_analyze_missing_file() {
    let project = TestProject::new().unwrap();

    project
        .refgraph()
        .args(["analyze", "absent.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.yaml"));
}
