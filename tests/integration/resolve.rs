use predicates::prelude::*;
use serde_json::{Value, json};

use crate::common::TestProject;
use refgraph_cli::test_utils::GraphFixture;

const LIVE_GRAPH: &str = r#"
resources:
  app:
    kind: Deployment
    config:
      spec:
        dbHost: { $ref: database.status.podIP }
"#;

#[test]
fn test_resolve_from_deployed_records() {
    let project = TestProject::new().unwrap();
    let graph = project.write_fixture(&GraphFixture::web()).unwrap();

    let output = project.refgraph().arg("resolve").arg(&graph).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let resolved: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(resolved["svc"], json!({"metadata": {"name": "shop"}}));
    assert_eq!(resolved["ingress"]["spec"]["address"], json!("1.2.3.4"));
    assert_eq!(resolved["ingress"]["spec"]["backend"], json!("http://10.0.0.1"));
}

#[test]
fn test_resolve_single_resource() {
    let project = TestProject::new().unwrap();
    let graph = project.write_fixture(&GraphFixture::web()).unwrap();

    let output = project
        .refgraph()
        .args(["resolve", "--resource", "ingress"])
        .arg(&graph)
        .output()
        .unwrap();
    assert!(output.status.success());

    let resolved: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(resolved["spec"]["address"], json!("1.2.3.4"));
}

#[test]
fn test_resolve_from_live_snapshot() {
    let project = TestProject::new().unwrap();
    let graph = project.write_file("graph.yaml", LIVE_GRAPH).unwrap();
    let live = project
        .write_file("live.json", r#"{"database": {"status": {"podIP": "10.0.0.7"}}}"#)
        .unwrap();

    project
        .refgraph()
        .arg("resolve")
        .arg(&graph)
        .arg("--live")
        .arg(&live)
        .arg("--stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dbHost\": \"10.0.0.7\""))
        .stderr(predicate::str::contains("1 live fetch(es)"));
}

#[test]
fn test_resolve_without_live_object_fails() {
    let project = TestProject::new().unwrap();
    let graph = project.write_file("graph.yaml", LIVE_GRAPH).unwrap();

    project
        .refgraph()
        .arg("resolve")
        .arg(&graph)
        .assert()
        .failure()
        .stderr(predicate::str::contains("database"));
}

#[test]
fn test_resolve_unknown_resource() {
    let project = TestProject::new().unwrap();
    let graph = project.write_fixture(&GraphFixture::web()).unwrap();

    project
        .refgraph()
        .args(["resolve", "--resource", "missing"])
        .arg(&graph)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));
}
