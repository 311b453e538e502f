use predicates::prelude::*;
use serde_json::Value;

use crate::common::TestProject;
use refgraph_cli::test_utils::GraphFixture;

#[test]
fn test_validate_valid_graph() {
    let project = TestProject::new().unwrap();
    let graph = project.write_fixture(&GraphFixture::web()).unwrap();

    project
        .refgraph()
        .arg("validate")
        .arg(&graph)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 resource(s) validated"));
}

#[test]
fn test_validate_reports_typos_and_bad_expressions() {
    let project = TestProject::new().unwrap();
    let graph = project.write_fixture(&GraphFixture::invalid()).unwrap();

    project
        .refgraph()
        .arg("validate")
        .arg(&graph)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Did you mean 'web'?"))
        .stdout(predicate::str::contains("invalid expression"))
        .stderr(predicate::str::contains("2 invalid reference(s) found"));
}

#[test]
fn test_validate_json_output() {
    let project = TestProject::new().unwrap();
    let graph = project.write_fixture(&GraphFixture::invalid()).unwrap();

    let output = project
        .refgraph()
        .args(["validate", "--format", "json"])
        .arg(&graph)
        .output()
        .unwrap();
    assert!(!output.status.success());

    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["valid"], false);
    assert_eq!(summary["errors"], 2);
    assert_eq!(summary["resources"]["app"]["isValid"], false);
}

#[test]
fn test_validate_strict_fails_on_warnings() {
    let project = TestProject::new().unwrap();
    let graph = project
        .write_file("static.yaml", "resources:\n  web:\n    kind: Deployment\n    config:\n      spec: { replicas: 1 }\n")
        .unwrap();

    project.refgraph().arg("validate").arg(&graph).assert().success();
    project
        .refgraph()
        .args(["validate", "--strict"])
        .arg(&graph)
        .assert()
        .failure()
        .stdout(predicate::str::contains("contains no references"));
}

#[test]
fn test_validate_strict_from_config() {
    let project = TestProject::new().unwrap();
    let graph = project
        .write_file("static.yaml", "resources:\n  web:\n    kind: Deployment\n    config:\n      spec: { replicas: 1 }\n")
        .unwrap();
    project.write_file("config.toml", "[validation]\nstrict = true\n").unwrap();

    project.refgraph().arg("validate").arg(&graph).assert().failure();
}
