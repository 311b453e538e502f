use predicates::prelude::*;

use crate::common::TestProject;

#[test]
fn test_eval_with_vars() {
    let project = TestProject::new().unwrap();
    let vars = project.write_file("vars.yaml", "svc:\n  status:\n    clusterIP: 10.0.0.1\n").unwrap();

    project
        .refgraph()
        .args(["eval", r#"concat("http://", svc.status.clusterIP)"#, "--vars"])
        .arg(&vars)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"http://10.0.0.1\""));
}

#[test]
fn test_eval_literal_arithmetic() {
    let project = TestProject::new().unwrap();

    project
        .refgraph()
        .args(["eval", "1 + 2 * 3"])
        .assert()
        .success()
        .stdout(predicate::str::diff("7\n"));
}

#[test]
fn test_eval_check_reports_syntax_error() {
    let project = TestProject::new().unwrap();

    project.refgraph().args(["eval", "--check", "size(x) >"]).assert().failure();
    project
        .refgraph()
        .args(["eval", "--check", "size(x) > 1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Expression is valid"));
}

#[test]
fn test_eval_lists_references() {
    let project = TestProject::new().unwrap();

    project
        .refgraph()
        .args(["eval", "--references", "db.status.podIP + ':' + string(schema.spec.port)"])
        .assert()
        .success()
        .stdout(predicate::str::contains("db.status.podIP"))
        .stdout(predicate::str::contains("spec.port"));
}

#[test]
fn test_eval_unbound_variable_fails() {
    let project = TestProject::new().unwrap();

    project
        .refgraph()
        .args(["eval", "svc.status.clusterIP"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("svc"));
}
