//! Builder output evaluated by the expression engine.

use refgraph_cli::expression::{CelBuilders, EvalContext, ExprPart, evaluate, parse};
use refgraph_cli::references::SymbolicReference;
use serde_json::json;

fn context() -> EvalContext {
    EvalContext::new().with_variable(
        "svc",
        json!({
            "metadata": {"name": "shop"},
            "spec": {"ports": [{"port": 80}, {"port": 443}]},
            "status": {"clusterIP": "10.0.0.1", "ready": true}
        }),
    )
}

#[test]
fn test_concat_builder_matches_hand_written() {
    let ip = SymbolicReference::new("svc", "status.clusterIP");
    let built = CelBuilders::concat([ExprPart::from("http://"), ExprPart::from(&ip)]);

    let ctx = context();
    let from_builder = evaluate(&built.expression, &ctx).unwrap();
    let hand_written = evaluate(r#"concat("http://", svc.status.clusterIP)"#, &ctx).unwrap();
    assert_eq!(from_builder, hand_written);
    assert_eq!(from_builder, json!("http://10.0.0.1"));
}

#[test]
fn test_builder_references_are_discoverable() {
    let ip = SymbolicReference::new("svc", "status.clusterIP");
    let built = CelBuilders::concat([ExprPart::from("http://"), ExprPart::from(&ip)]);

    let references = parse(&built.expression).unwrap().references();
    assert!(references.contains(&ip));
}

#[test]
fn test_quoting_survives_special_characters() {
    let built = CelBuilders::concat([ExprPart::from(r#"say "hi" \ "#), ExprPart::from("done")]);
    let value = evaluate(&built.expression, &EvalContext::new()).unwrap();
    assert_eq!(value, json!(r#"say "hi" \ done"#));
}

#[test]
fn test_conditional_builder() {
    let ready = SymbolicReference::new("svc", "status.ready");
    let built = CelBuilders::conditional(&ready, "up", "down");
    assert_eq!(evaluate(&built.expression, &context()).unwrap(), json!("up"));
}

#[test]
fn test_has_builder_on_missing_field() {
    let missing = SymbolicReference::new("svc", "status.podIP");
    let built = CelBuilders::has(&missing);
    assert_eq!(evaluate(&built.expression, &context()).unwrap(), json!(false));
}

#[test]
fn test_size_builder() {
    let ports = SymbolicReference::new("svc", "spec.ports");
    let built = CelBuilders::size(&ports);
    assert_eq!(evaluate(&built.expression, &context()).unwrap(), json!(2));
}

#[test]
fn test_builders_with_hyphenated_resource_id() {
    let ready = SymbolicReference::new("web-db", "status.ready");
    let host = SymbolicReference::new("web-db", "status.podIP");
    let ctx = EvalContext::new().with_variable(
        "web-db",
        json!({"status": {"ready": true, "podIP": "10.1.1.1"}}),
    );

    let has = CelBuilders::has(&ready);
    assert_eq!(has.expression, "has(`web-db`.status.ready)");
    let compiled = parse(&has.expression).unwrap();
    assert!(compiled.references().contains(&ready));
    assert_eq!(compiled.evaluate(&ctx).unwrap(), json!(true));

    let url = CelBuilders::concat([ExprPart::from("postgres://"), ExprPart::from(&host)]);
    let compiled = parse(&url.expression).unwrap();
    assert!(compiled.references().contains(&host));
    assert!(!compiled.free_variables().iter().any(|v| v == "web" || v == "db"));
    assert_eq!(compiled.evaluate(&ctx).unwrap(), json!("postgres://10.1.1.1"));
}
