//! Resolution against deployed resources, live objects and the schema.

use std::sync::Arc;
use std::time::Duration;

use refgraph_cli::expression::{EvalContext, evaluate};
use refgraph_cli::manifest::GraphManifest;
use refgraph_cli::expression::CelBuilders;
use refgraph_cli::references::{ConfigValue, SymbolicReference};
use refgraph_cli::resolver::{
    DeployedResource, FetchFuture, LiveObjectFetcher, ReferenceFailure, ReferenceResolver,
    ResolutionContext, ResolutionError, ResolverOptions, StaticFetcher,
};
use refgraph_cli::test_utils::{CountingFetcher, GraphFixture};
use serde_json::json;

fn svc() -> DeployedResource {
    DeployedResource::new(
        "svc",
        "Service",
        json!({
            "status": {
                "clusterIP": "10.0.0.1",
                "loadBalancer": {"ingress": [{"ip": "1.2.3.4"}]}
            }
        }),
    )
}

#[tokio::test]
async fn test_indexed_reference_resolves_from_deployed() {
    let ctx = ResolutionContext::new().with_deployed(vec![svc()]);
    let mut resolver = ReferenceResolver::new();

    let value = resolver
        .resolve_reference(&SymbolicReference::new("svc", "status.loadBalancer.ingress[0].ip"), &ctx)
        .await
        .unwrap();
    assert_eq!(value, json!("1.2.3.4"));
}

#[test]
fn test_concat_expression_with_bound_manifest() {
    let ctx = EvalContext::new().with_variable("svc", json!({"status": {"clusterIP": "10.0.0.1"}}));
    let url = evaluate(r#"concat("http://", svc.status.clusterIP)"#, &ctx).unwrap();
    assert_eq!(url, json!("http://10.0.0.1"));
}

#[tokio::test]
async fn test_missing_resource_identifies_reference() {
    let mut resolver = ReferenceResolver::with_fetcher(StaticFetcher::new());
    let err = resolver
        .resolve_reference(&SymbolicReference::new("missing", "status.ready"), &ResolutionContext::new())
        .await
        .unwrap_err();

    match &err {
        ResolutionError::ReferenceResolution {
            reference,
            cause: ReferenceFailure::Fetch(_),
        } => assert_eq!(reference.resource_id, "missing"),
        other => panic!("expected a fetch failure, got {other:?}"),
    }
    assert!(err.to_string().contains("missing"));
}

#[tokio::test]
async fn test_live_object_fetched_once_per_pass() {
    let fetcher = Arc::new(CountingFetcher::new().with_object(
        "db",
        json!({"status": {"podIP": "10.0.0.7", "ready": true}}),
    ));
    let mut resolver = ReferenceResolver::with_fetcher(Arc::clone(&fetcher));
    let ctx = ResolutionContext::new();

    let value: ConfigValue = serde_json::from_value(json!({
        "host": {"$ref": "db.status.podIP"},
        "ready": {"$ref": "db.status.ready"},
        "again": {"$ref": "db.status.podIP"}
    }))
    .unwrap();

    let resolved = resolver.resolve(&value, &ctx).await.unwrap().into_owned();
    assert_eq!(resolved.to_json(), json!({"host": "10.0.0.7", "ready": true, "again": "10.0.0.7"}));
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(resolver.stats().live_fetches, 1);

    resolver.reset();
    resolver.resolve(&value, &ctx).await.unwrap();
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_graph_file_resolves_end_to_end() {
    let manifest = GraphManifest::parse(&GraphFixture::web().content, false).unwrap();
    let ctx = manifest.resolution_context();
    let mut resolver = ReferenceResolver::new().with_options(ResolverOptions::default());

    let ingress = resolver.resolve(&manifest.resources["ingress"].config, &ctx).await.unwrap();
    assert_eq!(
        ingress.to_json(),
        json!({"spec": {"backend": "http://10.0.0.1", "address": "1.2.3.4"}})
    );

    let svc = resolver.resolve(&manifest.resources["svc"].config, &ctx).await.unwrap();
    assert_eq!(svc.to_json(), json!({"metadata": {"name": "shop"}}));
}

#[tokio::test]
async fn test_unavailable_live_object_fails_resolution() {
    let fetcher = Arc::new(CountingFetcher::new());
    let mut resolver = ReferenceResolver::with_fetcher(Arc::clone(&fetcher));
    let err = resolver
        .resolve(&ConfigValue::reference("cache", "status.podIP"), &ResolutionContext::new())
        .await
        .unwrap_err();

    assert_eq!(err.resource_id(), Some("cache"));
    assert_eq!(fetcher.calls(), 1);
}

/// Fetcher whose lookups never complete.
struct StalledFetcher;

impl LiveObjectFetcher for StalledFetcher {
    fn name(&self) -> &str {
        "stalled"
    }

    fn fetch<'a>(&'a self, _reference: &'a SymbolicReference) -> FetchFuture<'a> {
        Box::pin(futures::future::pending())
    }
}

#[tokio::test(start_paused = true)]
async fn test_stalled_live_fetch_times_out() {
    let mut resolver = ReferenceResolver::with_fetcher(StalledFetcher).with_options(ResolverOptions {
        fetch_timeout: Some(Duration::from_millis(50)),
        ..ResolverOptions::default()
    });

    let err = resolver
        .resolve(&ConfigValue::reference("db", "status.podIP"), &ResolutionContext::new())
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "expected a timeout, got {err:?}");
    assert_eq!(err.resource_id(), Some("db"));
    let message = err.to_string();
    assert!(message.contains("db.status.podIP"), "{message}");
    assert!(message.contains("timed out after 50ms"), "{message}");
}

#[tokio::test]
async fn test_hyphenated_resource_id_resolves_in_built_expression() {
    let ctx = ResolutionContext::new().with_deployed(vec![DeployedResource::new(
        "web-db",
        "StatefulSet",
        json!({"status": {"ready": true, "podIP": "10.1.1.1"}}),
    )]);
    let mut resolver = ReferenceResolver::with_fetcher(StaticFetcher::new());

    let ready = CelBuilders::has(&SymbolicReference::new("web-db", "status.ready"));
    assert_eq!(resolver.resolve_expression(&ready, &ctx).await.unwrap(), json!(true));

    let missing = CelBuilders::has(&SymbolicReference::new("web-db", "status.hostIP"));
    assert_eq!(resolver.resolve_expression(&missing, &ctx).await.unwrap(), json!(false));
    assert_eq!(resolver.stats().live_fetches, 0);
}
