//! Reference resolution against deployed and live resources.
//!
//! The [`ReferenceResolver`] replaces every symbolic reference and expression in
//! a configuration tree with a concrete value. One resolver serves one
//! resolution pass: its cache lives as long as the resolver and is never shared.
//!
//! # Resolution steps
//!
//! 1. **Fast path**: a tree with no symbols is returned borrowed, untouched.
//! 2. **Collect**: the tree is walked depth-first in insertion order and every
//!    symbolic node is recorded.
//! 3. **Resolve**: each distinct reference or expression is resolved once,
//!    cache first. References read the deployed resource's manifest, falling
//!    back to the [`LiveObjectFetcher`]. Expressions bind every free variable to
//!    a full manifest and are handed to the evaluator.
//! 4. **Substitute**: resolved values are written into a deep copy, so the
//!    authored configuration is never mutated.
//!
//! # Example
//!
//! ```rust,no_run
//! use refgraph_cli::references::ConfigValue;
//! use refgraph_cli::resolver::{DeployedResource, ReferenceResolver, ResolutionContext};
//! use serde_json::json;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let ctx = ResolutionContext::new().with_deployed(vec![DeployedResource::new(
//!     "svc",
//!     "Service",
//!     json!({"status": {"loadBalancer": {"ingress": [{"ip": "1.2.3.4"}]}}}),
//! )]);
//!
//! let config = ConfigValue::reference("svc", "status.loadBalancer.ingress[0].ip");
//! let mut resolver = ReferenceResolver::new();
//! let resolved = resolver.resolve(&config, &ctx).await?;
//! assert_eq!(resolved.as_str(), Some("1.2.3.4"));
//! # Ok(())
//! # }
//! ```

mod cache;
mod deployed;
mod error;
mod fetch;

pub use cache::{CacheStats, ResolutionCache};
pub use deployed::DeployedResource;
pub use error::{FetchError, ReferenceFailure, ResolutionError};
pub use fetch::{FetchFuture, LiveObjectFetcher, StaticFetcher, UnsupportedFetcher};

use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{DEFAULT_FETCH_TIMEOUT, MAX_TRAVERSAL_DEPTH, SCHEMA_VARIABLE};
use crate::expression::{CelExpressionError, EvalContext, EvalError, FunctionTable};
use crate::references::extract::{SymbolNode, walk_symbols};
use crate::references::{ConfigValue, FieldPath, SymbolicExpression, SymbolicReference};

/// Tunables for a resolver.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Timeout around each live-fetch call; `None` waits indefinitely
    pub fetch_timeout: Option<Duration>,
    /// Maximum configuration nesting walked
    pub max_depth: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
            max_depth: MAX_TRAVERSAL_DEPTH,
        }
    }
}

/// Inputs for one resolution pass. Read-only to the resolver.
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    /// Resources already deployed in this attempt
    pub deployed: Vec<DeployedResource>,
    /// Input schema values addressed by `schema.` references
    pub schema: Option<Value>,
    /// Extension functions available to expressions
    pub extensions: FunctionTable,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_deployed(mut self, deployed: Vec<DeployedResource>) -> Self {
        self.deployed = deployed;
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_extensions(mut self, extensions: FunctionTable) -> Self {
        self.extensions = extensions;
        self
    }

    /// Find a deployed resource by logical id.
    pub fn deployed_resource(&self, id: &str) -> Option<&DeployedResource> {
        self.deployed.iter().find(|resource| resource.id == id)
    }
}

/// Resolves references and expressions for one pass.
///
/// Methods take `&mut self`, so a resolver cannot be shared between concurrent
/// passes; create one per deployment attempt.
pub struct ReferenceResolver {
    cache: ResolutionCache,
    /// Live objects fetched this pass, by resource id
    live_objects: HashMap<String, Value>,
    fetcher: Box<dyn LiveObjectFetcher>,
    options: ResolverOptions,
    live_fetches: usize,
}

impl Default for ReferenceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReferenceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceResolver")
            .field("fetcher", &self.fetcher.name())
            .field("options", &self.options)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ReferenceResolver {
    /// A resolver without live-fetch support.
    pub fn new() -> Self {
        Self::with_fetcher(UnsupportedFetcher)
    }

    /// A resolver delegating absent resources to `fetcher`.
    pub fn with_fetcher(fetcher: impl LiveObjectFetcher + 'static) -> Self {
        Self {
            cache: ResolutionCache::new(),
            live_objects: HashMap::new(),
            fetcher: Box::new(fetcher),
            options: ResolverOptions::default(),
            live_fetches: 0,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Cache statistics for the pass so far.
    pub fn stats(&self) -> CacheStats {
        let (hits, misses) = self.cache.stats();
        CacheStats {
            hits,
            misses,
            entries: self.cache.len(),
            live_fetches: self.live_fetches,
        }
    }

    /// Forget everything resolved so far, starting a fresh pass.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.live_objects.clear();
        self.live_fetches = 0;
    }

    /// Resolve every reference and expression in `value`.
    ///
    /// A value without symbols is returned borrowed without touching the cache.
    ///
    /// # Errors
    ///
    /// The first failing reference or expression aborts resolution:
    /// [`ResolutionError::ReferenceResolution`] when a resource or field is
    /// missing, [`ResolutionError::CelExpression`] when an expression fails, and
    /// [`ResolutionError::DepthExceeded`] for over-deep trees.
    pub async fn resolve<'a>(
        &mut self,
        value: &'a ConfigValue,
        ctx: &ResolutionContext,
    ) -> Result<Cow<'a, ConfigValue>, ResolutionError> {
        if !value.contains_symbols() {
            return Ok(Cow::Borrowed(value));
        }

        let mut nodes: Vec<SymbolNode<'a>> = Vec::new();
        walk_symbols(value, self.options.max_depth, &mut |_: &FieldPath, node: SymbolNode<'a>| {
            nodes.push(node)
        })?;
        tracing::debug!("Resolving {} symbolic node(s)", nodes.len());

        let mut resolved: HashMap<String, Value> = HashMap::new();
        for node in nodes {
            let key = match node {
                SymbolNode::Reference(reference) => reference.cache_key(),
                SymbolNode::Expression(expression) => expression.cache_key(),
            };
            if resolved.contains_key(&key) {
                continue;
            }
            let result = match node {
                SymbolNode::Reference(reference) => self.resolve_reference(reference, ctx).await?,
                SymbolNode::Expression(expression) => {
                    self.resolve_expression(expression, ctx).await?
                }
            };
            resolved.insert(key, result);
        }

        let mut shared = HashMap::new();
        Ok(Cow::Owned(substitute(value, &resolved, &mut shared)))
    }

    /// Resolve a single reference, cache first.
    pub async fn resolve_reference(
        &mut self,
        reference: &SymbolicReference,
        ctx: &ResolutionContext,
    ) -> Result<Value, ResolutionError> {
        let key = reference.cache_key();
        if let Some(value) = self.cache.get(&key) {
            tracing::debug!("Cache hit for reference '{}'", reference);
            return Ok(value.clone());
        }

        let value = self.lookup_reference(reference, ctx).await.map_err(|cause| {
            ResolutionError::ReferenceResolution {
                reference: reference.clone(),
                cause,
            }
        })?;
        tracing::debug!("Resolved reference '{}'", reference);
        self.cache.insert(key, value.clone());
        Ok(value)
    }

    /// Resolve a single expression, cache first.
    ///
    /// Every free variable is bound to a full manifest: `schema` to the input
    /// schema, other names to the deployed resource or the live object. A
    /// variable whose object cannot be obtained is only an error if evaluation
    /// actually reads it.
    pub async fn resolve_expression(
        &mut self,
        expression: &SymbolicExpression,
        ctx: &ResolutionContext,
    ) -> Result<Value, ResolutionError> {
        let key = expression.cache_key();
        if let Some(value) = self.cache.get(&key) {
            tracing::debug!("Cache hit for expression '{}'", expression);
            return Ok(value.clone());
        }

        let compiled = crate::expression::parse(&expression.expression)?;
        let mut eval_ctx = EvalContext::new().with_functions(ctx.extensions.clone());
        let mut unavailable: HashMap<String, String> = HashMap::new();

        for name in compiled.free_variables() {
            if name == SCHEMA_VARIABLE {
                match &ctx.schema {
                    Some(schema) => eval_ctx.bind(name, schema.clone()),
                    None => {
                        unavailable.insert(name, ReferenceFailure::SchemaUnavailable.to_string());
                    }
                }
            } else if let Some(resource) = ctx.deployed_resource(&name) {
                eval_ctx.bind(name, resource.view().into_owned());
            } else {
                match self.fetch_live(&SymbolicReference::new(name.as_str(), "")).await {
                    Ok(object) => eval_ctx.bind(name, object),
                    Err(failure) => {
                        tracing::debug!("Variable '{}' is unavailable: {}", name, failure);
                        unavailable.insert(name, failure.to_string());
                    }
                }
            }
        }

        let value = compiled.evaluate(&eval_ctx).map_err(|e| match e.cause {
            EvalError::UnknownVariable {
                name,
            } if unavailable.contains_key(&name) => {
                let reason = unavailable.remove(&name).unwrap_or_default();
                CelExpressionError::new(
                    e.expression,
                    EvalError::VariableUnavailable {
                        name,
                        reason,
                    },
                )
            }
            cause => CelExpressionError::new(e.expression, cause),
        })?;
        tracing::debug!("Evaluated expression '{}'", expression);
        self.cache.insert(key, value.clone());
        Ok(value)
    }

    async fn lookup_reference(
        &mut self,
        reference: &SymbolicReference,
        ctx: &ResolutionContext,
    ) -> Result<Value, ReferenceFailure> {
        let path = reference.parsed_path()?;

        if reference.is_schema() {
            let schema = ctx.schema.as_ref().ok_or(ReferenceFailure::SchemaUnavailable)?;
            return extract_field(schema, &path);
        }
        if let Some(resource) = ctx.deployed_resource(&reference.resource_id) {
            return extract_field(&resource.view(), &path);
        }

        let object = self.fetch_live(reference).await?;
        extract_field(&object, &path)
    }

    /// Fetch a live object once per pass, bounded by the configured timeout.
    async fn fetch_live(&mut self, reference: &SymbolicReference) -> Result<Value, ReferenceFailure> {
        if let Some(object) = self.live_objects.get(&reference.resource_id) {
            return Ok(object.clone());
        }

        self.live_fetches += 1;
        tracing::debug!(
            "Fetching live object '{}' via {} fetcher",
            reference.resource_id,
            self.fetcher.name()
        );
        let fetch = self.fetcher.fetch(reference);
        let object = match self.options.fetch_timeout {
            Some(after) => tokio::time::timeout(after, fetch).await.map_err(|_| {
                tracing::warn!("Live lookup of '{}' timed out after {:?}", reference.resource_id, after);
                ReferenceFailure::Timeout {
                    after,
                }
            })??,
            None => fetch.await?,
        };

        self.live_objects.insert(reference.resource_id.clone(), object.clone());
        Ok(object)
    }
}

fn extract_field(object: &Value, path: &FieldPath) -> Result<Value, ReferenceFailure> {
    if let Some(value) = path.navigate(object) {
        return Ok(value.clone());
    }
    let (reached, node) = path.deepest(object);
    Err(ReferenceFailure::FieldNotFound {
        field_path: path.to_string(),
        reached: reached.to_string(),
        available: node.as_object().map(|map| map.keys().cloned().collect()).unwrap_or_default(),
    })
}

/// Rebuild `value` with every symbolic node replaced.
///
/// Shared subtrees are rebuilt once and re-shared, so the output keeps the
/// input's sharing structure.
fn substitute(
    value: &ConfigValue,
    resolved: &HashMap<String, Value>,
    shared: &mut HashMap<*const ConfigValue, ConfigValue>,
) -> ConfigValue {
    match value {
        ConfigValue::Reference(reference) => match resolved.get(&reference.cache_key()) {
            Some(found) => ConfigValue::from_json(found),
            None => value.clone(),
        },
        ConfigValue::Expression(expression) => match resolved.get(&expression.cache_key()) {
            Some(found) => ConfigValue::from_json(found),
            None => value.clone(),
        },
        ConfigValue::Sequence(items) => {
            ConfigValue::Sequence(items.iter().map(|item| substitute(item, resolved, shared)).collect())
        }
        ConfigValue::Map(map) => ConfigValue::Map(
            map.iter().map(|(k, v)| (k.clone(), substitute(v, resolved, shared))).collect(),
        ),
        ConfigValue::Shared(inner) => {
            let key = Arc::as_ptr(inner);
            if let Some(done) = shared.get(&key) {
                return done.clone();
            }
            let rebuilt = ConfigValue::Shared(Arc::new(substitute(inner, resolved, shared)));
            shared.insert(key, rebuilt.clone());
            rebuilt
        }
        ConfigValue::Null
        | ConfigValue::Bool(_)
        | ConfigValue::Int(_)
        | ConfigValue::Float(_)
        | ConfigValue::String(_) => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn svc() -> DeployedResource {
        DeployedResource::new(
            "svc",
            "Service",
            json!({
                "metadata": {"name": "web"},
                "status": {"clusterIP": "10.0.0.1", "loadBalancer": {"ingress": [{"ip": "1.2.3.4"}]}}
            }),
        )
    }

    fn config(value: serde_json::Value) -> ConfigValue {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_fast_path_borrows() {
        let value = config(json!({"spec": {"replicas": 3}}));
        let mut resolver = ReferenceResolver::new();
        let resolved = resolver.resolve(&value, &ResolutionContext::new()).await.unwrap();
        assert!(matches!(resolved, Cow::Borrowed(_)));
        assert_eq!(resolver.stats(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_resolves_indexed_path() {
        let ctx = ResolutionContext::new().with_deployed(vec![svc()]);
        let value = ConfigValue::reference("svc", "status.loadBalancer.ingress[0].ip");
        let mut resolver = ReferenceResolver::new();
        let resolved = resolver.resolve(&value, &ctx).await.unwrap();
        assert_eq!(resolved.into_owned(), ConfigValue::String("1.2.3.4".to_string()));
    }

    #[tokio::test]
    async fn test_resolves_nested_config_without_mutation() {
        let ctx = ResolutionContext::new()
            .with_deployed(vec![svc()])
            .with_schema(json!({"spec": {"port": 8080}}));
        let value = config(json!({
            "env": [
                {"name": "HOST", "value": {"$ref": "svc.status.clusterIP"}},
                {"name": "URL", "value": {"$expr": "concat('http://', svc.status.clusterIP, ':', string(schema.spec.port))"}}
            ]
        }));
        let original = value.clone();

        let mut resolver = ReferenceResolver::new();
        let resolved = resolver.resolve(&value, &ctx).await.unwrap().into_owned();
        assert_eq!(value, original);
        assert_eq!(
            resolved.to_json(),
            json!({"env": [
                {"name": "HOST", "value": "10.0.0.1"},
                {"name": "URL", "value": "http://10.0.0.1:8080"}
            ]})
        );
    }

    #[tokio::test]
    async fn test_missing_resource_is_reference_error() {
        let mut resolver = ReferenceResolver::with_fetcher(StaticFetcher::new());
        let err = resolver
            .resolve(&ConfigValue::reference("missing", "status.ready"), &ResolutionContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.resource_id(), Some("missing"));
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn test_missing_field_lists_available_keys() {
        let ctx = ResolutionContext::new().with_deployed(vec![svc()]);
        let mut resolver = ReferenceResolver::new();
        let err = resolver
            .resolve_reference(&SymbolicReference::new("svc", "status.podIP"), &ctx)
            .await
            .unwrap_err();
        match err {
            ResolutionError::ReferenceResolution {
                cause:
                    ReferenceFailure::FieldNotFound {
                        reached,
                        available,
                        ..
                    },
                ..
            } => {
                assert_eq!(reached, "status");
                assert!(available.contains(&"clusterIP".to_string()));
            }
            other => panic!("expected FieldNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_schema_reference_requires_schema() {
        let mut resolver = ReferenceResolver::new();
        let err = resolver
            .resolve_reference(&SymbolicReference::schema("spec.name"), &ResolutionContext::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::ReferenceResolution {
                cause: ReferenceFailure::SchemaUnavailable,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_repeated_reference_hits_cache() {
        let shared = ConfigValue::reference("svc", "status.clusterIP");
        let value = ConfigValue::Map(IndexMap::from([
            ("a".to_string(), shared.clone()),
            ("b".to_string(), shared),
        ]));
        let ctx = ResolutionContext::new().with_deployed(vec![svc()]);
        let mut resolver = ReferenceResolver::new();
        resolver.resolve(&value, &ctx).await.unwrap();
        resolver.resolve(&value, &ctx).await.unwrap();
        let stats = resolver.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_expression_with_unused_unavailable_variable() {
        let ctx = ResolutionContext::new().with_deployed(vec![svc()]);
        let mut resolver = ReferenceResolver::new();
        let value = resolver
            .resolve_expression(&SymbolicExpression::new("true || ghost.status.ready"), &ctx)
            .await
            .unwrap();
        assert_eq!(value, json!(true));

        let err = resolver
            .resolve_expression(&SymbolicExpression::new("ghost.status.ready"), &ctx)
            .await
            .unwrap_err();
        match err {
            ResolutionError::CelExpression(e) => {
                assert_eq!(e.expression, "ghost.status.ready");
                assert!(matches!(e.cause, EvalError::VariableUnavailable { ref name, .. } if name == "ghost"));
            }
            other => panic!("expected CelExpression error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shared_subtree_stays_shared() {
        let shared = ConfigValue::shared(ConfigValue::reference("svc", "metadata.name"));
        let value = ConfigValue::Sequence(vec![shared.clone(), shared]);
        let ctx = ResolutionContext::new().with_deployed(vec![svc()]);
        let mut resolver = ReferenceResolver::new();
        let resolved = resolver.resolve(&value, &ctx).await.unwrap().into_owned();
        match resolved {
            ConfigValue::Sequence(items) => match (&items[0], &items[1]) {
                (ConfigValue::Shared(a), ConfigValue::Shared(b)) => {
                    assert!(Arc::ptr_eq(a, b));
                    assert_eq!(a.as_str(), Some("web"));
                }
                other => panic!("expected shared nodes, got {other:?}"),
            },
            other => panic!("expected sequence, got {other:?}"),
        }
    }
}
