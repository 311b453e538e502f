//! Reference extraction over configuration trees.
//!
//! The walk is depth-first in insertion order, bounded by
//! [`MAX_TRAVERSAL_DEPTH`](crate::constants::MAX_TRAVERSAL_DEPTH), and guarded by a
//! visited set keyed on the identity of [`ConfigValue::Shared`] nodes so a subtree
//! placed at several locations is walked once. This is a termination and cost
//! guard only; dependency cycles between resources are the cycle analyzer's job.

use std::collections::HashSet;
use thiserror::Error;

use super::{ConfigValue, FieldPath, PathSegment, SymbolicExpression, SymbolicReference};
use crate::constants::MAX_TRAVERSAL_DEPTH;

/// A reference found inside a configuration, with the location it was found at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FoundReference {
    /// The reference itself
    pub reference: SymbolicReference,
    /// Location inside the owning configuration, e.g. `spec.env[0].value`
    pub field_path: String,
}

/// Failure while walking a configuration tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TraversalError {
    /// Nesting exceeded the configured limit
    #[error("Configuration nesting exceeds {limit} levels at '{location}'")]
    DepthExceeded {
        /// Location where the limit was hit
        location: String,
        /// The limit in effect
        limit: usize,
    },
}

/// A symbolic node encountered during a walk.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SymbolNode<'a> {
    Reference(&'a SymbolicReference),
    Expression(&'a SymbolicExpression),
}

/// Depth-first walk that reports every symbolic node with its location.
///
/// Shared subtrees are walked at their first location only.
pub(crate) fn walk_symbols<'a, F>(
    value: &'a ConfigValue,
    max_depth: usize,
    visit: &mut F,
) -> Result<(), TraversalError>
where
    F: FnMut(&FieldPath, SymbolNode<'a>),
{
    let mut visited = HashSet::new();
    walk(value, &FieldPath::root(), 0, max_depth, &mut visited, visit)
}

fn walk<'a, F>(
    value: &'a ConfigValue,
    location: &FieldPath,
    depth: usize,
    max_depth: usize,
    visited: &mut HashSet<*const ConfigValue>,
    visit: &mut F,
) -> Result<(), TraversalError>
where
    F: FnMut(&FieldPath, SymbolNode<'a>),
{
    if depth > max_depth {
        return Err(TraversalError::DepthExceeded {
            location: location.to_string(),
            limit: max_depth,
        });
    }

    match value {
        ConfigValue::Reference(reference) => visit(location, SymbolNode::Reference(reference)),
        ConfigValue::Expression(expression) => visit(location, SymbolNode::Expression(expression)),
        ConfigValue::Sequence(items) => {
            for (index, item) in items.iter().enumerate() {
                let child = location.child(PathSegment::Index(index));
                walk(item, &child, depth + 1, max_depth, visited, visit)?;
            }
        }
        ConfigValue::Map(map) => {
            for (key, item) in map {
                let child = location.child(PathSegment::Key(key.clone()));
                walk(item, &child, depth + 1, max_depth, visited, visit)?;
            }
        }
        ConfigValue::Shared(inner) => {
            if visited.insert(std::sync::Arc::as_ptr(inner)) {
                walk(inner, location, depth, max_depth, visited, visit)?;
            } else {
                tracing::trace!("Skipping already-visited shared node at '{}'", location);
            }
        }
        ConfigValue::Null
        | ConfigValue::Bool(_)
        | ConfigValue::Int(_)
        | ConfigValue::Float(_)
        | ConfigValue::String(_) => {}
    }
    Ok(())
}

/// Collect every reference in `value`, including those embedded in expressions.
///
/// Each (reference, location) pair is reported once, in depth-first order.
///
/// # Examples
///
/// ```rust
/// use refgraph_cli::references::{ConfigValue, extract_references};
///
/// let config: ConfigValue = serde_json::from_value(serde_json::json!({
///     "spec": {"env": [{"value": {"$ref": "database.status.podIP"}}]}
/// })).unwrap();
///
/// let found = extract_references(&config).unwrap();
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].reference.resource_id, "database");
/// assert_eq!(found[0].field_path, "spec.env[0].value");
/// ```
pub fn extract_references(value: &ConfigValue) -> Result<Vec<FoundReference>, TraversalError> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    walk_symbols(value, MAX_TRAVERSAL_DEPTH, &mut |location: &FieldPath, node: SymbolNode<'_>| {
        let references = match node {
            SymbolNode::Reference(reference) => vec![reference.clone()],
            SymbolNode::Expression(expression) => expression.references(),
        };
        for reference in references {
            let entry = FoundReference {
                reference,
                field_path: location.to_string(),
            };
            if seen.insert(entry.clone()) {
                found.push(entry);
            }
        }
    })?;
    Ok(found)
}

/// Whether any reference or expression exists below `value`.
///
/// This is the resolver's fast-path check: it allocates nothing and stops at the
/// first symbolic node. Trees deeper than the traversal limit report `true` so the
/// full walk runs and reports the depth error.
pub fn contains_symbols(value: &ConfigValue) -> bool {
    fn check(value: &ConfigValue, depth: usize) -> bool {
        if depth > MAX_TRAVERSAL_DEPTH {
            return true;
        }
        match value {
            ConfigValue::Reference(_) | ConfigValue::Expression(_) => true,
            ConfigValue::Sequence(items) => items.iter().any(|item| check(item, depth + 1)),
            ConfigValue::Map(map) => map.values().any(|item| check(item, depth + 1)),
            ConfigValue::Shared(inner) => check(inner, depth),
            ConfigValue::Null
            | ConfigValue::Bool(_)
            | ConfigValue::Int(_)
            | ConfigValue::Float(_)
            | ConfigValue::String(_) => false,
        }
    }
    check(value, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn config(value: serde_json::Value) -> ConfigValue {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_extracts_nested_and_array_references() {
        let value = config(json!({
            "metadata": {"name": {"$ref": "schema.spec.name"}},
            "spec": {
                "containers": [
                    {"image": "nginx", "env": [{"value": {"$ref": "db.status.podIP"}}]}
                ]
            }
        }));

        let found = extract_references(&value).unwrap();
        let locations: Vec<_> = found.iter().map(|f| f.field_path.as_str()).collect();
        assert_eq!(locations, vec!["metadata.name", "spec.containers[0].env[0].value"]);
        assert!(found[0].reference.is_schema());
    }

    #[test]
    fn test_extracts_references_from_expressions() {
        let value = config(json!({
            "spec": {"mode": {"$expr": "app.status.ready ? 'ready' : schema.spec.fallback"}}
        }));

        let found = extract_references(&value).unwrap();
        let refs: Vec<_> = found.iter().map(|f| f.reference.cache_key()).collect();
        assert_eq!(refs, vec!["app.status.ready", "__schema__.spec.fallback"]);
        assert!(found.iter().all(|f| f.field_path == "spec.mode"));
    }

    #[test]
    fn test_shared_subtree_walked_once() {
        let shared = ConfigValue::shared(ConfigValue::reference("db", "status.podIP"));
        let value = ConfigValue::Map(IndexMap::from([
            ("a".to_string(), shared.clone()),
            ("b".to_string(), shared),
        ]));

        let mut visits = 0;
        walk_symbols(&value, MAX_TRAVERSAL_DEPTH, &mut |_: &FieldPath, _: SymbolNode<'_>| {
            visits += 1
        })
        .unwrap();
        assert_eq!(visits, 1);
    }

    #[test]
    fn test_depth_limit() {
        let mut value = ConfigValue::reference("db", "status.podIP");
        for _ in 0..(MAX_TRAVERSAL_DEPTH + 2) {
            value = ConfigValue::Sequence(vec![value]);
        }
        assert!(contains_symbols(&value));
        let err = extract_references(&value).unwrap_err();
        assert!(matches!(err, TraversalError::DepthExceeded { .. }));
    }

    #[test]
    fn test_contains_symbols() {
        assert!(!contains_symbols(&config(json!({"a": [1, 2, {"b": "c"}]}))));
        assert!(contains_symbols(&config(json!({"a": [1, {"$expr": "true"}]}))));
    }
}
