//! Global constants used throughout the refgraph codebase.
//!
//! This module contains sentinel identifiers, classification vocabularies,
//! traversal limits, and timeouts that are used across multiple modules.
//! Defining them centrally keeps the classification heuristics discoverable
//! and makes magic strings easy to audit.

use std::time::Duration;

/// Reserved resource id denoting a reference into the input schema.
///
/// Schema references are never deployable nodes: they produce dependency
/// records but no edges in the deployment graph.
pub const SCHEMA_RESOURCE_ID: &str = "__schema__";

/// Variable name under which the input schema is exposed to expressions.
pub const SCHEMA_VARIABLE: &str = "schema";

/// Prefix for expression entries in the resolution cache.
pub const EXPRESSION_CACHE_PREFIX: &str = "cel:";

/// Maximum nesting depth walked when traversing a configuration tree.
///
/// Authored configurations are rarely deeper than a dozen levels; anything
/// past this limit is treated as malformed input.
pub const MAX_TRAVERSAL_DEPTH: usize = 64;

/// Maximum number of elements a collection macro (`map`, `filter`, `all`,
/// `exists`) will iterate over.
pub const MAX_COLLECTION_ITEMS: usize = 10_000;

/// Maximum nesting depth accepted by the expression parser.
pub const MAX_EXPRESSION_DEPTH: usize = 128;

/// Field names whose references default to required dependencies.
pub const REQUIRED_FIELD_NAMES: &[&str] = &["name", "namespace", "image", "selector", "serviceName"];

/// Path segments that mark a field as conditional.
pub const CONDITIONAL_SEGMENTS: &[&str] = &["if", "when", "condition", "conditional"];

/// Field names that participate in readiness evaluation.
pub const READINESS_FIELDS: &[&str] = &["ready", "available", "replicas", "conditions"];

/// Root segment of the status namespace.
pub const STATUS_ROOT: &str = "status";

/// Default timeout applied around a live-fetch collaborator call (30 seconds).
///
/// A timeout surfaces as a typed resolution failure, never as an unresolved value.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Severity above which a circular dependency is always high risk.
pub const HIGH_RISK_SEVERITY: f64 = 0.8;

/// Severity below which a short circular dependency is low risk.
pub const LOW_RISK_SEVERITY: f64 = 0.3;

/// Chain length above which a circular dependency is always high risk.
pub const HIGH_RISK_CHAIN_LENGTH: usize = 5;

/// Chain length at or below which a low-severity cycle is low risk.
pub const LOW_RISK_CHAIN_LENGTH: usize = 2;

/// Chain length above which extracting shared state is recommended.
pub const LONG_CHAIN_LENGTH: usize = 3;

/// Environment variable that overrides the configuration file location.
pub const CONFIG_PATH_ENV: &str = "REFGRAPH_CONFIG_PATH";
