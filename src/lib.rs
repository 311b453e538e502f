//! refgraph - resource reference graphs
//!
//! Infrastructure resources often read each other's fields: an application's
//! environment holds a database's pod IP, an ingress host is built from a
//! service's cluster IP. refgraph discovers those references, builds the
//! dependency graph they imply, reports circular dependencies with a risk
//! assessment, orders resources for deployment, and resolves references to
//! concrete values once the referenced resources exist.
//!
//! # Architecture Overview
//!
//! Configurations are JSON-like trees ([`references::ConfigValue`]) whose
//! leaves may be symbolic references (`database.status.podIP`) or expressions
//! (`concat("http://", svc.status.clusterIP)`).
//!
//! - Compile time: [`dependency::DependencyTracker`] extracts every reference
//!   into a [`dependency::DependencyGraph`]; [`dependency::CycleAnalyzer`] and
//!   [`dependency::TopologicalOrderer`] derive cycles and a deployment order;
//!   [`validation`] checks references against known resources and fields.
//! - Deploy time: [`resolver::ReferenceResolver`] substitutes references with
//!   values from deployed resources, falling back to a live-object fetcher, and
//!   evaluates expressions with the [`expression`] evaluator.
//!
//! # Core Modules
//!
//! - [`references`] - reference, expression and configuration-tree model
//! - [`expression`] - expression parser, evaluator and builders
//! - [`resolver`] - runtime reference resolution with per-pass caching
//! - [`dependency`] - dependency tracking, cycle analysis and ordering
//! - [`validation`] - reference type and field validation
//! - [`manifest`] - resource-graph files
//! - [`config`] - user configuration (`~/.refgraph/config.toml`)
//! - [`core`] - error types and user-facing error reporting
//! - [`cli`] - the `refgraph` command line
//!
//! # Example
//!
//! ```rust
//! use refgraph_cli::dependency::{DependencyTracker, TrackingOptions};
//! use refgraph_cli::references::ConfigValue;
//! use serde_json::json;
//!
//! let app = ConfigValue::from_json(&json!({
//!     "spec": {"env": [{"value": {"$ref": "database.status.podIP"}}]}
//! }));
//! let database = ConfigValue::from_json(&json!({"spec": {"replicas": 1}}));
//!
//! let mut tracker = DependencyTracker::new();
//! let options = TrackingOptions::default();
//! tracker.track_resource("app", &app, &options)?;
//! tracker.track_resource("database", &database, &options)?;
//! tracker.graph_mut().refresh_derived();
//!
//! assert_eq!(tracker.graph().deployment_order(), &["database", "app"]);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod dependency;
pub mod expression;
pub mod manifest;
pub mod references;
pub mod resolver;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
