//! Dependency classification and graph construction.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::{CycleAnalyzer, DependencyGraph, DependencyInfo, DependencyType};
use crate::constants::{
    CONDITIONAL_SEGMENTS, READINESS_FIELDS, REQUIRED_FIELD_NAMES, SCHEMA_RESOURCE_ID, STATUS_ROOT,
};
use crate::references::{
    ConfigValue, FieldPath, PathSegment, SymbolicReference, TraversalError, extract_references,
};

/// Shape of an id treated as an in-graph resource when no registry is supplied.
const RESOURCE_ID_PATTERN: &str = "^[a-z][a-z0-9-]*$";

fn resource_id_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(RESOURCE_ID_PATTERN).ok()).as_ref()
}

/// Per-call tracking controls.
///
/// The `required`, `affects_readiness` and `conditional` overrides replace the
/// corresponding heuristic for every dependency in the call.
#[derive(Debug, Clone)]
pub struct TrackingOptions {
    /// Record schema dependencies
    pub track_schema: bool,
    /// Record resource dependencies
    pub track_resources: bool,
    /// Record external dependencies
    pub track_external: bool,
    pub required: Option<bool>,
    pub affects_readiness: Option<bool>,
    pub conditional: Option<bool>,
    /// When set, only these ids are resources; every other id is external
    pub known_resources: Option<HashSet<String>>,
    /// Refresh `circular_chains` after tracking
    pub detect_cycles: bool,
    /// Refresh `deployment_order` after tracking
    pub compute_order: bool,
    /// Required flag when no rule applies
    pub default_required: bool,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            track_schema: true,
            track_resources: true,
            track_external: true,
            required: None,
            affects_readiness: None,
            conditional: None,
            known_resources: None,
            detect_cycles: false,
            compute_order: false,
            default_required: true,
        }
    }
}

impl TrackingOptions {
    fn tracks(&self, dependency_type: DependencyType) -> bool {
        match dependency_type {
            DependencyType::Schema => self.track_schema,
            DependencyType::Resource => self.track_resources,
            DependencyType::External => self.track_external,
        }
    }
}

/// Classify a reference target.
///
/// The schema sentinel is `schema`. With a registry, registered ids are
/// `resource`; without one, any id shaped like `^[a-z][a-z0-9-]*$` is.
/// Everything else is `external`.
pub fn classify_dependency_type(
    resource_id: &str,
    known_resources: Option<&HashSet<String>>,
) -> DependencyType {
    if resource_id == SCHEMA_RESOURCE_ID {
        return DependencyType::Schema;
    }
    let is_resource = match known_resources {
        Some(known) => known.contains(resource_id),
        None => resource_id_regex().is_some_and(|re| re.is_match(resource_id)),
    };
    if is_resource {
        DependencyType::Resource
    } else {
        DependencyType::External
    }
}

fn key_segments(field_path: &str) -> Vec<String> {
    match FieldPath::parse(field_path) {
        Ok(path) => path
            .segments()
            .iter()
            .filter_map(|segment| match segment {
                PathSegment::Key(key) => Some(key.clone()),
                PathSegment::Index(_) => None,
            })
            .collect(),
        Err(_) => field_path.split('.').map(str::to_string).collect(),
    }
}

/// Whether a location inside a configuration is conditional.
///
/// Any key equal to `if`, `when`, `condition` or `conditional`, ending in `When`
/// or `If`, or starting with `optional` marks the location conditional.
pub fn is_conditional_path(field_path: &str) -> bool {
    key_segments(field_path).iter().any(|key| {
        let lower = key.to_ascii_lowercase();
        CONDITIONAL_SEGMENTS.contains(&lower.as_str())
            || (key.len() > 4 && key.ends_with("When"))
            || (key.len() > 2 && key.ends_with("If"))
            || lower.starts_with("optional")
    })
}

/// Whether the last key of a location is one of the always-required field names.
pub fn is_required_field(field_path: &str) -> bool {
    key_segments(field_path).last().is_some_and(|key| REQUIRED_FIELD_NAMES.contains(&key.as_str()))
}

/// Whether a referenced field participates in readiness.
///
/// True for anything under `status`, and for fields named after the readiness
/// vocabulary, including camel-case suffixes such as `readyReplicas`.
pub fn affects_readiness(reference: &SymbolicReference) -> bool {
    let keys = key_segments(&reference.field_path);
    if keys.first().is_some_and(|root| root == STATUS_ROOT) {
        return true;
    }
    let Some(last) = keys.last() else {
        return false;
    };
    READINESS_FIELDS.iter().any(|field| {
        if last == field {
            return true;
        }
        let mut capitalized = field.to_string();
        if let Some(first) = capitalized.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        last.ends_with(&capitalized)
    })
}

/// Builds a [`DependencyGraph`] one resource at a time.
///
/// Resources are tracked sequentially; analysis then runs on the finished graph.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    graph: DependencyGraph,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify and record the dependencies of `resource_id`.
    ///
    /// `field_paths[i]` is where `references[i]` was found in the resource's
    /// configuration; a missing entry means the configuration root. Returns the
    /// classified dependencies of this call, excluding types disabled in
    /// `options`.
    pub fn track(
        &mut self,
        resource_id: &str,
        references: &[SymbolicReference],
        field_paths: &[String],
        options: &TrackingOptions,
    ) -> Vec<DependencyInfo> {
        let infos: Vec<DependencyInfo> = references
            .iter()
            .enumerate()
            .filter_map(|(i, reference)| {
                let location = field_paths.get(i).map(String::as_str).unwrap_or_default();
                let info = classify(reference, location, options);
                if options.tracks(info.dependency_type) {
                    Some(info)
                } else {
                    tracing::trace!(
                        "Skipping {} dependency of '{}' on '{}'",
                        info.dependency_type,
                        resource_id,
                        reference
                    );
                    None
                }
            })
            .collect();

        let added = self.graph.add_dependencies(resource_id, infos.clone());
        tracing::debug!(
            "Tracked '{}': {} dependenc(ies), {} new",
            resource_id,
            infos.len(),
            added.len()
        );

        if options.detect_cycles {
            self.graph.refresh_cycles();
            for chain in self.graph.circular_chains() {
                tracing::warn!("Circular dependency detected: {}", chain.join(" → "));
            }
        }
        if options.compute_order {
            self.graph.refresh_order();
        }
        infos
    }

    /// Extract every reference from `config` and track it.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError`] when the configuration is nested too deeply.
    pub fn track_resource(
        &mut self,
        resource_id: &str,
        config: &ConfigValue,
        options: &TrackingOptions,
    ) -> Result<Vec<DependencyInfo>, TraversalError> {
        let found = extract_references(config)?;
        let (references, field_paths): (Vec<_>, Vec<_>) =
            found.into_iter().map(|f| (f.reference, f.field_path)).unzip();
        if references.is_empty() {
            self.graph.ensure_node(resource_id);
        }
        Ok(self.track(resource_id, &references, &field_paths, options))
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut DependencyGraph {
        &mut self.graph
    }

    pub fn into_graph(self) -> DependencyGraph {
        self.graph
    }

    pub fn dependencies_of(&self, resource_id: &str) -> &[DependencyInfo] {
        self.graph.dependencies_of(resource_id)
    }

    pub fn dependents_of(&self, resource_id: &str) -> &[String] {
        self.graph.dependents_of(resource_id)
    }

    pub fn transitive_dependencies(&self, resource_id: &str) -> Vec<String> {
        self.graph.transitive_dependencies(resource_id)
    }

    pub fn to_tree_string(&self, root: &str) -> String {
        self.graph.to_tree_string(root)
    }

    /// Basic cycle chains over the current graph.
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        CycleAnalyzer::detect_basic(&self.graph)
    }
}

fn classify(reference: &SymbolicReference, location: &str, options: &TrackingOptions) -> DependencyInfo {
    let dependency_type =
        classify_dependency_type(&reference.resource_id, options.known_resources.as_ref());
    let conditional = options.conditional.unwrap_or_else(|| is_conditional_path(location));

    let required = options.required.unwrap_or_else(|| {
        if dependency_type == DependencyType::Schema || is_required_field(location) {
            true
        } else if conditional {
            false
        } else {
            options.default_required
        }
    });

    DependencyInfo {
        reference: reference.clone(),
        field_path: location.to_string(),
        dependency_type,
        required,
        expected_type: reference.declared_type.unwrap_or_default(),
        affects_readiness: options
            .affects_readiness
            .unwrap_or_else(|| affects_readiness(reference)),
        conditional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::TypeTag;
    use serde_json::json;

    #[test]
    fn test_classify_dependency_type() {
        assert_eq!(classify_dependency_type(SCHEMA_RESOURCE_ID, None), DependencyType::Schema);
        assert_eq!(classify_dependency_type("web-db", None), DependencyType::Resource);
        assert_eq!(classify_dependency_type("WebDb", None), DependencyType::External);
        assert_eq!(classify_dependency_type("1db", None), DependencyType::External);

        let known = HashSet::from(["WebDb".to_string()]);
        assert_eq!(classify_dependency_type("WebDb", Some(&known)), DependencyType::Resource);
        assert_eq!(classify_dependency_type("web-db", Some(&known)), DependencyType::External);
    }

    #[test]
    fn test_conditional_paths() {
        assert!(is_conditional_path("spec.when.value"));
        assert!(is_conditional_path("spec.enabledIf"));
        assert!(is_conditional_path("spec.createWhen"));
        assert!(is_conditional_path("spec.optionalSidecar.image"));
        assert!(is_conditional_path("spec.rules[0].condition"));
        assert!(!is_conditional_path("spec.replicas"));
        assert!(!is_conditional_path("spec.gif"));
    }

    #[test]
    fn test_readiness() {
        assert!(affects_readiness(&SymbolicReference::new("db", "status.podIP")));
        assert!(affects_readiness(&SymbolicReference::new("db", "spec.readyReplicas")));
        assert!(affects_readiness(&SymbolicReference::new("db", "spec.conditions[0]")));
        assert!(!affects_readiness(&SymbolicReference::new("db", "spec.image")));
    }

    #[test]
    fn test_required_precedence() {
        let options = TrackingOptions::default();
        let mut tracker = DependencyTracker::new();
        let refs = vec![
            SymbolicReference::schema("spec.name"),
            SymbolicReference::new("db", "status.podIP"),
            SymbolicReference::new("cfg", "data.flag"),
            SymbolicReference::new("cfg", "data.image"),
        ];
        let paths = vec![
            "spec.when.value".to_string(),
            "spec.optionalHost".to_string(),
            "spec.replicas".to_string(),
            "spec.optionalSidecar.image".to_string(),
        ];
        let infos = tracker.track("app", &refs, &paths, &options);
        let required: Vec<bool> = infos.iter().map(|i| i.required).collect();
        // schema wins over conditional, conditional wins over default, required name wins over conditional
        assert_eq!(required, vec![true, false, true, true]);

        let overridden = TrackingOptions {
            required: Some(false),
            ..TrackingOptions::default()
        };
        let infos = tracker.track("other", &refs[..1], &paths[..1], &overridden);
        assert!(!infos[0].required);
    }

    #[test]
    fn test_disabled_types_are_skipped() {
        let options = TrackingOptions {
            track_schema: false,
            track_external: false,
            ..TrackingOptions::default()
        };
        let mut tracker = DependencyTracker::new();
        let refs = vec![
            SymbolicReference::schema("spec.name"),
            SymbolicReference::new("ExternalThing", "status.x"),
            SymbolicReference::new("db", "status.podIP"),
        ];
        let infos = tracker.track("app", &refs, &[], &options);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].dependency_type, DependencyType::Resource);
        assert_eq!(infos[0].field_path, "");
    }

    #[test]
    fn test_track_resource_extracts_and_records() {
        let config: ConfigValue = serde_json::from_value(json!({
            "metadata": {"name": {"$ref": "schema.spec.name"}},
            "spec": {"host": {"$ref": {"resourceId": "db", "fieldPath": "status.podIP", "type": "string"}}}
        }))
        .unwrap();
        let mut tracker = DependencyTracker::new();
        let infos = tracker.track_resource("app", &config, &TrackingOptions::default()).unwrap();

        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].dependency_type, DependencyType::Schema);
        assert_eq!(infos[1].expected_type, TypeTag::String);
        assert_eq!(tracker.dependents_of("db"), &["app".to_string()]);

        // Re-tracking the same configuration adds nothing
        tracker.track_resource("app", &config, &TrackingOptions::default()).unwrap();
        assert_eq!(tracker.dependencies_of("app").len(), 2);
    }

    #[test]
    fn test_track_with_cycle_detection_and_order() {
        let options = TrackingOptions {
            detect_cycles: true,
            compute_order: true,
            ..TrackingOptions::default()
        };
        let mut tracker = DependencyTracker::new();
        tracker.track("a", &[SymbolicReference::new("b", "status.x")], &[], &options);
        assert!(tracker.graph().circular_chains().is_empty());
        assert_eq!(tracker.graph().deployment_order(), &["b".to_string(), "a".to_string()]);

        tracker.track("b", &[SymbolicReference::new("a", "status.x")], &[], &options);
        assert_eq!(tracker.graph().circular_chains().len(), 1);
    }
}
