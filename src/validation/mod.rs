//! Reference validation against known resource kinds.
//!
//! Validation never fails with an error value: every problem is reported in a
//! [`ValidationResult`] or a [`ReferenceValidationReport`] so callers can choose
//! to proceed on warnings while still refusing on errors.
//!
//! # Example
//!
//! ```rust
//! use refgraph_cli::references::SymbolicReference;
//! use refgraph_cli::validation::{ReferenceValidator, ValidationContext};
//!
//! let context = ValidationContext::new().with_resource("web", "Service");
//! let result = ReferenceValidator::validate(
//!     &SymbolicReference::new("web", "status.loadBalancer.ingress[0].ip"),
//!     &context,
//! );
//! assert!(result.valid);
//!
//! let missing = ReferenceValidator::validate(&SymbolicReference::new("webb", "spec.ports"), &context);
//! assert!(!missing.valid);
//! assert!(missing.error.unwrap().contains("Did you mean 'web'?"));
//! ```

pub mod patterns;

pub use patterns::{FieldPattern, MatchKind, match_field};

use indexmap::IndexMap;
use serde::Serialize;
use strsim::levenshtein;

use crate::references::{
    ConfigValue, FieldPath, SymbolicReference, TypeTag, extract::SymbolNode, extract::walk_symbols,
};
use crate::constants::MAX_TRAVERSAL_DEPTH;

/// Roots a resource reference may start at.
const RESOURCE_ROOTS: &[&str] = &["metadata", "spec", "status"];

/// Roots a schema reference may start at.
const SCHEMA_ROOTS: &[&str] = &["spec", "status"];

/// Maximum edit distance, as a percentage of the input length, for suggestions.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Whether a field of type `actual` can satisfy a reference declared `expected`.
///
/// `unknown` on either side is always compatible; otherwise the types must match.
pub fn types_compatible(expected: TypeTag, actual: TypeTag) -> bool {
    expected == TypeTag::Unknown || actual == TypeTag::Unknown || expected == actual
}

/// Resources a reference may point at, by id, with their kinds.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    pub available_resources: IndexMap<String, String>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_resource(mut self, id: impl Into<String>, kind: impl Into<String>) -> Self {
        self.available_resources.insert(id.into(), kind.into());
        self
    }

    pub fn kind_of(&self, id: &str) -> Option<&str> {
        self.available_resources.get(id).map(String::as_str)
    }
}

/// Outcome of validating one reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    /// Declared type, `unknown` when the reference declares none
    pub expected_type: TypeTag,
    /// Type inferred from the field-shape library
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_type: Option<TypeTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the path was only accepted by a permissive fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ValidationResult {
    fn ok(expected_type: TypeTag, actual_type: Option<TypeTag>) -> Self {
        Self {
            valid: true,
            expected_type,
            actual_type,
            error: None,
            warning: None,
        }
    }

    fn failed(expected_type: TypeTag, error: String) -> Self {
        Self {
            valid: false,
            expected_type,
            actual_type: None,
            error: Some(error),
            warning: None,
        }
    }
}

/// Aggregate validation of every reference in one resource configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Checks references for structural validity against known resource kinds.
pub struct ReferenceValidator;

impl ReferenceValidator {
    /// Validate one reference.
    pub fn validate(reference: &SymbolicReference, context: &ValidationContext) -> ValidationResult {
        let expected = reference.declared_type.unwrap_or_default();

        let path = match reference.parsed_path() {
            Ok(path) => path,
            Err(e) => return ValidationResult::failed(expected, e.to_string()),
        };

        if reference.is_schema() {
            return Self::validate_schema(reference, &path, expected);
        }

        let Some(kind) = context.kind_of(&reference.resource_id) else {
            let mut error = format!("Resource '{}' is not defined in this graph", reference.resource_id);
            let ids: Vec<&str> = context.available_resources.keys().map(String::as_str).collect();
            match closest(&reference.resource_id, &ids) {
                Some(suggestion) => error.push_str(&format!(". Did you mean '{suggestion}'?")),
                None if !ids.is_empty() => {
                    error.push_str(&format!(". Available resources: {}", ids.join(", ")));
                }
                None => {}
            }
            return ValidationResult::failed(expected, error);
        };

        let root = path.root_key().unwrap_or_default();
        if !RESOURCE_ROOTS.contains(&root) {
            return ValidationResult::failed(
                expected,
                format!(
                    "Field path '{}' on '{}' must start with metadata, spec or status",
                    reference.field_path, reference.resource_id
                ),
            );
        }

        let shape = path.shape();
        let Some(pattern) = match_field(&shape, Some(kind)) else {
            let mut error = format!("Unknown field '{}' on {kind} '{}'", reference.field_path, reference.resource_id);
            if let Some(suggestion) = closest(&shape, &patterns::known_fields(root)) {
                error.push_str(&format!(". Did you mean '{suggestion}'?"));
            }
            return ValidationResult::failed(expected, error);
        };

        if !types_compatible(expected, pattern.field_type) {
            return ValidationResult {
                valid: false,
                expected_type: expected,
                actual_type: Some(pattern.field_type),
                error: Some(format!(
                    "Reference '{reference}' is declared {expected} but the field is {}. Change the declared type or reference a {expected} field",
                    pattern.field_type
                )),
                warning: None,
            };
        }

        let mut result = ValidationResult::ok(expected, Some(pattern.field_type));
        if pattern.kind == MatchKind::Permissive {
            result.warning = Some(format!(
                "Field '{}' is not a known {kind} field; it will be checked at resolution time",
                reference.field_path
            ));
        }
        result
    }

    fn validate_schema(
        reference: &SymbolicReference,
        path: &FieldPath,
        expected: TypeTag,
    ) -> ValidationResult {
        let rooted = path.root_key().is_some_and(|root| SCHEMA_ROOTS.contains(&root));
        if rooted && path.segments().len() >= 2 {
            ValidationResult::ok(expected, None)
        } else {
            ValidationResult::failed(
                expected,
                format!(
                    "Schema reference '{reference}' must name a field under spec or status, e.g. schema.spec.name"
                ),
            )
        }
    }
}

/// Validate every reference and expression in `config`, owned by `resource_id`.
///
/// Invalid references and expressions that fail to parse are errors.
/// Permissive field matches, and a configuration with no references at all,
/// are warnings.
pub fn validate_resource_references(
    resource_id: &str,
    config: &ConfigValue,
    context: &ValidationContext,
) -> ReferenceValidationReport {
    let mut report = ReferenceValidationReport::default();
    let mut symbols = 0usize;

    let walked = walk_symbols(config, MAX_TRAVERSAL_DEPTH, &mut |location: &FieldPath, node: SymbolNode<'_>| {
        symbols += 1;
        let references = match node {
            SymbolNode::Reference(reference) => vec![reference.clone()],
            SymbolNode::Expression(expression) => {
                let validation = crate::expression::validate(&expression.expression);
                if let Some(error) = validation.error {
                    report.errors.push(format!(
                        "{resource_id} at '{location}': invalid expression '{}': {error}",
                        expression.expression
                    ));
                    return;
                }
                expression.references()
            }
        };
        for reference in references {
            let result = ReferenceValidator::validate(&reference, context);
            if let Some(error) = result.error {
                report.errors.push(format!("{resource_id} at '{location}': {error}"));
            }
            if let Some(warning) = result.warning {
                report.warnings.push(format!("{resource_id} at '{location}': {warning}"));
            }
        }
    });

    if let Err(e) = walked {
        report.errors.push(format!("{resource_id}: {e}"));
    } else if symbols == 0 {
        report.warnings.push(format!(
            "{resource_id} contains no references; its fields are static and bypass resolution"
        ));
    }

    report.is_valid = report.errors.is_empty();
    tracing::debug!(
        "Validated references of '{}': {} error(s), {} warning(s)",
        resource_id,
        report.errors.len(),
        report.warnings.len()
    );
    report
}

/// Closest candidate to `target` within the similarity threshold.
fn closest<'c>(target: &str, candidates: &[&'c str]) -> Option<&'c str> {
    let threshold = (target.len() * SIMILARITY_THRESHOLD_PERCENT / 100).max(1);
    candidates
        .iter()
        .map(|candidate| (*candidate, levenshtein(target, candidate)))
        .filter(|(_, distance)| *distance <= threshold)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}
