//! Library of known Kubernetes field shapes.
//!
//! Paths are matched by shape, with every index replaced by `[n]`
//! (see [`FieldPath::shape`](crate::references::FieldPath::shape)). Lookup tries
//! exact entries first, then pattern families, then the permissive fallbacks for
//! plausible but unrecognized `spec.*` and `status.*` paths.

use regex::Regex;
use std::sync::OnceLock;

use crate::references::TypeTag;

/// How a field shape was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// A specific well-known field
    Exact,
    /// A member of a known family such as `status.conditions[n].type`
    Family,
    /// A plausible path under `spec` or `status` with no known type
    Permissive,
}

/// One entry of the library.
#[derive(Debug, Clone, Copy)]
pub struct FieldPattern {
    /// Shape for exact entries, regex source for the others
    pub pattern: &'static str,
    pub kind: MatchKind,
    /// Type of the field when it matches
    pub field_type: TypeTag,
    /// Resource kinds the entry applies to; empty means every kind
    pub kinds: &'static [&'static str],
}

impl FieldPattern {
    const fn exact(pattern: &'static str, field_type: TypeTag) -> Self {
        Self {
            pattern,
            kind: MatchKind::Exact,
            field_type,
            kinds: &[],
        }
    }

    const fn scoped(
        pattern: &'static str,
        field_type: TypeTag,
        kinds: &'static [&'static str],
    ) -> Self {
        Self {
            pattern,
            kind: MatchKind::Exact,
            field_type,
            kinds,
        }
    }

    const fn family(pattern: &'static str, field_type: TypeTag) -> Self {
        Self {
            pattern,
            kind: MatchKind::Family,
            field_type,
            kinds: &[],
        }
    }

    /// Whether the entry applies to `kind`. An unknown kind matches every entry.
    pub fn applies_to(&self, kind: Option<&str>) -> bool {
        match kind {
            Some(kind) if !self.kinds.is_empty() => {
                self.kinds.iter().any(|k| k.eq_ignore_ascii_case(kind))
            }
            _ => true,
        }
    }
}

const WORKLOADS: &[&str] = &["Deployment", "StatefulSet", "ReplicaSet", "DaemonSet"];
const SERVICES: &[&str] = &["Service"];

/// Well-known individual fields.
pub const EXACT_FIELDS: &[FieldPattern] = &[
    FieldPattern::exact("metadata.name", TypeTag::String),
    FieldPattern::exact("metadata.namespace", TypeTag::String),
    FieldPattern::exact("metadata.uid", TypeTag::String),
    FieldPattern::exact("metadata.resourceVersion", TypeTag::String),
    FieldPattern::exact("metadata.generation", TypeTag::Integer),
    FieldPattern::exact("metadata.creationTimestamp", TypeTag::String),
    FieldPattern::exact("metadata.labels", TypeTag::Object),
    FieldPattern::exact("metadata.annotations", TypeTag::Object),
    FieldPattern::exact("metadata.ownerReferences", TypeTag::Array),
    FieldPattern::scoped("spec.replicas", TypeTag::Integer, WORKLOADS),
    FieldPattern::scoped("spec.selector", TypeTag::Object, WORKLOADS),
    FieldPattern::scoped("spec.template", TypeTag::Object, WORKLOADS),
    FieldPattern::scoped("spec.serviceName", TypeTag::String, &["StatefulSet"]),
    FieldPattern::scoped("spec.clusterIP", TypeTag::String, SERVICES),
    FieldPattern::scoped("spec.type", TypeTag::String, SERVICES),
    FieldPattern::scoped("spec.ports", TypeTag::Array, SERVICES),
    FieldPattern::exact("status.phase", TypeTag::String),
    FieldPattern::exact("status.podIP", TypeTag::String),
    FieldPattern::exact("status.hostIP", TypeTag::String),
    FieldPattern::exact("status.replicas", TypeTag::Integer),
    FieldPattern::exact("status.readyReplicas", TypeTag::Integer),
    FieldPattern::exact("status.availableReplicas", TypeTag::Integer),
    FieldPattern::exact("status.updatedReplicas", TypeTag::Integer),
    FieldPattern::exact("status.observedGeneration", TypeTag::Integer),
    FieldPattern::exact("status.conditions", TypeTag::Array),
    FieldPattern::exact("status.ready", TypeTag::Boolean),
    FieldPattern::exact("status.clusterIP", TypeTag::String),
    FieldPattern::exact("status.loadBalancer", TypeTag::Object),
    FieldPattern::exact("status.loadBalancer.ingress", TypeTag::Array),
];

/// Field families matched by regex.
pub const FIELD_FAMILIES: &[FieldPattern] = &[
    FieldPattern::family(
        r"^status\.conditions\[n\]\.(type|status|reason|message|lastTransitionTime)$",
        TypeTag::String,
    ),
    FieldPattern::family(r"^status\.loadBalancer\.ingress\[n\]\.(ip|hostname)$", TypeTag::String),
    FieldPattern::family(r"^status\.loadBalancer\.ingress\[n\]$", TypeTag::Object),
    FieldPattern::family(r"^spec\.ports\[n\]\.(port|nodePort)$", TypeTag::Integer),
    // int-or-string: a port number or a named container port
    FieldPattern::family(r"^spec\.ports\[n\]\.targetPort$", TypeTag::Unknown),
    FieldPattern::family(r"^spec\.ports\[n\]\.(name|protocol)$", TypeTag::String),
    FieldPattern::family(r"^metadata\.(labels|annotations)\.[^.\[]+$", TypeTag::String),
    FieldPattern::family(
        r"^spec\.(template\.spec\.)?containers\[n\]\.(name|image)$",
        TypeTag::String,
    ),
    FieldPattern::family(r"^status\.containerStatuses\[n\]\.ready$", TypeTag::Boolean),
    FieldPattern::family(r"^status\.containerStatuses\[n\]\.restartCount$", TypeTag::Integer),
];

/// Fallbacks for unrecognized paths under `spec` and `status`.
pub const PERMISSIVE_FIELDS: &[FieldPattern] = &[
    FieldPattern {
        pattern: r"^spec[.\[]",
        kind: MatchKind::Permissive,
        field_type: TypeTag::Unknown,
        kinds: &[],
    },
    FieldPattern {
        pattern: r"^status[.\[]",
        kind: MatchKind::Permissive,
        field_type: TypeTag::Unknown,
        kinds: &[],
    },
];

fn compiled(patterns: &'static [FieldPattern]) -> Vec<(FieldPattern, Regex)> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern.pattern) {
            Ok(regex) => Some((*pattern, regex)),
            Err(e) => {
                tracing::warn!("Skipping invalid field pattern '{}': {}", pattern.pattern, e);
                None
            }
        })
        .collect()
}

fn families() -> &'static [(FieldPattern, Regex)] {
    static FAMILIES: OnceLock<Vec<(FieldPattern, Regex)>> = OnceLock::new();
    FAMILIES.get_or_init(|| compiled(FIELD_FAMILIES))
}

fn permissive() -> &'static [(FieldPattern, Regex)] {
    static PERMISSIVE: OnceLock<Vec<(FieldPattern, Regex)>> = OnceLock::new();
    PERMISSIVE.get_or_init(|| compiled(PERMISSIVE_FIELDS))
}

/// Find the library entry for a path shape on a resource of `kind`.
pub fn match_field(shape: &str, kind: Option<&str>) -> Option<FieldPattern> {
    if let Some(exact) =
        EXACT_FIELDS.iter().find(|p| p.pattern == shape && p.applies_to(kind))
    {
        return Some(*exact);
    }
    for (pattern, regex) in families() {
        if pattern.applies_to(kind) && regex.is_match(shape) {
            return Some(*pattern);
        }
    }
    permissive().iter().find(|(_, regex)| regex.is_match(shape)).map(|(pattern, _)| *pattern)
}

/// Exact field shapes under `root`, used for suggestions.
pub fn known_fields(root: &str) -> Vec<&'static str> {
    EXACT_FIELDS
        .iter()
        .map(|p| p.pattern)
        .filter(|p| p.split('.').next() == Some(root))
        .collect()
}
