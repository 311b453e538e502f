//! Resolution failures.

use std::time::Duration;
use thiserror::Error;

use crate::expression::CelExpressionError;
use crate::references::{FieldPathError, SymbolicReference, TraversalError};

/// Failure reported by a [`LiveObjectFetcher`](super::LiveObjectFetcher).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The collaborator has no object with this id
    #[error("Resource '{resource_id}' was not found")]
    NotFound {
        /// The requested resource id
        resource_id: String,
    },

    /// Live lookup is not available for this resource
    #[error("Live lookup of '{resource_id}' is not implemented: {reason}")]
    NotImplemented {
        /// The requested resource id
        resource_id: String,
        /// What the caller must supply to make the lookup possible
        reason: String,
    },

    /// Any other collaborator failure
    #[error("Live lookup of '{resource_id}' failed: {message}")]
    Failed {
        /// The requested resource id
        resource_id: String,
        /// Collaborator message
        message: String,
    },
}

/// Why a single reference could not be resolved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReferenceFailure {
    /// The live-fetch collaborator failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The live-fetch collaborator did not answer in time
    #[error("Live lookup timed out after {after:?}")]
    Timeout {
        /// The timeout that elapsed
        after: Duration,
    },

    /// The reference's field path is malformed
    #[error(transparent)]
    InvalidFieldPath(#[from] FieldPathError),

    /// The object exists but the field does not
    #[error("Field '{field_path}' not found (resolved up to '{reached}', available: {})", render_keys(.available))]
    FieldNotFound {
        /// The requested path
        field_path: String,
        /// The deepest prefix that exists
        reached: String,
        /// Keys present at the deepest prefix
        available: Vec<String>,
    },

    /// A schema reference was resolved without an input schema
    #[error("No input schema was supplied for this resolution pass")]
    SchemaUnavailable,
}

fn render_keys(keys: &[String]) -> String {
    if keys.is_empty() {
        "none".to_string()
    } else {
        keys.join(", ")
    }
}

/// Error raised by [`ReferenceResolver`](super::ReferenceResolver).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolutionError {
    /// A reference's target resource or field could not be found
    #[error("Failed to resolve reference '{reference}': {cause}")]
    ReferenceResolution {
        /// The offending reference
        reference: SymbolicReference,
        /// The underlying cause
        #[source]
        cause: ReferenceFailure,
    },

    /// An expression failed to parse or evaluate
    #[error(transparent)]
    CelExpression(#[from] CelExpressionError),

    /// The configuration tree is too deep to walk
    #[error(transparent)]
    DepthExceeded(#[from] TraversalError),
}

impl ResolutionError {
    /// The resource id of the offending reference, for reference failures.
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            ResolutionError::ReferenceResolution {
                reference,
                ..
            } => Some(&reference.resource_id),
            _ => None,
        }
    }

    /// Whether the failure was a live-fetch timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ResolutionError::ReferenceResolution {
                cause: ReferenceFailure::Timeout { .. },
                ..
            }
        )
    }
}
