//! Error handling for refgraph
//!
//! Library operations return their own typed errors ([`ResolutionError`],
//! [`CelExpressionError`], [`TraversalError`]); [`RefgraphError`] collects them
//! together with the file and configuration failures of the command-line
//! surface. At the CLI boundary errors travel as [`anyhow::Error`] and are
//! rendered through [`user_friendly_error`], which attaches details and an
//! actionable suggestion.
//!
//! # Examples
//!
//! ```rust,no_run
//! use refgraph_cli::core::{RefgraphError, user_friendly_error};
//!
//! let error = RefgraphError::ResourceNotFound {
//!     resource_id: "databse".to_string(),
//!     available: vec!["database".to_string()],
//! };
//! user_friendly_error(anyhow::Error::from(error)).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::expression::CelExpressionError;
use crate::references::TraversalError;
use crate::resolver::{ReferenceFailure, ResolutionError};

/// Top-level error type.
#[derive(Error, Debug)]
pub enum RefgraphError {
    /// The resource-graph file does not exist
    #[error("Graph file not found: {path}")]
    GraphFileNotFound {
        /// Path that was looked up
        path: String,
    },

    /// The resource-graph file could not be parsed
    #[error("Invalid graph file {path}: {reason}")]
    GraphFileParse {
        /// Path of the file
        path: String,
        /// Parser message
        reason: String,
    },

    /// The configuration file could not be parsed
    #[error("Invalid configuration file {path}: {reason}")]
    ConfigParse {
        /// Path of the file
        path: String,
        /// Parser message
        reason: String,
    },

    /// A resource id given on the command line is not in the graph
    #[error("Resource '{resource_id}' is not defined in the graph")]
    ResourceNotFound {
        /// The requested id
        resource_id: String,
        /// Ids that are defined
        available: Vec<String>,
    },

    /// Resources depend on each other in a loop
    #[error("Circular dependency detected: {chain}")]
    CircularDependency {
        /// Resources involved, joined for display
        chain: String,
    },

    /// Validation found invalid references
    #[error("{count} invalid reference(s) found")]
    InvalidReferences {
        /// Number of errors reported
        count: usize,
    },

    /// Reference or expression resolution failed
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A standalone expression failed
    #[error(transparent)]
    Expression(#[from] CelExpressionError),

    /// A configuration tree was nested too deeply
    #[error(transparent)]
    Traversal(#[from] TraversalError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Anything else
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl Clone for RefgraphError {
    fn clone(&self) -> Self {
        match self {
            Self::GraphFileNotFound {
                path,
            } => Self::GraphFileNotFound {
                path: path.clone(),
            },
            Self::GraphFileParse {
                path,
                reason,
            } => Self::GraphFileParse {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::ConfigParse {
                path,
                reason,
            } => Self::ConfigParse {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::ResourceNotFound {
                resource_id,
                available,
            } => Self::ResourceNotFound {
                resource_id: resource_id.clone(),
                available: available.clone(),
            },
            Self::CircularDependency {
                chain,
            } => Self::CircularDependency {
                chain: chain.clone(),
            },
            Self::InvalidReferences {
                count,
            } => Self::InvalidReferences {
                count: *count,
            },
            Self::Resolution(e) => Self::Resolution(e.clone()),
            Self::Expression(e) => Self::Expression(e.clone()),
            Self::Traversal(e) => Self::Traversal(e.clone()),
            // For errors that don't implement Clone, convert to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::JsonError(e) => Self::Other {
                message: format!("JSON error: {e}"),
            },
            Self::YamlError(e) => Self::Other {
                message: format!("YAML error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error wrapper carrying user-facing details and a suggestion.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: RefgraphError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: RefgraphError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print to stderr: error in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

/// Convert any error into a user-friendly format with contextual suggestions.
///
/// The error chain is searched for the crate's own error types first; anything
/// else is reported as-is with its chain as details.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let mut current: &dyn std::error::Error = error.as_ref();
    loop {
        if let Some(refgraph_error) = current.downcast_ref::<RefgraphError>() {
            return create_error_context(refgraph_error.clone());
        }
        if let Some(resolution) = current.downcast_ref::<ResolutionError>() {
            return create_error_context(RefgraphError::Resolution(resolution.clone()));
        }
        if let Some(expression) = current.downcast_ref::<CelExpressionError>() {
            return create_error_context(RefgraphError::Expression(expression.clone()));
        }
        match current.source() {
            Some(source) => current = source,
            None => break,
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::NotFound {
            return ErrorContext::new(RefgraphError::Other {
                message: error.to_string(),
            })
            .with_suggestion("Check that the file exists and the path is correct");
        }
    }

    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    let context = ErrorContext::new(RefgraphError::Other {
        message: error.to_string(),
    });
    if chain.is_empty() {
        context
    } else {
        context.with_details(chain.join(": "))
    }
}

fn create_error_context(error: RefgraphError) -> ErrorContext {
    match &error {
        RefgraphError::GraphFileNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Pass the path of a YAML or JSON resource-graph file"),

        RefgraphError::GraphFileParse {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("A graph file has a 'resources' map of {kind, config} entries and optional 'schema' and 'deployed' sections")
            .with_details("References are written as {$ref: id.field.path}; expressions as {$expr: '...'}"),

        RefgraphError::ConfigParse {
            path,
            ..
        } => {
            let suggestion = format!("Fix the TOML syntax in {path} or remove the file to use defaults");
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        RefgraphError::ResourceNotFound {
            available,
            ..
        } => {
            let details = if available.is_empty() {
                "The graph defines no resources".to_string()
            } else {
                format!("Defined resources: {}", available.join(", "))
            };
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Use one of the resource ids defined under 'resources'")
        }

        RefgraphError::CircularDependency {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run 'refgraph analyze' to see break points, or make one dependency in the cycle optional or conditional")
            .with_details("Resources in a cycle cannot be ordered for deployment"),

        RefgraphError::InvalidReferences {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Fix the reported references; warnings alone do not fail validation unless --strict is set"),

        RefgraphError::Resolution(resolution) => {
            let suggestion = match resolution {
                ResolutionError::ReferenceResolution {
                    cause: ReferenceFailure::Timeout {
                        ..
                    },
                    ..
                } => "The live object lookup timed out; raise [resolver] fetch_timeout_secs in the configuration",
                ResolutionError::ReferenceResolution {
                    cause: ReferenceFailure::FieldNotFound {
                        ..
                    },
                    ..
                } => "Check the field path against the referenced resource's manifest",
                ResolutionError::ReferenceResolution {
                    ..
                } => "Add the resource to 'deployed' or supply its live object with --live",
                ResolutionError::CelExpression(_) => {
                    "Check the expression with 'refgraph eval' and the variables it references"
                }
                ResolutionError::DepthExceeded(_) => "Flatten the configuration or raise [resolver] max_depth",
            };
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        RefgraphError::Expression(_) => ErrorContext::new(error)
            .with_suggestion("Bind the variables the expression uses with --vars"),

        RefgraphError::YamlError(_) | RefgraphError::JsonError(_) => ErrorContext::new(error)
            .with_suggestion("Check the file syntax"),

        _ => ErrorContext::new(error),
    }
}

/// Attach a user-facing context to an error and convert it to [`anyhow::Error`].
pub trait IntoAnyhowWithContext<T> {
    fn with_refgraph_context(self, message: impl Into<String>) -> anyhow::Result<T>;
}

impl<T, E> IntoAnyhowWithContext<T> for Result<T, E>
where
    E: Into<RefgraphError>,
{
    fn with_refgraph_context(self, message: impl Into<String>) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::Error::from(e.into()).context(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::SymbolicReference;
    use crate::resolver::FetchError;

    #[test]
    fn test_error_display() {
        let error = RefgraphError::CircularDependency {
            chain: "a → b → a".to_string(),
        };
        assert_eq!(error.to_string(), "Circular dependency detected: a → b → a");
    }

    #[test]
    fn test_clone_converts_io_errors() {
        let error = RefgraphError::IoError(std::io::Error::other("disk full"));
        assert!(matches!(error.clone(), RefgraphError::Other { ref message } if message.contains("disk full")));
    }

    #[test]
    fn test_user_friendly_resource_not_found() {
        let error = RefgraphError::ResourceNotFound {
            resource_id: "databse".to_string(),
            available: vec!["database".to_string(), "app".to_string()],
        };
        let ctx = user_friendly_error(error.into());
        assert_eq!(ctx.details.as_deref(), Some("Defined resources: database, app"));
        assert!(ctx.suggestion.is_some());
    }

    #[test]
    fn test_user_friendly_finds_resolution_error_in_chain() {
        let resolution = ResolutionError::ReferenceResolution {
            reference: SymbolicReference::new("missing", "status.ready"),
            cause: ReferenceFailure::Fetch(FetchError::NotFound {
                resource_id: "missing".to_string(),
            }),
        };
        let error = anyhow::Error::from(resolution).context("Failed to resolve app");
        let ctx = user_friendly_error(error);
        assert!(matches!(ctx.error, RefgraphError::Resolution(_)));
        assert!(ctx.to_string().contains("missing"));
        assert!(ctx.suggestion.unwrap().contains("--live"));
    }

    #[test]
    fn test_user_friendly_plain_error() {
        let error = anyhow::anyhow!("inner").context("outer");
        let ctx = user_friendly_error(error);
        assert_eq!(ctx.error.to_string(), "outer");
        assert_eq!(ctx.details.as_deref(), Some("inner"));
    }

    #[test]
    fn test_with_refgraph_context() {
        let result: Result<(), TraversalError> = Err(TraversalError::DepthExceeded {
            location: "spec".to_string(),
            limit: 1,
        });
        let err = result.with_refgraph_context("Failed to scan app").unwrap_err();
        assert_eq!(err.to_string(), "Failed to scan app");
        assert!(user_friendly_error(err).error.to_string().contains("nesting"));
    }
}
