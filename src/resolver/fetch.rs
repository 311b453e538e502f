//! Live-fetch collaborator.
//!
//! The resolver calls out to a [`LiveObjectFetcher`] only when a reference names
//! a resource that is not in the current deployed set. Discovering which kind
//! of object an id denotes is the integrator's job; the default
//! [`UnsupportedFetcher`] reports that with [`FetchError::NotImplemented`].

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::FetchError;
use crate::references::SymbolicReference;

/// Future returned by [`LiveObjectFetcher::fetch`].
pub type FetchFuture<'a> = BoxFuture<'a, Result<Value, FetchError>>;

/// Fetches the live manifest of a resource that is not in the deployed set.
pub trait LiveObjectFetcher: Send + Sync {
    /// Name used in log output.
    fn name(&self) -> &str;

    /// Fetch the full manifest of `reference.resource_id`.
    ///
    /// The resolver navigates `reference.field_path` itself; implementations
    /// return the whole object.
    fn fetch<'a>(&'a self, reference: &'a SymbolicReference) -> FetchFuture<'a>;
}

/// Fetcher used when no cluster integration is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedFetcher;

impl LiveObjectFetcher for UnsupportedFetcher {
    fn name(&self) -> &str {
        "unsupported"
    }

    fn fetch<'a>(&'a self, reference: &'a SymbolicReference) -> FetchFuture<'a> {
        Box::pin(async move {
            Err(FetchError::NotImplemented {
                resource_id: reference.resource_id.clone(),
                reason: "resolving a resource id to a kind requires a caller-supplied fetcher"
                    .to_string(),
            })
        })
    }
}

/// Fetcher backed by an in-memory snapshot of live objects.
///
/// Used for offline resolution from a file and in tests.
#[derive(Debug, Default, Clone)]
pub struct StaticFetcher {
    objects: HashMap<String, Value>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object, returning the fetcher.
    #[must_use]
    pub fn with_object(mut self, resource_id: impl Into<String>, manifest: Value) -> Self {
        self.objects.insert(resource_id.into(), manifest);
        self
    }

    pub fn insert(&mut self, resource_id: impl Into<String>, manifest: Value) {
        self.objects.insert(resource_id.into(), manifest);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl FromIterator<(String, Value)> for StaticFetcher {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}

impl LiveObjectFetcher for StaticFetcher {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch<'a>(&'a self, reference: &'a SymbolicReference) -> FetchFuture<'a> {
        Box::pin(async move {
            self.objects.get(&reference.resource_id).cloned().ok_or_else(|| FetchError::NotFound {
                resource_id: reference.resource_id.clone(),
            })
        })
    }
}

impl<T: LiveObjectFetcher + ?Sized> LiveObjectFetcher for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch<'a>(&'a self, reference: &'a SymbolicReference) -> FetchFuture<'a> {
        (**self).fetch(reference)
    }
}
