//! Sample graph files and collaborators for tests.

use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::references::SymbolicReference;
use crate::resolver::{FetchError, FetchFuture, LiveObjectFetcher};

/// A resource-graph file used by tests.
#[derive(Clone, Debug)]
pub struct GraphFixture {
    pub content: String,
    pub name: String,
}

impl GraphFixture {
    /// `a` depends on `b`, `b` depends on `c`.
    pub fn chain() -> Self {
        Self {
            name: "chain".to_string(),
            content: r#"
resources:
  a:
    kind: Deployment
    config:
      spec:
        host: { $ref: b.status.clusterIP }
  b:
    kind: Service
    config:
      spec:
        selector: { $ref: c.metadata.name }
  c:
    kind: Deployment
    config:
      metadata: { name: backend }
"#
            .trim()
            .to_string(),
        }
    }

    /// `a` and `b` read each other's status.
    pub fn cycle() -> Self {
        Self {
            name: "cycle".to_string(),
            content: r#"
resources:
  a:
    kind: Deployment
    config:
      spec:
        peer: { $ref: b.status.podIP }
  b:
    kind: Deployment
    config:
      spec:
        peer: { $ref: a.status.podIP }
"#
            .trim()
            .to_string(),
        }
    }

    /// Schema input, a deployed service and an ingress built from it.
    pub fn web() -> Self {
        Self {
            name: "web".to_string(),
            content: r#"
schema:
  spec: { name: shop }
resources:
  svc:
    kind: Service
    config:
      metadata:
        name: { $ref: schema.spec.name }
  ingress:
    kind: Ingress
    config:
      spec:
        backend: { $cel: 'concat("http://", svc.status.clusterIP)' }
        address: { $ref: 'svc.status.loadBalancer.ingress[0].ip' }
deployed:
  - id: svc
    kind: Service
    manifest:
      metadata: { name: shop }
      status:
        clusterIP: 10.0.0.1
        loadBalancer:
          ingress:
            - ip: 1.2.3.4
"#
            .trim()
            .to_string(),
        }
    }

    /// A reference to a misspelled resource and an unparsable expression.
    pub fn invalid() -> Self {
        Self {
            name: "invalid".to_string(),
            content: r#"
resources:
  web:
    kind: Deployment
    config:
      spec:
        replicas: 2
  app:
    kind: Deployment
    config:
      spec:
        upstream: { $ref: webb.status.podIP }
        url: { $cel: 'concat("http://", ' }
"#
            .trim()
            .to_string(),
        }
    }

    /// Write as `<name>.yaml` into `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(format!("{}.yaml", self.name));
        fs::write(&path, &self.content)?;
        Ok(path)
    }
}

/// Live-object fetcher that serves fixed objects and counts every call.
#[derive(Debug, Default)]
pub struct CountingFetcher {
    objects: HashMap<String, Value>,
    calls: AtomicUsize,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_object(mut self, resource_id: impl Into<String>, manifest: Value) -> Self {
        self.objects.insert(resource_id.into(), manifest);
        self
    }

    /// Number of fetches made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LiveObjectFetcher for CountingFetcher {
    fn name(&self) -> &str {
        "counting"
    }

    fn fetch<'a>(&'a self, reference: &'a SymbolicReference) -> FetchFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            self.objects.get(&reference.resource_id).cloned().ok_or_else(|| {
                FetchError::NotFound {
                    resource_id: reference.resource_id.clone(),
                }
            })
        })
    }
}
