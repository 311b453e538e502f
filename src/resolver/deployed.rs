//! Records of resources that already exist in the target system.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

/// The runtime record of a deployed resource.
///
/// Owned by the deployment engine; the resolver only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedResource {
    /// Logical id used by references
    pub id: String,
    /// Resource kind, e.g. `Deployment`
    pub kind: String,
    /// Object name in the target system
    #[serde(default)]
    pub name: String,
    /// Object namespace
    #[serde(default)]
    pub namespace: Option<String>,
    /// Full manifest as last observed
    #[serde(default)]
    pub manifest: Value,
    /// Observed status, when reported separately from the manifest
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub status: Value,
}

impl DeployedResource {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, manifest: Value) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind: kind.into(),
            namespace: None,
            manifest,
            status: Value::Null,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: Value) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// The manifest as seen by references and expressions.
    ///
    /// A separately reported status is merged in under `status` when the
    /// manifest has none of its own.
    pub fn view(&self) -> Cow<'_, Value> {
        let manifest_has_status = self.manifest.get("status").is_some_and(|s| !s.is_null());
        match (&self.manifest, &self.status) {
            (Value::Object(map), status) if !status.is_null() && !manifest_has_status => {
                let mut merged = map.clone();
                merged.insert("status".to_string(), status.clone());
                Cow::Owned(Value::Object(merged))
            }
            _ => Cow::Borrowed(&self.manifest),
        }
    }
}
