//! Resource-graph files.
//!
//! A graph file describes the resources to analyze, the input schema they may
//! reference, and optionally the resources already deployed. YAML and JSON are
//! both accepted; the format is chosen by extension, with YAML as the default
//! since every JSON document is also valid YAML.
//!
//! ```yaml
//! schema:
//!   spec: { name: web }
//! resources:
//!   database:
//!     kind: StatefulSet
//!     config:
//!       metadata: { name: { $ref: schema.spec.name } }
//!   app:
//!     kind: Deployment
//!     config:
//!       spec:
//!         env:
//!           - value: { $ref: database.status.podIP }
//! deployed:
//!   - id: database
//!     kind: StatefulSet
//!     manifest: { status: { podIP: 10.0.0.7 } }
//! ```

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::core::RefgraphError;
use crate::dependency::{DependencyTracker, TrackingOptions};
use crate::references::ConfigValue;
use crate::resolver::{DeployedResource, ResolutionContext};
use crate::validation::ValidationContext;

/// One resource of the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// Resource kind, e.g. `Deployment`
    pub kind: String,
    /// Authored configuration, possibly containing references and expressions
    #[serde(default)]
    pub config: ConfigValue,
}

/// Contents of a resource-graph file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphManifest {
    /// Input schema values addressed by `schema.` references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    /// Resources by logical id, in file order
    #[serde(default)]
    pub resources: IndexMap<String, ResourceDefinition>,
    /// Resources that already exist
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployed: Vec<DeployedResource>,
}

impl GraphManifest {
    /// Load a graph file, choosing the parser by extension.
    ///
    /// # Errors
    ///
    /// Returns [`RefgraphError::GraphFileNotFound`] for a missing file and
    /// [`RefgraphError::GraphFileParse`] for malformed content.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RefgraphError::GraphFileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read graph file {}", path.display()))?;

        let manifest = Self::parse(&content, is_json(path)).map_err(|reason| {
            RefgraphError::GraphFileParse {
                path: path.display().to_string(),
                reason,
            }
        })?;
        tracing::debug!(
            "Loaded {} resource(s) and {} deployed record(s) from {}",
            manifest.resources.len(),
            manifest.deployed.len(),
            path.display()
        );
        Ok(manifest)
    }

    /// Parse graph text.
    pub fn parse(content: &str, json: bool) -> Result<Self, String> {
        if json {
            serde_json::from_str(content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(content).map_err(|e| e.to_string())
        }
    }

    pub fn resource(&self, id: &str) -> Result<&ResourceDefinition, RefgraphError> {
        self.resources.get(id).ok_or_else(|| RefgraphError::ResourceNotFound {
            resource_id: id.to_string(),
            available: self.resources.keys().cloned().collect(),
        })
    }

    /// Track every resource in file order.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration is nested too deeply.
    pub fn track(&self, options: &TrackingOptions) -> Result<DependencyTracker, RefgraphError> {
        let mut tracker = DependencyTracker::new();
        for (id, resource) in &self.resources {
            tracker.track_resource(id, &resource.config, options)?;
        }
        tracker.graph_mut().refresh_derived();
        Ok(tracker)
    }

    /// Ids of every resource in the graph, for registry-mode tracking.
    pub fn resource_ids(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Validation context listing the graph's resources and deployed records.
    pub fn validation_context(&self) -> ValidationContext {
        let mut context = ValidationContext::new();
        for (id, resource) in &self.resources {
            context.available_resources.insert(id.clone(), resource.kind.clone());
        }
        for deployed in &self.deployed {
            context
                .available_resources
                .entry(deployed.id.clone())
                .or_insert_with(|| deployed.kind.clone());
        }
        context
    }

    /// Resolution context with the schema and deployed records.
    pub fn resolution_context(&self) -> ResolutionContext {
        let context = ResolutionContext::new().with_deployed(self.deployed.clone());
        match &self.schema {
            Some(schema) => context.with_schema(schema.clone()),
            None => context,
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
