//! `refgraph resolve`: substitute references with concrete values.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::config::RefgraphConfig;
use crate::manifest::GraphManifest;
use crate::resolver::{ReferenceResolver, StaticFetcher};

/// Resolve the references in a graph's resources.
///
/// Deployed records in the graph file are consulted first; anything else is
/// looked up in the `--live` snapshot. Without a snapshot, references to
/// resources that are not deployed fail.
#[derive(Args, Debug)]
pub struct ResolveCommand {
    /// Resource-graph file (YAML or JSON)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Only resolve this resource
    #[arg(long, value_name = "ID")]
    pub resource: Option<String>,

    /// Snapshot of live objects: a YAML or JSON map of resource id to manifest
    #[arg(long, value_name = "FILE")]
    pub live: Option<PathBuf>,

    /// Print cache statistics to stderr
    #[arg(long)]
    pub stats: bool,
}

impl ResolveCommand {
    pub async fn execute(self, config: &RefgraphConfig) -> Result<()> {
        let manifest = GraphManifest::load(&self.file).await?;
        let ids: Vec<String> = match &self.resource {
            Some(id) => {
                manifest.resource(id)?;
                vec![id.clone()]
            }
            None => manifest.resources.keys().cloned().collect(),
        };

        let mut resolver = match &self.live {
            Some(path) => {
                let fetcher: StaticFetcher = super::load_value_map(path).await?.into_iter().collect();
                tracing::debug!("Loaded {} live object(s) from {}", fetcher.len(), path.display());
                ReferenceResolver::with_fetcher(fetcher)
            }
            None => ReferenceResolver::new(),
        }
        .with_options(config.resolver_options());

        let context = manifest.resolution_context();
        let mut output = Map::new();
        for id in ids {
            let resource = manifest.resource(&id)?;
            let resolved = resolver.resolve(&resource.config, &context).await?;
            output.insert(id, resolved.to_json());
        }

        let printed = match &self.resource {
            Some(id) => output.remove(id).unwrap_or(Value::Null),
            None => Value::Object(output),
        };
        println!("{}", serde_json::to_string_pretty(&printed)?);

        if self.stats {
            let stats = resolver.stats();
            eprintln!(
                "{} {} hit(s), {} miss(es), {} live fetch(es), {:.1}% hit rate",
                "Cache:".bold(),
                stats.hits,
                stats.misses,
                stats.live_fetches,
                stats.hit_rate()
            );
        }
        Ok(())
    }
}
