//! Command-line interface for refgraph.
//!
//! Every command reads a resource-graph file (see [`crate::manifest`]) or an
//! expression and reports on it:
//!
//! - `analyze` - dependencies, circular dependencies and deployment order
//! - `resolve` - substitute references against deployed and live objects
//! - `eval` - evaluate a single expression
//! - `validate` - check every reference against the resources of the graph
//!
//! Logging goes to stderr through `tracing`; `--verbose` enables debug output,
//! `--quiet` disables it, and `RUST_LOG` is honoured otherwise.

mod analyze;
mod eval;
mod resolve;
mod validate;

pub use analyze::AnalyzeCommand;
pub use eval::EvalCommand;
pub use resolve::ResolveCommand;
pub use validate::ValidateCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::config::RefgraphConfig;

/// Output format shared by the reporting commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with colors
    Text,
    /// Structured JSON for automation
    Json,
}

#[derive(Parser)]
#[command(
    name = "refgraph",
    about = "Discover, order and resolve references between infrastructure resources",
    version,
    long_about = "refgraph reads a graph of resources whose fields reference each other, reports circular dependencies, computes a deployment order, and resolves references against deployed resources."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable logging
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report dependencies, cycles and deployment order
    Analyze(AnalyzeCommand),
    /// Resolve references in a graph's resources
    Resolve(ResolveCommand),
    /// Evaluate an expression
    Eval(EvalCommand),
    /// Validate every reference in a graph
    Validate(ValidateCommand),
}

impl Cli {
    /// Initialise logging, load configuration and run the selected command.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();
        let config = RefgraphConfig::load(self.config.as_deref()).await?;
        tracing::debug!("Effective configuration: {:?}", config);

        match self.command {
            Commands::Analyze(cmd) => cmd.execute(&config).await,
            Commands::Resolve(cmd) => cmd.execute(&config).await,
            Commands::Eval(cmd) => cmd.execute(&config).await,
            Commands::Validate(cmd) => cmd.execute(&config).await,
        }
    }

    fn init_logging(&self) {
        let filter = if self.quiet {
            EnvFilter::new("off")
        } else if self.verbose {
            EnvFilter::new("refgraph_cli=debug,refgraph=debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Read a YAML or JSON file of named values, such as `--vars` or `--live`.
pub(crate) async fn load_value_map(path: &Path) -> Result<indexmap::IndexMap<String, Value>> {
    use anyhow::Context;

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let is_json = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let values = if is_json {
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?
    };
    Ok(values)
}
