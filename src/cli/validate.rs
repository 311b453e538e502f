//! `refgraph validate`: check every reference in a graph.
//!
//! Each reference must name a resource of the graph (or a deployed record),
//! address a known field of it, and agree with that field's type. Expressions
//! must parse. With `--strict`, or `strict = true` under `[validation]`,
//! warnings fail the command too.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::PathBuf;

use super::OutputFormat;
use crate::config::RefgraphConfig;
use crate::core::RefgraphError;
use crate::manifest::GraphManifest;
use crate::validation::{ReferenceValidationReport, validate_resource_references};

/// Validate the references of a resource graph.
#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// Resource-graph file (YAML or JSON)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Aggregated validation outcome, used for JSON output.
#[derive(Debug, Default, Serialize)]
pub struct ValidationSummary {
    pub valid: bool,
    pub strict: bool,
    pub resources: IndexMap<String, ReferenceValidationReport>,
    pub errors: usize,
    pub warnings: usize,
}

impl ValidateCommand {
    pub async fn execute(self, config: &RefgraphConfig) -> Result<()> {
        let manifest = GraphManifest::load(&self.file).await?;
        let context = manifest.validation_context();
        let strict = self.strict || config.validation.strict;

        let mut summary = ValidationSummary {
            strict,
            ..ValidationSummary::default()
        };
        for (id, resource) in &manifest.resources {
            let report = validate_resource_references(id, &resource.config, &context);
            summary.errors += report.errors.len();
            summary.warnings += report.warnings.len();
            summary.resources.insert(id.clone(), report);
        }
        let failures = if strict {
            summary.errors + summary.warnings
        } else {
            summary.errors
        };
        summary.valid = failures == 0;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            OutputFormat::Text => print_summary(&summary),
        }

        if failures > 0 {
            return Err(RefgraphError::InvalidReferences {
                count: failures,
            }
            .into());
        }
        Ok(())
    }
}

fn print_summary(summary: &ValidationSummary) {
    for report in summary.resources.values() {
        for error in &report.errors {
            println!("{} {}", "✗".red(), error);
        }
        for warning in &report.warnings {
            println!("{} {}", "⚠".yellow(), warning);
        }
    }

    if summary.valid {
        println!(
            "{} {} resource(s) validated ({} warning(s))",
            "✓".green(),
            summary.resources.len(),
            summary.warnings
        );
    } else {
        println!(
            "{} Validation failed: {} error(s), {} warning(s){}",
            "✗".red(),
            summary.errors,
            summary.warnings,
            if summary.strict {
                " (strict)"
            } else {
                ""
            }
        );
    }
}
