//! `refgraph eval`: evaluate one expression.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::RefgraphConfig;
use crate::expression::{self, EvalContext};

/// Evaluate an expression against optional variables.
#[derive(Args, Debug)]
pub struct EvalCommand {
    /// Expression to evaluate, e.g. `concat("http://", svc.status.clusterIP)`
    #[arg(value_name = "EXPR")]
    pub expression: String,

    /// Variables: a YAML or JSON map of name to value
    #[arg(long, value_name = "FILE")]
    pub vars: Option<PathBuf>,

    /// Only check that the expression parses
    #[arg(long)]
    pub check: bool,

    /// List the references the expression reads instead of evaluating it
    #[arg(long, conflicts_with = "check")]
    pub references: bool,
}

impl EvalCommand {
    pub async fn execute(self, _config: &RefgraphConfig) -> Result<()> {
        let compiled = expression::parse(&self.expression)?;

        if self.check {
            println!("{} Expression is valid", "✓".green());
            return Ok(());
        }

        if self.references {
            for reference in compiled.references() {
                println!("{reference}");
            }
            return Ok(());
        }

        let mut context = EvalContext::new();
        if let Some(path) = &self.vars {
            for (name, value) in super::load_value_map(path).await? {
                context.bind(name, value);
            }
        }

        let value = compiled.evaluate(&context)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        Ok(())
    }
}
