//! refgraph CLI entry point
//!
//! Parses arguments, runs the selected command and renders failures with
//! details and suggestions:
//! - `analyze` - dependencies, cycles and deployment order of a graph
//! - `resolve` - substitute references with concrete values
//! - `eval` - evaluate an expression
//! - `validate` - check every reference in a graph

use anyhow::Result;
use clap::Parser;
use refgraph_cli::cli;
use refgraph_cli::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
