//! Test utilities for refgraph
//!
//! Shared by unit tests and the `tests/` suites (through the `test-utils`
//! feature): logging setup, sample graph files and a live-object fetcher that
//! counts its calls.
//!
//! # Example
//!
//! ```rust,no_run
//! use refgraph_cli::test_utils::{CountingFetcher, GraphFixture};
//! use serde_json::json;
//!
//! let dir = tempfile::TempDir::new().unwrap();
//! let path = GraphFixture::chain().write_to(dir.path()).unwrap();
//!
//! let fetcher = CountingFetcher::new().with_object("svc", json!({"status": {}}));
//! assert_eq!(fetcher.calls(), 0);
//! ```

pub mod fixtures;

pub use fixtures::{CountingFetcher, GraphFixture};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. The given level wins; otherwise
/// `RUST_LOG` is used, and without either nothing is logged.
///
/// ```bash
/// RUST_LOG=refgraph_cli=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
