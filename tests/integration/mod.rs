//! Integration test suite for refgraph
//!
//! End-to-end tests that run the `refgraph` binary against graph files written
//! to temporary directories.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **analyze**: dependency report, ordering, cycles and `--strict`
//! - **resolve**: resolution from deployed records and live snapshots
//! - **eval**: expression evaluation and syntax checks
//! - **validate**: reference validation and error reporting

mod common;

mod analyze;
mod eval;
mod resolve;
mod validate;
