//! Unit test suite for refgraph
//!
//! Exercises the library API across module boundaries: tracking feeding cycle
//! analysis and ordering, resolution against deployed and live objects, and
//! expressions produced by the builders.
//!
//! # Running Unit Tests
//!
//! ```bash
//! cargo test --test unit
//! ```
//!
//! # Test Organization
//!
//! - **graph_analysis**: dependency tracking, cycles and deployment order
//! - **resolution**: reference and expression resolution
//! - **builders**: builder output evaluated by the expression engine
//! - **properties**: property-based checks of the graph algorithms

mod builders;
mod graph_analysis;
mod properties;
mod resolution;
