//! Core error types and user-facing error reporting.
//!
//! Every failure that reaches the command line passes through
//! [`user_friendly_error`], which finds the crate's own error in the chain and
//! attaches details and a suggestion. Cycle detection and validation results are
//! not errors; they become [`RefgraphError`]s only when a command decides they
//! are fatal (for example `--strict`).

pub mod error;

pub use error::{ErrorContext, IntoAnyhowWithContext, RefgraphError, user_friendly_error};
