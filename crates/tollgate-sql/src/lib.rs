//! # tollgate-sql
//!
//! SQL parsing and analysis for Tollgate.
//!
//! This crate provides the syntax-level half of the authorization pipeline:
//! - Parse SQL using `sqlparser` (MySQL dialect), enforcing exactly one
//!   statement per call
//! - Classify the statement kind (select, insert, update, ...)
//! - Extract every table reference in the statement tree
//! - Detect output-redirecting select forms (`INTO OUTFILE`/`INTO DUMPFILE`)
//!
//! Everything here is pure: no I/O, no caches, no session state. Parse
//! failures and multi-statement input are errors, never silent passes;
//! the policy layer treats them as denials.

pub mod analyzer;
pub mod error;

pub use analyzer::{SqlAnalyzer, StatementKind, TableRef, redirects_output};
pub use error::SqlError;

// Re-export the AST statement type so downstream crates can hold parsed
// statements without depending on sqlparser directly.
pub use sqlparser::ast::Statement;
