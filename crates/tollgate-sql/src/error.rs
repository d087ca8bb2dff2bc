//! Error types for SQL analysis.

use thiserror::Error;

/// Errors that can occur while parsing or classifying a statement.
#[derive(Debug, Error)]
pub enum SqlError {
    /// The SQL text could not be parsed.
    #[error("failed to parse SQL: {0}")]
    Parse(String),

    /// The input did not contain exactly one top-level statement.
    ///
    /// Multi-statement input is rejected deliberately: it is a classic
    /// bypass vector for statement-type filters ("SELECT 1; DROP TABLE t").
    #[error("expected exactly one SQL statement, found {count}")]
    MultiStatement { count: usize },
}
