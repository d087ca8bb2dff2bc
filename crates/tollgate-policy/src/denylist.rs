//! Denylist evaluation.

use serde::Serialize;

use tollgate_core::config::permissions::{DenylistEntry, normalize_identifier};
use tollgate_sql::{SqlAnalyzer, Statement, TableRef};

/// The outcome of evaluating one statement against the denylist.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyDecision {
    /// Whether the statement is blocked.
    pub blocked: bool,
    /// Human-readable reason, present when blocked.
    pub reason: Option<String>,
}

impl PolicyDecision {
    fn allowed() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }

    fn blocked(reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.into()),
        }
    }
}

/// Evaluates statements against a configured table denylist.
#[derive(Clone)]
pub struct DenylistPolicy {
    entries: Vec<DenylistEntry>,
    default_schema: Option<String>,
    multi_schema: bool,
    analyzer: SqlAnalyzer,
}

impl DenylistPolicy {
    /// Create a policy from the configuration snapshot values.
    pub fn new(
        entries: Vec<DenylistEntry>,
        default_schema: Option<String>,
        multi_schema: bool,
    ) -> Self {
        Self {
            entries,
            default_schema: default_schema
                .map(|schema| normalize_identifier(&schema))
                .filter(|schema| !schema.is_empty()),
            multi_schema,
            analyzer: SqlAnalyzer::new(),
        }
    }

    /// Evaluate raw SQL text.
    ///
    /// With an empty denylist this returns not-blocked without parsing.
    /// SQL that cannot be parsed (or is not a single statement) is blocked:
    /// a statement whose table references cannot be determined must not run.
    pub fn evaluate(&self, sql: &str) -> PolicyDecision {
        if self.entries.is_empty() {
            return PolicyDecision::allowed();
        }
        match self.analyzer.parse_one(sql) {
            Ok(statement) => self.evaluate_statement(&statement),
            Err(e) => PolicyDecision::blocked(format!("cannot verify table access: {e}")),
        }
    }

    /// Evaluate an already-parsed statement.
    pub fn evaluate_statement(&self, statement: &Statement) -> PolicyDecision {
        if self.entries.is_empty() {
            return PolicyDecision::allowed();
        }

        let tables = self.analyzer.extract_tables(statement);
        for table in &tables {
            let resolved_schema = match (&table.schema, self.multi_schema) {
                (Some(schema), _) => Some(schema.as_str()),
                (None, true) => {
                    // No session state is tracked across calls, so an
                    // unqualified name cannot be resolved here. Deny rather
                    // than guess a schema.
                    return PolicyDecision::blocked(format!(
                        "table '{}' is not schema-qualified; unqualified names are ambiguous \
                         when multiple schemas are in scope",
                        table.table
                    ));
                }
                (None, false) => self.default_schema.as_deref(),
            };

            if let Some(reason) = self.match_entry(resolved_schema, table) {
                tracing::debug!(table = %table, "query blocked by denylist");
                return PolicyDecision::blocked(reason);
            }
        }

        PolicyDecision::allowed()
    }

    /// Check one resolved reference against every entry. Returns the denial
    /// reason on the first match.
    fn match_entry(&self, resolved_schema: Option<&str>, table: &TableRef) -> Option<String> {
        for entry in &self.entries {
            if entry.table != table.table {
                continue;
            }
            let matched = match &entry.schema {
                // A schema-less entry blocks the table in any schema.
                None => true,
                Some(schema) => Some(schema.as_str()) == resolved_schema,
            };
            if matched {
                return Some(match resolved_schema {
                    Some(schema) => {
                        format!("access to table '{}.{}' is denied", schema, table.table)
                    }
                    None => format!("access to table '{}' is denied", table.table),
                });
            }
        }
        None
    }
}
