//! SQL parsing and analysis.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::LazyLock;

use regex::Regex;
use sqlparser::ast::{ObjectName, Statement, Visit, Visitor};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use tollgate_core::config::permissions::normalize_identifier;

use crate::error::SqlError;

/// Analyzes SQL statements: parsing, classification, table extraction.
pub struct SqlAnalyzer {
    dialect: MySqlDialect,
}

impl Clone for SqlAnalyzer {
    fn clone(&self) -> Self {
        Self {
            dialect: MySqlDialect {},
        }
    }
}

impl Default for SqlAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlAnalyzer {
    /// Create a new SQL analyzer targeting the MySQL dialect.
    pub fn new() -> Self {
        Self {
            dialect: MySqlDialect {},
        }
    }

    /// Parse SQL text into exactly one statement.
    ///
    /// Zero or more than one top-level statement is an error: the caller
    /// classifies and authorizes a single statement, and anything it did not
    /// see must not reach the database.
    pub fn parse_one(&self, sql: &str) -> Result<Statement, SqlError> {
        let mut statements =
            Parser::parse_sql(&self.dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
        let count = statements.len();
        match statements.pop() {
            Some(statement) if count == 1 => Ok(statement),
            _ => Err(SqlError::MultiStatement { count }),
        }
    }

    /// Classify a parsed statement.
    pub fn classify(&self, statement: &Statement) -> StatementKind {
        match statement {
            Statement::Query { .. } => StatementKind::Select,
            Statement::Insert { .. } => StatementKind::Insert,
            Statement::Update { .. } => StatementKind::Update,
            Statement::Delete { .. } => StatementKind::Delete,
            Statement::CreateTable { .. }
            | Statement::CreateView { .. }
            | Statement::CreateIndex { .. }
            | Statement::CreateDatabase { .. }
            | Statement::CreateSchema { .. } => StatementKind::Create,
            Statement::AlterTable { .. } => StatementKind::Alter,
            Statement::Drop { .. } => StatementKind::Drop,
            Statement::Truncate { .. } => StatementKind::Truncate,
            Statement::ShowTables { .. }
            | Statement::ShowColumns { .. }
            | Statement::ShowDatabases { .. }
            | Statement::ShowSchemas { .. }
            | Statement::ShowViews { .. }
            | Statement::ShowCreate { .. }
            | Statement::ShowVariable { .. }
            | Statement::ShowVariables { .. }
            | Statement::ShowStatus { .. }
            | Statement::ShowCollation { .. }
            | Statement::ShowFunctions { .. } => StatementKind::Show,
            // EXPLAIN ANALYZE executes the statement it plans, so an EXPLAIN
            // wrapping a write classifies as that write.
            Statement::Explain { statement, .. } => match self.classify(statement) {
                StatementKind::Select => StatementKind::Explain,
                inner => inner,
            },
            Statement::ExplainTable { .. } => StatementKind::Explain,
            Statement::Use { .. } => StatementKind::Use,
            Statement::Set { .. } => StatementKind::Set,
            _ => StatementKind::Other,
        }
    }

    /// Parse and classify in one step, enforcing the single-statement rule.
    pub fn classify_sql(&self, sql: &str) -> Result<StatementKind, SqlError> {
        Ok(self.classify(&self.parse_one(sql)?))
    }

    /// Extract every table referenced anywhere in the statement tree.
    ///
    /// The walk visits every relation name the parser knows about: FROM
    /// clauses, join targets, subqueries, CTEs, and insert/update/delete
    /// targets. Over-reporting is acceptable here; under-reporting is not,
    /// since the result feeds the denylist.
    pub fn extract_tables(&self, statement: &Statement) -> BTreeSet<TableRef> {
        let mut collector = TableCollector::default();
        let _ = statement.visit(&mut collector);
        collector.tables
    }

    /// Safety warnings for a write statement (advisory only).
    pub fn write_warnings(&self, statement: &Statement) -> Vec<String> {
        match statement {
            Statement::Update(update) if update.selection.is_none() => {
                vec!["UPDATE has no WHERE clause and will affect every row in the table".to_string()]
            }
            Statement::Delete(delete) if delete.selection.is_none() => {
                vec!["DELETE has no WHERE clause and will remove every row in the table".to_string()]
            }
            Statement::Truncate { .. } => {
                vec!["TRUNCATE removes all rows and cannot be rolled back".to_string()]
            }
            _ => Vec::new(),
        }
    }
}

/// Collects relation names from every node of the syntax tree.
#[derive(Default)]
struct TableCollector {
    tables: BTreeSet<TableRef>,
}

impl Visitor for TableCollector {
    type Break = ();

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        if let Some(table) = TableRef::from_object_name(relation) {
            self.tables.insert(table);
        }
        ControlFlow::Continue(())
    }
}

/// A normalized reference to a table, optionally schema-qualified.
///
/// Identifiers are trimmed, stripped of backtick quoting, and lower-cased at
/// construction, so two references differing only in quoting or case compare
/// equal. Schema absence is a distinct key from any schema.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct TableRef {
    /// Schema the reference is qualified with, if any.
    pub schema: Option<String>,
    /// The table name.
    pub table: String,
}

impl TableRef {
    /// Build a normalized reference.
    pub fn new(schema: Option<&str>, table: &str) -> Self {
        Self {
            schema: schema
                .map(normalize_identifier)
                .filter(|schema| !schema.is_empty()),
            table: normalize_identifier(table),
        }
    }

    /// Interpret a (possibly qualified) object name: the last identifier is
    /// the table, the one before it the schema. Longer paths keep only those
    /// two trailing parts, matching MySQL's `schema.table` addressing.
    fn from_object_name(name: &ObjectName) -> Option<Self> {
        let mut parts = Vec::with_capacity(name.0.len());
        for part in &name.0 {
            parts.push(part.as_ident()?.value.as_str());
        }
        let table = parts.pop()?;
        let reference = Self::new(parts.pop(), table);
        if reference.table.is_empty() {
            return None;
        }
        Some(reference)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.table),
            None => write!(f, "{}", self.table),
        }
    }
}

/// The kind of a single SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Alter,
    Drop,
    Truncate,
    Show,
    Explain,
    Use,
    Set,
    Other,
}

impl StatementKind {
    /// Lower-cased statement type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Create => "create",
            StatementKind::Alter => "alter",
            StatementKind::Drop => "drop",
            StatementKind::Truncate => "truncate",
            StatementKind::Show => "show",
            StatementKind::Explain => "explain",
            StatementKind::Use => "use",
            StatementKind::Set => "set",
            StatementKind::Other => "unknown",
        }
    }

    /// True for statements that only read (SELECT, SHOW, EXPLAIN/DESCRIBE).
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            StatementKind::Select | StatementKind::Show | StatementKind::Explain
        )
    }

    /// True for INSERT, UPDATE, DELETE.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete
        )
    }

    /// True for DDL (CREATE, ALTER, DROP, TRUNCATE).
    pub fn is_ddl(&self) -> bool {
        matches!(
            self,
            StatementKind::Create
                | StatementKind::Alter
                | StatementKind::Drop
                | StatementKind::Truncate
        )
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static OUTPUT_REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bINTO\s+(OUTFILE|DUMPFILE)\b").expect("hard-coded regex must compile")
});

/// Detect select forms that redirect query output to a file.
///
/// `SELECT ... INTO OUTFILE` and `SELECT ... INTO DUMPFILE` are lexically
/// reads but write to the server's filesystem. This is a textual check on
/// the raw statement, used as an extra rejection in strict read-only mode;
/// it is never a reason to let a statement through.
pub fn redirects_output(sql: &str) -> bool {
    OUTPUT_REDIRECT.is_match(sql)
}
