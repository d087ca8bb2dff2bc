//! Permission flags and the table denylist.
//!
//! Every flag defaults to `false`: a statement type is executable only when
//! its flag is set explicitly. The denylist holds normalized table names,
//! optionally schema-qualified.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// Per-operation allow flags plus the denylist and schema-resolution inputs.
///
/// This is the configuration snapshot consumed by the policy engine and the
/// query executor. It is captured once per query evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PermissionsConfig {
    /// Permit INSERT statements.
    #[serde(default)]
    pub allow_insert: bool,

    /// Permit UPDATE statements.
    #[serde(default)]
    pub allow_update: bool,

    /// Permit DELETE statements.
    #[serde(default)]
    pub allow_delete: bool,

    /// Permit DDL statements (CREATE, ALTER, DROP, TRUNCATE).
    #[serde(default)]
    pub allow_ddl: bool,

    /// Route all read statements through strict read-only execution, which
    /// ignores the allow flags above and rejects output-redirecting selects.
    #[serde(default)]
    pub strict_read_only: bool,

    /// Tables that must never be queried, regardless of statement type.
    #[serde(default)]
    pub denylist: Vec<DenylistEntry>,

    /// Schema used to resolve unqualified table names in single-schema mode.
    #[serde(default)]
    pub default_schema: Option<String>,

    /// The connection is not pinned to one schema; unqualified table names
    /// are ambiguous and are rejected whenever the denylist is non-empty.
    #[serde(default)]
    pub multi_schema: bool,
}

/// One denylist entry: a table name, optionally schema-qualified.
///
/// A schema-less entry matches the named table in any schema; a
/// schema-qualified entry matches only that schema. Both parts are stored
/// normalized (trimmed, backticks stripped, lower-cased) so that matching is
/// case- and quoting-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DenylistEntry {
    /// Schema the entry is scoped to, if any.
    pub schema: Option<String>,
    /// The table name.
    pub table: String,
}

impl DenylistEntry {
    /// Parse an entry from `"table"` or `"schema.table"` notation.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidDenylistEntry {
            entry: raw.to_string(),
        };

        let mut parts = raw
            .split('.')
            .map(normalize_identifier)
            .collect::<Vec<_>>();

        let entry = match parts.len() {
            1 => Self {
                schema: None,
                table: parts.pop().ok_or_else(invalid)?,
            },
            2 => {
                let table = parts.pop().ok_or_else(invalid)?;
                let schema = parts.pop().ok_or_else(invalid)?;
                if schema.is_empty() {
                    return Err(invalid());
                }
                Self {
                    schema: Some(schema),
                    table,
                }
            }
            _ => return Err(invalid()),
        };

        if entry.table.is_empty() {
            return Err(invalid());
        }
        Ok(entry)
    }
}

/// Trim an identifier, strip backtick quoting, and lower-case it.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().trim_matches('`').trim().to_lowercase()
}

impl fmt::Display for DenylistEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.table),
            None => write!(f, "{}", self.table),
        }
    }
}

impl FromStr for DenylistEntry {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DenylistEntry {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DenylistEntry> for String {
    fn from(entry: DenylistEntry) -> Self {
        entry.to_string()
    }
}

// Entries appear in YAML as plain strings ("users" or "prod.users").
impl Serialize for DenylistEntry {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DenylistEntry {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
