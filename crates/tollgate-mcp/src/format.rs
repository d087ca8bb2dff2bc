//! Result formatting: row payloads and write summaries.

use bigdecimal::BigDecimal;
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row};

use tollgate_sql::StatementKind;

/// Outcome of a committed write, decoupled from the driver so formatting is
/// testable without a database.
#[derive(Debug, Clone)]
pub struct WriteSummary {
    /// The statement kind that produced this summary.
    pub kind: StatementKind,
    /// Rows the statement affected.
    pub affected_rows: u64,
    /// Rows actually changed (UPDATE only). The MySQL protocol counts only
    /// changed rows in its affected-rows figure unless CLIENT_FOUND_ROWS is
    /// negotiated, which this gateway does not request.
    pub changed_rows: Option<u64>,
    /// Identifier generated for the inserted row (INSERT only).
    pub last_insert_id: Option<u64>,
}

impl WriteSummary {
    /// Human-readable one-line summary for the tool result.
    pub fn to_text(&self) -> String {
        match self.kind {
            StatementKind::Insert => format!(
                "Insert successful. Affected rows: {}. Last insert ID: {}",
                self.affected_rows,
                self.last_insert_id.unwrap_or(0)
            ),
            StatementKind::Update => format!(
                "Update successful. Affected rows: {}. Changed rows: {}",
                self.affected_rows,
                self.changed_rows.unwrap_or(self.affected_rows)
            ),
            StatementKind::Delete => {
                format!("Delete successful. Affected rows: {}", self.affected_rows)
            }
            _ => format!(
                "Statement executed. Affected rows: {}",
                self.affected_rows
            ),
        }
    }
}

/// Serialize a JSON value with 2-space indentation.
pub fn to_pretty_json<T: Serialize>(value: &T) -> String {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    if value.serialize(&mut serializer).is_ok() {
        if let Ok(text) = String::from_utf8(buf) {
            return text;
        }
    }
    // Serialization of plain JSON values does not fail in practice; fall
    // back to the compact form rather than propagate.
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Convert a MySQL row to a JSON object.
///
/// Values are decoded by trying progressively more specific types; columns
/// that decode as none of them (for example raw binary) render as `null`
/// rather than a lossy re-encoding.
pub fn row_to_json(row: &MySqlRow) -> Value {
    let mut object = serde_json::Map::new();

    for column in row.columns() {
        let name = column.name();

        let value: Value = if let Ok(v) = row.try_get::<Option<i64>, _>(name) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<u64>, _>(name) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(name) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<bool>, _>(name) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(name) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<BigDecimal>, _>(name) {
            // DECIMAL renders as a string to avoid float precision loss.
            v.map(|d| json!(d.to_string())).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
            v.map(|t| json!(t.to_rfc3339())).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
            v.map(|t| json!(t.to_string())).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
            v.map(|t| json!(t.to_string())).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(name) {
            v.map(|t| json!(t.to_string())).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<Value>, _>(name) {
            v.unwrap_or(Value::Null)
        } else {
            Value::Null
        };

        object.insert(name.to_string(), value);
    }

    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_summary_reports_affected_rows_and_insert_id() {
        let summary = WriteSummary {
            kind: StatementKind::Insert,
            affected_rows: 1,
            changed_rows: None,
            last_insert_id: Some(123),
        };
        let text = summary.to_text();
        assert!(text.contains("Affected rows: 1"));
        assert!(text.contains("Last insert ID: 123"));

        let envelope = crate::protocol::CallToolResponse::text_blocks([text]);
        assert!(!envelope.is_error);
    }

    #[test]
    fn update_summary_reports_changed_rows() {
        let summary = WriteSummary {
            kind: StatementKind::Update,
            affected_rows: 2,
            changed_rows: Some(2),
            last_insert_id: None,
        };
        let text = summary.to_text();
        assert!(text.contains("Affected rows: 2"));
        assert!(text.contains("Changed rows: 2"));
    }

    #[test]
    fn delete_summary_reports_affected_rows() {
        let summary = WriteSummary {
            kind: StatementKind::Delete,
            affected_rows: 3,
            changed_rows: None,
            last_insert_id: None,
        };
        assert_eq!(summary.to_text(), "Delete successful. Affected rows: 3");
    }

    #[test]
    fn pretty_json_uses_two_space_indent() {
        let value = json!([{ "id": 1, "name": "a" }]);
        let text = to_pretty_json(&value);
        assert!(text.contains("\n  {"));
        assert!(text.contains("\n    \"id\": 1"));
    }

    #[test]
    fn pretty_json_empty_array() {
        assert_eq!(to_pretty_json(&json!([])), "[]");
    }
}
