//! Query execution engine.
//!
//! This module runs a policy-cleared statement under one of four trust
//! levels. Per query the sequence is strict: parse, classify, denylist
//! decision, mode gate, connect, transaction, execute, commit or rollback,
//! session restore, release. Failing any gate returns an error envelope
//! before a connection is ever acquired; once a connection is leased it is
//! returned to the pool on every exit path.

use std::time::{Duration, Instant};

use serde_json::Value;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Connection, MySql, MySqlPool};
use thiserror::Error;

use tollgate_core::config::PermissionsConfig;
use tollgate_policy::DenylistPolicy;
use tollgate_sql::{SqlAnalyzer, StatementKind, redirects_output};

use crate::format::{self, WriteSummary};
use crate::protocol::CallToolResponse;

/// Trust level a statement executes under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// No gate beyond the single-statement parse; no transaction wrapper.
    Unrestricted,
    /// Session forced read-only; permitted writes still never commit.
    ReadOnly,
    /// Reads only, allow flags ignored, output-redirecting selects rejected.
    StrictReadOnly,
    /// Explicit transaction; commit on success, rollback on failure.
    Write,
}

/// Faults the executor cannot resolve into a result envelope.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Leasing a connection from the pool failed.
    #[error("failed to acquire a database connection: {0}")]
    Acquire(#[source] sqlx::Error),
}

/// Executes statements against the upstream database under the configured
/// permission snapshot.
pub struct QueryExecutor {
    pool: MySqlPool,
    permissions: PermissionsConfig,
    policy: DenylistPolicy,
    analyzer: SqlAnalyzer,
}

impl QueryExecutor {
    /// Create an executor over a connection pool and a permissions snapshot.
    pub fn new(pool: MySqlPool, permissions: PermissionsConfig) -> Self {
        let policy = DenylistPolicy::new(
            permissions.denylist.clone(),
            permissions.default_schema.clone(),
            permissions.multi_schema,
        );
        Self {
            pool,
            permissions,
            policy,
            analyzer: SqlAnalyzer::new(),
        }
    }

    /// Authorize and execute one statement under the given mode.
    ///
    /// Parse failures, policy blocks, permission denials, and database
    /// errors all come back as error envelopes. Only a failure to lease a
    /// connection surfaces as [`ExecutorError`].
    pub async fn run(
        &self,
        sql: &str,
        params: &[Value],
        mode: ExecutionMode,
    ) -> Result<CallToolResponse, ExecutorError> {
        let statement = match self.analyzer.parse_one(sql) {
            Ok(statement) => statement,
            Err(e) => {
                tracing::debug!(error = %e, "rejecting statement at parse");
                return Ok(CallToolResponse::error(e.to_string()));
            }
        };

        let decision = self.policy.evaluate_statement(&statement);
        if decision.blocked {
            let reason = decision
                .reason
                .unwrap_or_else(|| "query blocked by policy".to_string());
            tracing::debug!(reason = %reason, "statement blocked by denylist");
            return Ok(CallToolResponse::error(reason));
        }

        let kind = self.analyzer.classify(&statement);
        if let Err(reason) = mode_gate(&self.permissions, kind, sql, mode) {
            tracing::debug!(kind = kind.as_str(), reason = %reason, "statement rejected by mode gate");
            return Ok(CallToolResponse::error(reason));
        }

        tracing::debug!(kind = kind.as_str(), ?mode, "statement authorized");

        let mut conn = self.pool.acquire().await.map_err(ExecutorError::Acquire)?;

        let response = match mode {
            ExecutionMode::Unrestricted => self.execute_direct(&mut conn, sql, params).await,
            ExecutionMode::ReadOnly | ExecutionMode::StrictReadOnly => {
                self.execute_rolled_back(&mut conn, sql, params).await
            }
            ExecutionMode::Write => {
                let warnings = self.analyzer.write_warnings(&statement);
                self.execute_committed(&mut conn, sql, params, kind, &warnings)
                    .await
            }
        };

        // The lease drops here, returning the connection to the pool on
        // success and failure alike.
        Ok(response)
    }

    /// Run a statement directly on the leased connection, no transaction.
    async fn execute_direct(
        &self,
        conn: &mut PoolConnection<MySql>,
        sql: &str,
        params: &[Value],
    ) -> CallToolResponse {
        let started = Instant::now();
        match bind_params(sqlx::query(sql), params)
            .fetch_all(&mut **conn)
            .await
        {
            Ok(rows) => read_response(&rows, started.elapsed()),
            Err(e) => CallToolResponse::error(format!("query failed: {e}")),
        }
    }

    /// Run a statement in a read-only session inside a transaction that is
    /// always rolled back, then restore the session.
    async fn execute_rolled_back(
        &self,
        conn: &mut PoolConnection<MySql>,
        sql: &str,
        params: &[Value],
    ) -> CallToolResponse {
        if let Err(e) = sqlx::query("SET SESSION TRANSACTION READ ONLY")
            .execute(&mut **conn)
            .await
        {
            return CallToolResponse::error(format!("failed to set the session read-only: {e}"));
        }

        let started = Instant::now();
        let result = match conn.begin().await {
            Ok(mut tx) => {
                let fetched = bind_params(sqlx::query(sql), params)
                    .fetch_all(&mut *tx)
                    .await;
                // Never commit in this mode: even a statement that was
                // permitted as a write must not persist anything.
                if let Err(e) = tx.rollback().await {
                    tracing::warn!(error = %e, "rollback after read-only execution failed");
                }
                fetched
            }
            Err(e) => Err(e),
        };
        let elapsed = started.elapsed();

        // Restore the session before the lease returns to the pool. A
        // failure here is logged; the connection still goes back.
        if let Err(e) = sqlx::query("SET SESSION TRANSACTION READ WRITE")
            .execute(&mut **conn)
            .await
        {
            tracing::warn!(error = %e, "failed to restore the session to read-write");
        }

        match result {
            Ok(rows) => read_response(&rows, elapsed),
            Err(e) => CallToolResponse::error(format!("query failed: {e}")),
        }
    }

    /// Run a write in an explicit transaction: commit on success, roll back
    /// on any failure.
    async fn execute_committed(
        &self,
        conn: &mut PoolConnection<MySql>,
        sql: &str,
        params: &[Value],
        kind: StatementKind,
        warnings: &[String],
    ) -> CallToolResponse {
        let mut tx = match conn.begin().await {
            Ok(tx) => tx,
            Err(e) => return CallToolResponse::error(format!("failed to begin transaction: {e}")),
        };

        match bind_params(sqlx::query(sql), params).execute(&mut *tx).await {
            Ok(done) => match tx.commit().await {
                Ok(()) => {
                    let summary = WriteSummary {
                        kind,
                        affected_rows: done.rows_affected(),
                        changed_rows: (kind == StatementKind::Update)
                            .then(|| done.rows_affected()),
                        last_insert_id: (kind == StatementKind::Insert)
                            .then(|| done.last_insert_id()),
                    };
                    let mut text = summary.to_text();
                    for warning in warnings {
                        text.push_str("\nWarning: ");
                        text.push_str(warning);
                    }
                    CallToolResponse::text_blocks([text])
                }
                Err(e) => CallToolResponse::error(format!("commit failed: {e}")),
            },
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback after failed write also failed");
                }
                CallToolResponse::error(format!("query failed: {e}"))
            }
        }
    }
}

/// Permission check for a classified statement under a mode.
///
/// Runs before any connection is acquired, so a denial here never opens a
/// transaction.
fn mode_gate(
    permissions: &PermissionsConfig,
    kind: StatementKind,
    sql: &str,
    mode: ExecutionMode,
) -> Result<(), String> {
    match mode {
        ExecutionMode::Unrestricted => Ok(()),
        ExecutionMode::ReadOnly => {
            let allowed = match kind {
                StatementKind::Insert => permissions.allow_insert,
                StatementKind::Update => permissions.allow_update,
                StatementKind::Delete => permissions.allow_delete,
                k if k.is_ddl() => permissions.allow_ddl,
                _ => true,
            };
            if allowed {
                Ok(())
            } else {
                Err(not_permitted(kind))
            }
        }
        ExecutionMode::StrictReadOnly => {
            if !kind.is_read_only() {
                Err(format!(
                    "only read statements are permitted in strict read-only mode; {} is not",
                    kind.as_str().to_uppercase()
                ))
            } else if redirects_output(sql) {
                Err("statements that redirect query output to a file are not permitted".to_string())
            } else {
                Ok(())
            }
        }
        ExecutionMode::Write => {
            let allowed = match kind {
                StatementKind::Insert => permissions.allow_insert,
                StatementKind::Update => permissions.allow_update,
                StatementKind::Delete => permissions.allow_delete,
                k if k.is_ddl() => permissions.allow_ddl,
                _ => {
                    return Err(format!(
                        "{} statements are not executed in write mode",
                        kind.as_str().to_uppercase()
                    ));
                }
            };
            if allowed {
                Ok(())
            } else {
                Err(not_permitted(kind))
            }
        }
    }
}

fn not_permitted(kind: StatementKind) -> String {
    format!(
        "{} statements are not allowed with the current permissions",
        kind.as_str().to_uppercase()
    )
}

/// Bind JSON scalars as query parameters.
fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [Value],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else if let Some(u) = n.as_u64() {
                    query.bind(u)
                } else {
                    query.bind(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => query.bind(s.as_str()),
            // Arrays and objects arrive as their JSON text.
            other => query.bind(other.to_string()),
        };
    }
    query
}

/// Two text blocks: the rows as pretty JSON, then the elapsed time.
fn read_response(rows: &[MySqlRow], elapsed: Duration) -> CallToolResponse {
    let data: Vec<Value> = rows.iter().map(format::row_to_json).collect();
    CallToolResponse::text_blocks([
        format::to_pretty_json(&Value::Array(data)),
        format!("Query execution time: {}ms", elapsed.as_millis()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permissions(insert: bool, update: bool, delete: bool, ddl: bool) -> PermissionsConfig {
        PermissionsConfig {
            allow_insert: insert,
            allow_update: update,
            allow_delete: delete,
            allow_ddl: ddl,
            ..Default::default()
        }
    }

    #[test]
    fn read_only_blocks_writes_without_flags() {
        let perms = permissions(false, false, false, false);
        for kind in [
            StatementKind::Insert,
            StatementKind::Update,
            StatementKind::Delete,
            StatementKind::Create,
            StatementKind::Drop,
        ] {
            let gate = mode_gate(&perms, kind, "", ExecutionMode::ReadOnly);
            assert!(gate.is_err(), "{kind:?} should be blocked");
        }
    }

    #[test]
    fn read_only_permits_flagged_writes() {
        let perms = permissions(true, false, false, false);
        assert!(mode_gate(&perms, StatementKind::Insert, "", ExecutionMode::ReadOnly).is_ok());
        assert!(mode_gate(&perms, StatementKind::Update, "", ExecutionMode::ReadOnly).is_err());
    }

    #[test]
    fn read_only_permits_reads() {
        let perms = permissions(false, false, false, false);
        for kind in [
            StatementKind::Select,
            StatementKind::Show,
            StatementKind::Explain,
        ] {
            assert!(mode_gate(&perms, kind, "SELECT 1", ExecutionMode::ReadOnly).is_ok());
        }
    }

    #[test]
    fn strict_mode_ignores_allow_flags() {
        // Every flag enabled, and writes are still rejected.
        let perms = permissions(true, true, true, true);
        for kind in [
            StatementKind::Insert,
            StatementKind::Update,
            StatementKind::Delete,
            StatementKind::Create,
        ] {
            let gate = mode_gate(&perms, kind, "", ExecutionMode::StrictReadOnly);
            assert!(gate.is_err(), "{kind:?} should be blocked in strict mode");
        }
    }

    #[test]
    fn strict_mode_rejects_output_redirection() {
        let perms = permissions(false, false, false, false);
        let sql = "SELECT * FROM users INTO OUTFILE '/tmp/dump'";
        let gate = mode_gate(&perms, StatementKind::Select, sql, ExecutionMode::StrictReadOnly);
        assert!(gate.is_err());

        let gate = mode_gate(
            &perms,
            StatementKind::Select,
            "SELECT * FROM users",
            ExecutionMode::StrictReadOnly,
        );
        assert!(gate.is_ok());
    }

    #[test]
    fn write_mode_requires_matching_flag() {
        let perms = permissions(true, false, false, false);
        assert!(mode_gate(&perms, StatementKind::Insert, "", ExecutionMode::Write).is_ok());
        assert!(mode_gate(&perms, StatementKind::Update, "", ExecutionMode::Write).is_err());
        assert!(mode_gate(&perms, StatementKind::Delete, "", ExecutionMode::Write).is_err());
    }

    #[test]
    fn write_mode_rejects_reads() {
        let perms = permissions(true, true, true, true);
        assert!(mode_gate(&perms, StatementKind::Select, "", ExecutionMode::Write).is_err());
        assert!(mode_gate(&perms, StatementKind::Show, "", ExecutionMode::Write).is_err());
    }

    #[test]
    fn write_mode_gates_ddl_on_its_flag() {
        let without = permissions(false, false, false, false);
        assert!(mode_gate(&without, StatementKind::Truncate, "", ExecutionMode::Write).is_err());

        let with = permissions(false, false, false, true);
        assert!(mode_gate(&with, StatementKind::Truncate, "", ExecutionMode::Write).is_ok());
        assert!(mode_gate(&with, StatementKind::Alter, "", ExecutionMode::Write).is_ok());
    }

    #[test]
    fn unrestricted_mode_has_no_gate() {
        let perms = permissions(false, false, false, false);
        for kind in [
            StatementKind::Select,
            StatementKind::Insert,
            StatementKind::Drop,
            StatementKind::Other,
        ] {
            assert!(mode_gate(&perms, kind, "", ExecutionMode::Unrestricted).is_ok());
        }
    }
}
