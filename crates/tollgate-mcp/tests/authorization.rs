//! Authorization-path tests for the query executor.
//!
//! The pool here is lazy and points at an unroutable endpoint, so these
//! tests prove that denials happen before a connection is ever acquired:
//! a statement that passed the gates would come back as an acquire error,
//! not a result envelope.

use serde_json::Value;
use std::time::Duration;

use tollgate_core::config::{DenylistEntry, PermissionsConfig};
use tollgate_mcp::{ExecutionMode, ExecutorError, MySqlPool, MySqlPoolOptions, QueryExecutor};

fn unreachable_pool() -> MySqlPool {
    MySqlPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("mysql://tollgate@127.0.0.1:9/denied")
        .expect("lazy pool construction does not connect")
}

fn executor(permissions: PermissionsConfig) -> QueryExecutor {
    QueryExecutor::new(unreachable_pool(), permissions)
}

fn first_text(response: &tollgate_mcp::CallToolResponse) -> String {
    serde_json::to_value(response).expect("envelope serializes")["content"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn read_only_insert_is_blocked_before_any_connection() {
    let executor = executor(PermissionsConfig::default());
    let response = executor
        .run("INSERT INTO users (id) VALUES (1)", &[], ExecutionMode::ReadOnly)
        .await
        .expect("denial is a result envelope, not an acquire error");

    assert!(response.is_error);
    assert!(first_text(&response).contains("INSERT"));
}

#[tokio::test]
async fn multi_statement_input_is_rejected() {
    let executor = executor(PermissionsConfig::default());
    let response = executor
        .run("SELECT 1; DROP TABLE users", &[], ExecutionMode::ReadOnly)
        .await
        .expect("denial is a result envelope");

    assert!(response.is_error);
    assert!(first_text(&response).contains("exactly one"));
}

#[tokio::test]
async fn denylisted_table_is_blocked_in_every_mode() {
    let permissions = PermissionsConfig {
        denylist: vec![DenylistEntry::parse("prod.users").unwrap()],
        multi_schema: true,
        ..Default::default()
    };
    let executor = executor(permissions);

    for mode in [
        ExecutionMode::Unrestricted,
        ExecutionMode::ReadOnly,
        ExecutionMode::StrictReadOnly,
        ExecutionMode::Write,
    ] {
        let response = executor
            .run("SELECT * FROM prod.users", &[], mode)
            .await
            .expect("denial is a result envelope");
        assert!(response.is_error, "{mode:?} should block");
        assert!(first_text(&response).contains("prod.users"));
    }
}

#[tokio::test]
async fn unqualified_reference_is_blocked_in_multi_schema_mode() {
    let permissions = PermissionsConfig {
        denylist: vec![DenylistEntry::parse("prod.users").unwrap()],
        multi_schema: true,
        ..Default::default()
    };
    let executor = executor(permissions);

    // "orders" is not denylisted; it is blocked because its schema is
    // ambiguous.
    let response = executor
        .run("SELECT * FROM orders", &[], ExecutionMode::ReadOnly)
        .await
        .expect("denial is a result envelope");
    assert!(response.is_error);
    assert!(first_text(&response).contains("orders"));
}

#[tokio::test]
async fn strict_mode_rejects_writes_despite_allow_flags() {
    let permissions = PermissionsConfig {
        allow_insert: true,
        allow_update: true,
        allow_delete: true,
        allow_ddl: true,
        ..Default::default()
    };
    let executor = executor(permissions);

    let response = executor
        .run(
            "INSERT INTO notes (id) VALUES (1)",
            &[],
            ExecutionMode::StrictReadOnly,
        )
        .await
        .expect("denial is a result envelope");
    assert!(response.is_error);
}

#[tokio::test]
async fn write_mode_rejects_selects() {
    let permissions = PermissionsConfig {
        allow_insert: true,
        ..Default::default()
    };
    let executor = executor(permissions);

    let response = executor
        .run("SELECT * FROM users", &[], ExecutionMode::Write)
        .await
        .expect("denial is a result envelope");
    assert!(response.is_error);
}

#[tokio::test]
async fn authorized_statement_proceeds_to_connection_acquisition() {
    // A clean select passes every gate, so the executor tries the pool and
    // surfaces the acquire failure. This is the one non-envelope error.
    let executor = executor(PermissionsConfig::default());
    let result = executor
        .run("SELECT * FROM users", &[], ExecutionMode::ReadOnly)
        .await;
    assert!(matches!(result, Err(ExecutorError::Acquire(_))));
}

#[tokio::test]
async fn bound_parameters_are_accepted() {
    // Parameters do not affect authorization; the statement still reaches
    // acquisition.
    let executor = executor(PermissionsConfig::default());
    let params = vec![Value::from(42), Value::from("alice")];
    let result = executor
        .run(
            "SELECT * FROM users WHERE id = ? AND name = ?",
            &params,
            ExecutionMode::ReadOnly,
        )
        .await;
    assert!(matches!(result, Err(ExecutorError::Acquire(_))));
}
