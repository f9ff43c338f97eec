//! Failure envelopes and rollback discipline against a live SQL Server.
//!
//! Set `MSSQL_EXEC_TEST_CONN` to an ADO connection string to run; the tests
//! skip silently when it is unset.

use std::env;

use mssql_exec::prelude::*;
use tokio_util::sync::CancellationToken;

fn conn() -> Option<String> {
    env::var("MSSQL_EXEC_TEST_CONN").ok()
}

fn table(prefix: &str) -> String {
    format!("{prefix}_{}", std::process::id())
}

async fn run_ok(conn: &str, sql: &str) {
    let request = ExecutionRequest::new(conn, sql).with_kind(ExecuteKind::NonQuery);
    let envelope = execute(&request, &CancellationToken::new()).await.unwrap();
    assert!(envelope.success, "{:?}", envelope.error_message);
}

async fn count(conn: &str, table: &str) -> i64 {
    let request = ExecutionRequest::new(conn, &format!("SELECT COUNT(*) FROM {table}"))
        .with_kind(ExecuteKind::Scalar);
    let envelope = execute(&request, &CancellationToken::new()).await.unwrap();
    match envelope.data {
        Some(ExecutionOutcome::Scalar {
            value: SqlValue::Int(n),
            ..
        }) => n,
        other => panic!("expected an int scalar, got {other:?}"),
    }
}

#[tokio::test]
async fn capture_mode_returns_a_failure_envelope() {
    let Some(conn) = conn() else { return };

    let request = ExecutionRequest::new(&conn, "SELECT * FROM table_that_does_not_exist_xyz");
    let envelope = execute(&request, &CancellationToken::new()).await.unwrap();
    assert!(!envelope.success);
    assert_eq!(envelope.records_affected, 0);
    assert!(envelope.data.is_none());
    assert!(envelope.error_message.is_some());
}

#[tokio::test]
async fn propagate_mode_carries_the_rollback_annotation() {
    let Some(conn) = conn() else { return };

    let request = ExecutionRequest::new(&conn, "SELECT * FROM table_that_does_not_exist_xyz")
        .with_failure_mode(FailureMode::Propagate);
    let err = execute(&request, &CancellationToken::new())
        .await
        .unwrap_err();
    let text = err.to_string();
    // The primary fault comes first, the rollback outcome as a suffix.
    assert!(
        text.ends_with("(If required) transaction rollback completed without exception"),
        "unexpected error text: {text}"
    );
}

#[tokio::test]
async fn failed_batch_leaves_no_partial_writes() {
    let Some(conn) = conn() else { return };
    let table = table("exec_rb");

    run_ok(&conn, &format!("CREATE TABLE {table} (Id INT NOT NULL)")).await;
    run_ok(&conn, &format!("INSERT INTO {table} (Id) VALUES (1)")).await;
    assert_eq!(count(&conn, &table).await, 1);

    // The insert succeeds inside the transaction, then the batch fails; the
    // rollback must discard the insert.
    let failing = ExecutionRequest::new(
        &conn,
        &format!(
            "INSERT INTO {table} (Id) VALUES (2); \
             INSERT INTO {table} (Id, NoSuchColumn) VALUES (3, 3);"
        ),
    )
    .with_kind(ExecuteKind::NonQuery);
    let envelope = execute(&failing, &CancellationToken::new()).await.unwrap();
    assert!(!envelope.success);
    assert_eq!(count(&conn, &table).await, 1);

    run_ok(&conn, &format!("DROP TABLE {table}")).await;
}

#[tokio::test]
async fn pre_cancelled_token_fails_before_connecting() {
    let Some(conn) = conn() else { return };

    let cancel = CancellationToken::new();
    cancel.cancel();
    let request = ExecutionRequest::new(&conn, "SELECT 1")
        .with_failure_mode(FailureMode::Propagate);
    let err = execute(&request, &cancel).await.unwrap_err();
    assert!(matches!(err, MssqlExecError::Cancelled));
}

#[tokio::test]
async fn missing_parameter_is_a_binding_fault() {
    let Some(conn) = conn() else { return };

    let request = ExecutionRequest::new(&conn, "SELECT @Missing")
        .with_failure_mode(FailureMode::Propagate);
    let err = execute(&request, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MssqlExecError::ParameterError(_)));
}
