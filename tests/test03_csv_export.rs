//! Streaming CSV export against a live SQL Server.
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

#[tokio::test]
async fn semicolon_export_with_decimal_comma_substitution() {
    let Some(conn) = conn() else { return };
    let table = table("exec_csv");

    run_ok(
        &conn,
        &format!(
            "CREATE TABLE {table} (Id INT NOT NULL, LastName NVARCHAR(64), \
             FirstName NVARCHAR(64), Salary DECIMAL(10,2))"
        ),
    )
    .await;
    run_ok(
        &conn,
        &format!(
            "INSERT INTO {table} (Id, LastName, FirstName, Salary) \
             VALUES (1, N'Meikalainen', N'Matti', 1523.25)"
        ),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.csv");
    let request = ExportRequest::new(
        &conn,
        &format!(
            "SELECT Id, LastName, FirstName, \
             REPLACE(CAST(Salary AS VARCHAR(32)), '.', ',') AS Salary \
             FROM {table} ORDER BY Id"
        ),
        &path,
    )
    .with_options(
        CsvOptions::new()
            .field_delimiter(Delimiter::Semicolon)
            .add_quotes_to_strings(true),
    );

    let result = export_to_file(&request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.rows_written, 1);
    assert_eq!(result.file_name, "people.csv");

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        contents,
        "Id;LastName;FirstName;Salary\r\n1;\"Meikalainen\";\"Matti\";\"1523,25\"\r\n"
    );

    run_ok(&conn, &format!("DROP TABLE {table}")).await;
}

#[tokio::test]
async fn column_allow_list_and_header_sanitizing() {
    let Some(conn) = conn() else { return };
    let table = table("exec_csv_cols");

    run_ok(
        &conn,
        &format!("CREATE TABLE {table} (Id INT NOT NULL, [First Name] NVARCHAR(64))"),
    )
    .await;
    run_ok(
        &conn,
        &format!("INSERT INTO {table} (Id, [First Name]) VALUES (1, N'Matti')"),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cols.csv");
    let request = ExportRequest::new(
        &conn,
        &format!("SELECT Id, [First Name] FROM {table}"),
        &path,
    )
    .with_options(
        CsvOptions::new()
            .columns_to_include(vec!["First Name".to_string()])
            .sanitize_headers(true)
            .line_break(LineBreak::Lf),
    );

    let result = export_to_file(&request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.rows_written, 1);
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "firstname\nMatti\n");

    run_ok(&conn, &format!("DROP TABLE {table}")).await;
}

#[tokio::test]
async fn unknown_encoding_fails_before_connecting() {
    // No database needed: the label resolves before any connection opens.
    let dir = tempfile::tempdir().unwrap();
    let request = ExportRequest::new(
        "Server=tcp:localhost,1",
        "SELECT 1",
        dir.path().join("never.csv"),
    )
    .with_options(CsvOptions::new().file_encoding(FileEncoding::Custom("klingon".to_string())));

    let err = export_to_file(&request, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MssqlExecError::ConfigError(_)));
    assert!(!dir.path().join("never.csv").exists());
}
