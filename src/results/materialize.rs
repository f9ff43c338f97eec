use futures_util::TryStreamExt;
use tiberius::{ColumnType, Query};
use tracing::debug;

use super::dispatch::{StatementShape, classify_statement, has_output_clause};
use super::extract::extract_cell;
use super::outcome::ExecutionOutcome;
use super::result_set::ResultSet;
use crate::client::MssqlClient;
use crate::error::MssqlExecError;
use crate::params::{BoundParam, bind_all};
use crate::types::{ExecuteKind, SqlValue};

/// Execute the prepared statement and shape its outcome per the requested
/// execute kind. This is the single dispatch site for all four kinds.
///
/// # Errors
///
/// Returns the driver's error verbatim if execution or row decoding fails.
pub async fn materialize(
    client: &mut MssqlClient,
    statement: &str,
    params: &[BoundParam],
    kind: ExecuteKind,
) -> Result<ExecutionOutcome, MssqlExecError> {
    match kind {
        ExecuteKind::Auto => match classify_statement(statement) {
            StatementShape::Rows => read_rows(client, statement, params).await,
            StatementShape::Mutation => run_non_query(client, statement, params).await,
        },
        ExecuteKind::NonQuery => run_non_query(client, statement, params).await,
        ExecuteKind::Scalar => read_scalar_or_count(client, statement, params).await,
        ExecuteKind::ExecuteReader => read_rows(client, statement, params).await,
    }
}

/// Scalar-kind dispatch. A plain mutation produces no cells, so it runs on
/// the execute path and carries the provider's affected-row count back with a
/// NULL scalar. Mutations with an `OUTPUT` clause do produce a result set and
/// take the scalar-read path like any query.
async fn read_scalar_or_count(
    client: &mut MssqlClient,
    statement: &str,
    params: &[BoundParam],
) -> Result<ExecutionOutcome, MssqlExecError> {
    if classify_statement(statement) == StatementShape::Mutation
        && !has_output_clause(statement)
    {
        let outcome = run_non_query(client, statement, params).await?;
        if let ExecutionOutcome::NonQuery { affected } = outcome {
            return Ok(ExecutionOutcome::Scalar {
                value: SqlValue::Null,
                affected,
            });
        }
        return Ok(outcome);
    }
    read_scalar(client, statement, params).await
}

async fn run_non_query(
    client: &mut MssqlClient,
    statement: &str,
    params: &[BoundParam],
) -> Result<ExecutionOutcome, MssqlExecError> {
    let mut query = Query::new(statement.to_string());
    bind_all(&mut query, params);
    let result = query.execute(client).await?;
    let affected: u64 = result.rows_affected().iter().sum();
    debug!(affected, "non-query statement completed");
    Ok(ExecutionOutcome::NonQuery { affected })
}

async fn read_scalar(
    client: &mut MssqlClient,
    statement: &str,
    params: &[BoundParam],
) -> Result<ExecutionOutcome, MssqlExecError> {
    let mut query = Query::new(statement.to_string());
    bind_all(&mut query, params);
    let mut stream = query.query(client).await?;

    let first_type: Option<ColumnType> = stream
        .columns()
        .await?
        .and_then(|cols| cols.first().map(tiberius::Column::column_type));

    // Drain the full stream so the final DONE token is consumed before the
    // transaction moves on; only the first cell is kept.
    let mut rows = stream.into_row_stream();
    let mut value = SqlValue::Null;
    let mut drained: u64 = 0;
    while let Some(row) = rows.try_next().await? {
        if drained == 0 {
            if let Some(column_type) = first_type {
                value = extract_cell(&row, column_type, 0)?;
            }
        }
        drained += 1;
    }

    Ok(ExecutionOutcome::Scalar {
        value,
        affected: drained,
    })
}

async fn read_rows(
    client: &mut MssqlClient,
    statement: &str,
    params: &[BoundParam],
) -> Result<ExecutionOutcome, MssqlExecError> {
    let mut query = Query::new(statement.to_string());
    bind_all(&mut query, params);
    let stream = query.query(client).await?;
    let result_set = drain_result_set(stream).await?;
    debug!(rows = result_set.len(), "result set drained");
    Ok(ExecutionOutcome::Rows(result_set))
}

/// Drain a live query stream into a finite result set. Statements that
/// produce no result set yield an empty set rather than an error.
pub(crate) async fn drain_result_set(
    mut stream: tiberius::QueryStream<'_>,
) -> Result<ResultSet, MssqlExecError> {
    let column_meta: Vec<(String, ColumnType)> = match stream.columns().await? {
        Some(columns) => columns
            .iter()
            .map(|c| (c.name().to_string(), c.column_type()))
            .collect(),
        None => return Ok(ResultSet::default()),
    };

    let names: Vec<String> = column_meta.iter().map(|(n, _)| n.clone()).collect();
    let mut result_set = ResultSet::new(names);

    let mut rows = stream.into_row_stream();
    while let Some(row) = rows.try_next().await? {
        let mut values = Vec::with_capacity(column_meta.len());
        for (idx, (_, column_type)) in column_meta.iter().enumerate() {
            values.push(extract_cell(&row, *column_type, idx)?);
        }
        result_set.push_values(values);
    }

    Ok(result_set)
}
