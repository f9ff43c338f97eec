//! Bulk row loading: a JSON row array streamed through the TDS bulk-copy
//! channel inside one transaction, with the same rollback discipline as the
//! statement executor.

use std::borrow::Cow;

use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tiberius::numeric::Numeric;
use tiberius::{ColumnData, ColumnType, IntoSql, Query, TokenRow, Uuid};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::MssqlClient;
use crate::error::MssqlExecError;
use crate::executor::{Session, deliver, guard, settle, with_limits};
use crate::results::{ExecutionOutcome, OutcomeEnvelope};
use crate::types::{FailureMode, IsolationLevel, SqlValue};

/// Caller toggles for the bulk-copy channel.
///
/// The driver's bulk channel does not expose SQL Server's `INSERT BULK`
/// flags, so `fire_triggers`, `keep_identity`, `keep_nulls`, `table_lock`,
/// and `check_constraints` cannot currently be forwarded; a load requesting
/// them proceeds with the server defaults and logs a warning naming the
/// ignored flags. `notify_after` is honored locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BulkOptions {
    /// Fire insert triggers on the target table.
    pub fire_triggers: bool,
    /// Keep source identity values instead of generating new ones.
    pub keep_identity: bool,
    /// Keep NULLs verbatim instead of applying column defaults.
    pub keep_nulls: bool,
    /// Hold a table-level lock for the duration of the load.
    pub table_lock: bool,
    /// Check constraints during the load.
    pub check_constraints: bool,
    /// Emit a progress event every N rows.
    pub notify_after: Option<u64>,
}

impl BulkOptions {
    /// The requested flags the driver's bulk channel cannot forward.
    fn unforwarded_flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.fire_triggers {
            flags.push("fire_triggers");
        }
        if self.keep_identity {
            flags.push("keep_identity");
        }
        if self.keep_nulls {
            flags.push("keep_nulls");
        }
        if self.table_lock {
            flags.push("table_lock");
        }
        if self.check_constraints {
            flags.push("check_constraints");
        }
        flags
    }
}

/// A bulk-insert request: target table, JSON row array, and call options.
#[derive(Debug, Clone)]
pub struct BulkInsertRequest {
    /// Opaque ADO connection string, passed through to the driver unchanged.
    pub connection_string: String,
    /// Target table, optionally schema-qualified (`dbo.people`).
    pub table: String,
    /// JSON array of objects; column mapping is by key name, order-independent.
    pub rows: JsonValue,
    pub options: BulkOptions,
    pub isolation: IsolationLevel,
    pub timeout_secs: Option<u64>,
    pub failure_mode: FailureMode,
}

impl BulkInsertRequest {
    pub fn new(
        connection_string: impl Into<String>,
        table: impl Into<String>,
        rows: JsonValue,
    ) -> Self {
        Self {
            connection_string: connection_string.into(),
            table: table.into(),
            rows,
            options: BulkOptions::default(),
            isolation: IsolationLevel::Default,
            timeout_secs: None,
            failure_mode: FailureMode::Capture,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: BulkOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    #[must_use]
    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }
}

/// Stream the request's JSON rows into the target table inside one
/// transaction. Returns the usual envelope; `records_affected` carries the
/// loaded row count, 0 on any failure.
///
/// # Errors
///
/// With `FailureMode::Propagate`, any fault after the rollback attempt;
/// with `Capture`, faults land in the envelope.
pub async fn bulk_insert(
    request: &BulkInsertRequest,
    cancel: &CancellationToken,
) -> Result<OutcomeEnvelope, MssqlExecError> {
    let result = run(request, cancel).await;
    deliver(result, request.failure_mode)
}

async fn run(
    request: &BulkInsertRequest,
    cancel: &CancellationToken,
) -> Result<ExecutionOutcome, MssqlExecError> {
    let rows = parse_rows(&request.rows)?;

    let mut session = guard(cancel, Session::connect(&request.connection_string)).await?;
    session.begin(request.isolation).await?;

    let result = {
        let load = load_rows(session.client_mut(), request, &rows);
        with_limits(cancel, request.timeout_secs, load).await
    };

    settle(session, result).await
}

fn parse_rows(rows: &JsonValue) -> Result<Vec<&serde_json::Map<String, JsonValue>>, MssqlExecError> {
    let array = rows.as_array().ok_or_else(|| {
        MssqlExecError::ParameterError("bulk insert rows must be a JSON array".to_string())
    })?;
    array
        .iter()
        .map(|row| {
            row.as_object().ok_or_else(|| {
                MssqlExecError::ParameterError(
                    "bulk insert rows must be JSON objects keyed by column name".to_string(),
                )
            })
        })
        .collect()
}

async fn load_rows(
    client: &mut MssqlClient,
    request: &BulkInsertRequest,
    rows: &[&serde_json::Map<String, JsonValue>],
) -> Result<ExecutionOutcome, MssqlExecError> {
    let table = quote_table(&request.table);
    let table_columns = fetch_columns(client, &table).await?;

    for row in rows {
        for key in row.keys() {
            if !table_columns
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case(key))
            {
                return Err(MssqlExecError::ParameterError(format!(
                    "bulk insert row key '{key}' does not match a column of {table}"
                )));
            }
        }
    }

    let unforwarded = request.options.unforwarded_flags();
    if !unforwarded.is_empty() {
        warn!(flags = ?unforwarded, "bulk-copy flags not forwarded by the driver");
    }

    // The driver's bulk channel loads every table column, so each token row
    // covers the full column list in table order; absent keys become typed
    // NULLs.
    let mut load = client.bulk_insert(&table).await?;

    let mut sent: u64 = 0;
    for row in rows {
        let mut token_row = TokenRow::new();
        for (name, column_type) in &table_columns {
            let cell = row
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v);
            token_row.push(encode_cell(cell, *column_type, name)?);
        }
        load.send(token_row).await?;
        sent += 1;
        if let Some(every) = request.options.notify_after {
            if every > 0 && sent % every == 0 {
                debug!(rows_sent = sent, "bulk load progress");
            }
        }
    }

    let result = load.finalize().await?;
    let affected: u64 = result.rows_affected().iter().sum();
    debug!(sent, affected, "bulk load finalized");
    Ok(ExecutionOutcome::NonQuery {
        affected: if affected == 0 { sent } else { affected },
    })
}

/// Read the target table's column names and types with a zero-row select.
async fn fetch_columns(
    client: &mut MssqlClient,
    table: &str,
) -> Result<Vec<(String, ColumnType)>, MssqlExecError> {
    let mut stream = Query::new(format!("SELECT TOP (0) * FROM {table}"))
        .query(client)
        .await?;
    let columns: Vec<(String, ColumnType)> = stream
        .columns()
        .await?
        .map(|cols| {
            cols.iter()
                .map(|c| (c.name().to_string(), c.column_type()))
                .collect()
        })
        .unwrap_or_default();

    // Drain the (empty) stream so the protocol finishes cleanly.
    let mut rows = stream.into_row_stream();
    while (rows.try_next().await?).is_some() {}

    if columns.is_empty() {
        return Err(MssqlExecError::ExecutionError(format!(
            "no columns found for bulk insert target {table}"
        )));
    }
    Ok(columns)
}

/// Bracket-quote a possibly schema-qualified table name.
fn quote_table(table: &str) -> String {
    table
        .split('.')
        .map(|part| format!("[{}]", part.replace(']', "]]")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Encode one JSON cell as the driver column data for its destination
/// column. Absent keys and JSON nulls become typed NULLs, never omissions.
#[allow(clippy::too_many_lines, clippy::cast_possible_truncation)]
fn encode_cell(
    cell: Option<&JsonValue>,
    column_type: ColumnType,
    column: &str,
) -> Result<ColumnData<'static>, MssqlExecError> {
    let mismatch = |value: &SqlValue| {
        MssqlExecError::ParameterError(format!(
            "bulk insert column '{column}': value {value:?} cannot load into {column_type:?}"
        ))
    };

    // Binary destinations accept a JSON byte array; everything else goes
    // through the boundary value model.
    if matches!(
        column_type,
        ColumnType::BigBinary | ColumnType::BigVarBin | ColumnType::Image
    ) {
        return match cell {
            None | Some(JsonValue::Null) => Ok(ColumnData::Binary(None)),
            Some(JsonValue::Array(items)) => {
                let bytes = items
                    .iter()
                    .map(|item| {
                        item.as_u64().and_then(|b| u8::try_from(b).ok()).ok_or_else(|| {
                            MssqlExecError::ParameterError(format!(
                                "bulk insert column '{column}': binary rows must be byte arrays"
                            ))
                        })
                    })
                    .collect::<Result<Vec<u8>, _>>()?;
                Ok(ColumnData::Binary(Some(Cow::Owned(bytes))))
            }
            Some(other) => Err(mismatch(&SqlValue::from_json(other))),
        };
    }

    let value = cell.map_or(SqlValue::Null, SqlValue::from_json);

    let data = match column_type {
        ColumnType::Bit | ColumnType::Bitn => match &value {
            SqlValue::Null => ColumnData::Bit(None),
            v => ColumnData::Bit(Some(v.as_bool().ok_or_else(|| mismatch(v))?)),
        },
        ColumnType::Int1 => match &value {
            SqlValue::Null => ColumnData::U8(None),
            v => {
                let i = v.as_int().ok_or_else(|| mismatch(v))?;
                ColumnData::U8(Some(u8::try_from(i).map_err(|_| mismatch(v))?))
            }
        },
        ColumnType::Int2 => match &value {
            SqlValue::Null => ColumnData::I16(None),
            v => {
                let i = v.as_int().ok_or_else(|| mismatch(v))?;
                ColumnData::I16(Some(i16::try_from(i).map_err(|_| mismatch(v))?))
            }
        },
        ColumnType::Int4 | ColumnType::Intn => match &value {
            SqlValue::Null => ColumnData::I32(None),
            v => {
                let i = v.as_int().ok_or_else(|| mismatch(v))?;
                match i32::try_from(i) {
                    Ok(narrow) => ColumnData::I32(Some(narrow)),
                    Err(_) => ColumnData::I64(Some(i)),
                }
            }
        },
        ColumnType::Int8 => match &value {
            SqlValue::Null => ColumnData::I64(None),
            v => ColumnData::I64(Some(v.as_int().ok_or_else(|| mismatch(v))?)),
        },
        ColumnType::Float4 => match &value {
            SqlValue::Null => ColumnData::F32(None),
            v => ColumnData::F32(Some(v.as_float().ok_or_else(|| mismatch(v))? as f32)),
        },
        ColumnType::Float8
        | ColumnType::Floatn
        | ColumnType::Money
        | ColumnType::Money4 => match &value {
            SqlValue::Null => ColumnData::F64(None),
            v => ColumnData::F64(Some(v.as_float().ok_or_else(|| mismatch(v))?)),
        },
        ColumnType::Decimaln | ColumnType::Numericn => match &value {
            SqlValue::Null => ColumnData::Numeric(None),
            v => {
                let f = v.as_float().ok_or_else(|| mismatch(v))?;
                ColumnData::Numeric(Some(float_to_numeric(f)))
            }
        },
        ColumnType::Guid => match &value {
            SqlValue::Null => ColumnData::Guid(None),
            SqlValue::Text(s) => ColumnData::Guid(Some(
                Uuid::parse_str(s.trim()).map_err(|_| mismatch(&value))?,
            )),
            v => return Err(mismatch(v)),
        },
        ColumnType::Daten => match &value {
            SqlValue::Null => ColumnData::String(None),
            SqlValue::Text(s) => chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| mismatch(&value))?
                .into_sql(),
            v => return Err(mismatch(v)),
        },
        ColumnType::Timen => match &value {
            SqlValue::Null => ColumnData::String(None),
            SqlValue::Text(s) => chrono::NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                .or_else(|_| chrono::NaiveTime::parse_from_str(s.trim(), "%H:%M:%S"))
                .map_err(|_| mismatch(&value))?
                .into_sql(),
            v => return Err(mismatch(v)),
        },
        ColumnType::Datetime
        | ColumnType::Datetime4
        | ColumnType::Datetimen
        | ColumnType::Datetime2
        | ColumnType::DatetimeOffsetn => match &value {
            SqlValue::Null => ColumnData::String(None),
            v => v.as_timestamp().ok_or_else(|| mismatch(v))?.into_sql(),
        },
        _ => match &value {
            SqlValue::Null => ColumnData::String(None),
            v => ColumnData::String(Some(Cow::Owned(v.to_string()))),
        },
    };
    Ok(data)
}

/// Represent a float as driver numeric data, keeping the value's own scale.
fn float_to_numeric(f: f64) -> Numeric {
    let text = format!("{f}");
    let scale = text.split('.').nth(1).map_or(0, str::len);
    let scale = u8::try_from(scale.min(10)).unwrap_or(10);
    #[allow(clippy::cast_possible_truncation)]
    let scaled = (f * 10f64.powi(i32::from(scale))).round() as i128;
    Numeric::new_with_scale(scaled, scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unforwarded_flags_are_named() {
        let opts = BulkOptions {
            fire_triggers: true,
            keep_identity: true,
            keep_nulls: false,
            table_lock: true,
            check_constraints: false,
            notify_after: None,
        };
        assert_eq!(
            opts.unforwarded_flags(),
            vec!["fire_triggers", "keep_identity", "table_lock"]
        );
        assert!(BulkOptions::default().unforwarded_flags().is_empty());
    }

    #[test]
    fn table_names_are_bracket_quoted() {
        assert_eq!(quote_table("people"), "[people]");
        assert_eq!(quote_table("dbo.people"), "[dbo].[people]");
        assert_eq!(quote_table("odd]name"), "[odd]]name]");
    }

    #[test]
    fn rows_must_be_an_array_of_objects() {
        assert!(parse_rows(&serde_json::json!({"a": 1})).is_err());
        assert!(parse_rows(&serde_json::json!([1, 2])).is_err());
        assert_eq!(
            parse_rows(&serde_json::json!([{"a": 1}, {"b": 2}]))
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn absent_and_null_cells_become_typed_nulls() {
        let data = encode_cell(None, ColumnType::Int4, "n").unwrap();
        assert!(matches!(data, ColumnData::I32(None)));
        let data = encode_cell(Some(&JsonValue::Null), ColumnType::Bitn, "b").unwrap();
        assert!(matches!(data, ColumnData::Bit(None)));
    }

    #[test]
    fn binary_cells_take_byte_arrays() {
        let value = serde_json::json!([137, 80, 78, 71]);
        let data = encode_cell(Some(&value), ColumnType::Image, "img").unwrap();
        match data {
            ColumnData::Binary(Some(bytes)) => assert_eq!(&bytes[..], &[137, 80, 78, 71]),
            other => panic!("unexpected column data: {other:?}"),
        }
    }

    #[test]
    fn numeric_scale_follows_the_value() {
        let n = float_to_numeric(1523.25);
        assert_eq!(n.scale(), 2);
        assert_eq!(n.value(), 152_325);
    }
}
