use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tiberius::xml::XmlData;
use tiberius::{ColumnType, Uuid};

use crate::error::MssqlExecError;
use crate::types::SqlValue;

/// Extract one cell into the boundary value model, dispatching on the
/// column's declared type rather than probing blindly.
///
/// Binary columns stay raw byte sequences. CLR UDT columns (geometry,
/// geography) are rendered to well-known text where the payload is a simple
/// point, and fall back to the raw byte form otherwise.
///
/// # Errors
///
/// Returns the driver's error if the cell cannot be decoded.
#[allow(clippy::too_many_lines)]
pub fn extract_cell(
    row: &tiberius::Row,
    column_type: ColumnType,
    idx: usize,
) -> Result<SqlValue, MssqlExecError> {
    let value = match column_type {
        ColumnType::Null => SqlValue::Null,

        ColumnType::Bit | ColumnType::Bitn => {
            row.try_get::<bool, _>(idx)?.map_or(SqlValue::Null, SqlValue::Bool)
        }

        ColumnType::Int1 => row
            .try_get::<u8, _>(idx)?
            .map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
        ColumnType::Int2 => row
            .try_get::<i16, _>(idx)?
            .map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
        ColumnType::Int4 => row
            .try_get::<i32, _>(idx)?
            .map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
        ColumnType::Int8 => row
            .try_get::<i64, _>(idx)?
            .map_or(SqlValue::Null, SqlValue::Int),
        ColumnType::Intn => extract_int_any(row, idx),

        ColumnType::Float4 => row
            .try_get::<f32, _>(idx)?
            .map_or(SqlValue::Null, |v| SqlValue::Float(f64::from(v))),
        ColumnType::Float8 | ColumnType::Money | ColumnType::Money4 => row
            .try_get::<f64, _>(idx)?
            .map_or(SqlValue::Null, SqlValue::Float),
        ColumnType::Floatn => extract_float_any(row, idx),

        ColumnType::Decimaln | ColumnType::Numericn => row
            .try_get::<tiberius::numeric::Numeric, _>(idx)?
            .map_or(SqlValue::Null, |n| SqlValue::Float(numeric_to_f64(&n))),

        ColumnType::Guid => row
            .try_get::<Uuid, _>(idx)?
            .map_or(SqlValue::Null, SqlValue::Uuid),

        ColumnType::Daten => row
            .try_get::<NaiveDate, _>(idx)?
            .map_or(SqlValue::Null, SqlValue::Date),
        ColumnType::Timen => row
            .try_get::<NaiveTime, _>(idx)?
            .map_or(SqlValue::Null, SqlValue::Time),
        ColumnType::Datetime
        | ColumnType::Datetime4
        | ColumnType::Datetimen
        | ColumnType::Datetime2 => row
            .try_get::<NaiveDateTime, _>(idx)?
            .map_or(SqlValue::Null, SqlValue::Timestamp),
        ColumnType::DatetimeOffsetn => row
            .try_get::<DateTime<Utc>, _>(idx)?
            .map_or(SqlValue::Null, |dt| SqlValue::Timestamp(dt.naive_utc())),

        ColumnType::BigChar
        | ColumnType::BigVarChar
        | ColumnType::NChar
        | ColumnType::NVarchar
        | ColumnType::Text
        | ColumnType::NText => row
            .try_get::<&str, _>(idx)?
            .map_or(SqlValue::Null, |s| SqlValue::Text(s.to_string())),

        ColumnType::Xml => row
            .try_get::<&XmlData, _>(idx)?
            .map_or(SqlValue::Null, |x| SqlValue::Text(x.to_string())),

        ColumnType::BigBinary | ColumnType::BigVarBin | ColumnType::Image => row
            .try_get::<&[u8], _>(idx)?
            .map_or(SqlValue::Null, |b| SqlValue::Bytes(b.to_vec())),

        ColumnType::Udt => row.try_get::<&[u8], _>(idx)?.map_or(SqlValue::Null, |b| {
            clr_point_to_wkt(b).map_or_else(|| SqlValue::Bytes(b.to_vec()), SqlValue::Text)
        }),

        ColumnType::SSVariant => extract_variant(row, idx),
    };
    Ok(value)
}

#[allow(clippy::cast_precision_loss)]
fn numeric_to_f64(n: &tiberius::numeric::Numeric) -> f64 {
    (n.value() as f64) / 10f64.powi(i32::from(n.scale()))
}

/// Variable-width integers: the wire value decides the decoded width.
fn extract_int_any(row: &tiberius::Row, idx: usize) -> SqlValue {
    if let Ok(Some(v)) = row.try_get::<i64, _>(idx) {
        return SqlValue::Int(v);
    }
    if let Ok(Some(v)) = row.try_get::<i32, _>(idx) {
        return SqlValue::Int(i64::from(v));
    }
    if let Ok(Some(v)) = row.try_get::<i16, _>(idx) {
        return SqlValue::Int(i64::from(v));
    }
    if let Ok(Some(v)) = row.try_get::<u8, _>(idx) {
        return SqlValue::Int(i64::from(v));
    }
    SqlValue::Null
}

fn extract_float_any(row: &tiberius::Row, idx: usize) -> SqlValue {
    if let Ok(Some(v)) = row.try_get::<f64, _>(idx) {
        return SqlValue::Float(v);
    }
    if let Ok(Some(v)) = row.try_get::<f32, _>(idx) {
        return SqlValue::Float(f64::from(v));
    }
    SqlValue::Null
}

fn extract_variant(row: &tiberius::Row, idx: usize) -> SqlValue {
    if let Ok(Some(v)) = row.try_get::<&str, _>(idx) {
        return SqlValue::Text(v.to_string());
    }
    if let Ok(Some(v)) = row.try_get::<i64, _>(idx) {
        return SqlValue::Int(v);
    }
    if let Ok(Some(v)) = row.try_get::<i32, _>(idx) {
        return SqlValue::Int(i64::from(v));
    }
    if let Ok(Some(v)) = row.try_get::<f64, _>(idx) {
        return SqlValue::Float(v);
    }
    if let Ok(Some(v)) = row.try_get::<bool, _>(idx) {
        return SqlValue::Bool(v);
    }
    SqlValue::Null
}

/// Decode a SQL Server CLR geometry/geography payload when it holds exactly
/// one point: SRID (4 bytes LE), version, flags, then two f64 coordinates.
/// The `0x08` flag marks the single-point layout.
fn clr_point_to_wkt(payload: &[u8]) -> Option<String> {
    if payload.len() != 22 {
        return None;
    }
    let version = payload[4];
    let flags = payload[5];
    if version != 0x01 && version != 0x02 {
        return None;
    }
    if flags & 0x08 == 0 {
        return None;
    }
    let x = f64::from_le_bytes(payload[6..14].try_into().ok()?);
    let y = f64::from_le_bytes(payload[14..22].try_into().ok()?);
    Some(format!("POINT ({x} {y})"))
}
