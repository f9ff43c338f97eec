//! Parameter binding: named-placeholder rewriting plus typed conversion of
//! boundary values into driver parameters.
//!
//! NULL always produces a bound, typed NULL parameter. An omitted NULL is the
//! defect class this module exists to prevent.

pub mod rewrite;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tiberius::{Query, Uuid};

use crate::error::MssqlExecError;
use crate::types::{Parameter, SqlParamType, SqlValue};

pub use rewrite::rewrite_named;

/// Driver-side representation a parameter binds as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindTarget {
    Bit,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Real,
    Float,
    Str,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
    Uuid,
    Bytes,
}

/// A parameter after placeholder resolution and type resolution, ready to
/// hand to the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub target: BindTarget,
    pub value: SqlValue,
}

/// Resolve the statement and its parameters into driver-ready form: the
/// rewritten positional statement plus bound parameters in bind order.
///
/// # Errors
///
/// Returns `MssqlExecError::ParameterError` for unmatched placeholders or
/// value/declared-type combinations that cannot be represented.
pub fn prepare(
    statement: &str,
    params: &[Parameter],
) -> Result<(String, Vec<BoundParam>), MssqlExecError> {
    let (sql, order) = rewrite_named(statement, params)?;
    let mut bound = Vec::with_capacity(order.len());
    for idx in order {
        bound.push(resolve(&params[idx])?);
    }
    Ok((sql, bound))
}

/// Resolve one parameter: pick the bind target from the declared type (or the
/// value's runtime shape for `Auto`) and coerce the value to match.
///
/// # Errors
///
/// Returns `MssqlExecError::ParameterError` when the value cannot be
/// represented as the declared type.
pub fn resolve(param: &Parameter) -> Result<BoundParam, MssqlExecError> {
    let target = match param.param_type {
        SqlParamType::Auto => infer_target(&param.value),
        explicit => declared_target(explicit),
    };
    let value = coerce(&param.value, target, &param.name)?;
    Ok(BoundParam { target, value })
}

fn infer_target(value: &SqlValue) -> BindTarget {
    match value {
        // A NULL with no declared type binds as a generic string-typed NULL.
        SqlValue::Null | SqlValue::Text(_) => BindTarget::Str,
        SqlValue::Bool(_) => BindTarget::Bit,
        SqlValue::Int(_) => BindTarget::BigInt,
        SqlValue::Float(_) => BindTarget::Float,
        SqlValue::Date(_) => BindTarget::Date,
        SqlValue::Time(_) => BindTarget::Time,
        SqlValue::Timestamp(_) => BindTarget::DateTime,
        SqlValue::Uuid(_) => BindTarget::Uuid,
        SqlValue::Bytes(_) => BindTarget::Bytes,
    }
}

fn declared_target(ty: SqlParamType) -> BindTarget {
    match ty {
        SqlParamType::Bit => BindTarget::Bit,
        SqlParamType::TinyInt => BindTarget::TinyInt,
        SqlParamType::SmallInt => BindTarget::SmallInt,
        SqlParamType::Int => BindTarget::Int,
        SqlParamType::BigInt => BindTarget::BigInt,
        SqlParamType::Real => BindTarget::Real,
        SqlParamType::Float | SqlParamType::Decimal | SqlParamType::Money => BindTarget::Float,
        SqlParamType::Char
        | SqlParamType::VarChar
        | SqlParamType::NChar
        | SqlParamType::NVarChar
        | SqlParamType::Text
        | SqlParamType::NText
        | SqlParamType::Xml => BindTarget::Str,
        SqlParamType::Date => BindTarget::Date,
        SqlParamType::Time => BindTarget::Time,
        SqlParamType::DateTime | SqlParamType::DateTime2 | SqlParamType::SmallDateTime => {
            BindTarget::DateTime
        }
        SqlParamType::DateTimeOffset => BindTarget::DateTimeOffset,
        SqlParamType::UniqueIdentifier => BindTarget::Uuid,
        SqlParamType::Binary | SqlParamType::VarBinary | SqlParamType::Image => BindTarget::Bytes,
        SqlParamType::Auto => unreachable!("Auto resolves through infer_target"),
    }
}

#[allow(clippy::too_many_lines)]
fn coerce(value: &SqlValue, target: BindTarget, name: &str) -> Result<SqlValue, MssqlExecError> {
    let mismatch = || {
        MssqlExecError::ParameterError(format!(
            "parameter '{name}': value {value:?} cannot bind as {target:?}"
        ))
    };

    if value.is_null() {
        return Ok(SqlValue::Null);
    }

    let coerced = match target {
        BindTarget::Bit => SqlValue::Bool(value.as_bool().ok_or_else(mismatch)?),
        BindTarget::TinyInt | BindTarget::SmallInt | BindTarget::Int | BindTarget::BigInt => {
            let i = match value {
                SqlValue::Int(i) => *i,
                SqlValue::Bool(b) => i64::from(*b),
                #[allow(clippy::cast_possible_truncation)]
                SqlValue::Float(f) if f.fract() == 0.0 => *f as i64,
                SqlValue::Text(s) => s.trim().parse::<i64>().map_err(|_| mismatch())?,
                _ => return Err(mismatch()),
            };
            let fits = match target {
                BindTarget::TinyInt => u8::try_from(i).is_ok(),
                BindTarget::SmallInt => i16::try_from(i).is_ok(),
                BindTarget::Int => i32::try_from(i).is_ok(),
                _ => true,
            };
            if !fits {
                return Err(mismatch());
            }
            SqlValue::Int(i)
        }
        BindTarget::Real | BindTarget::Float => {
            let f = match value {
                SqlValue::Text(s) => s.trim().parse::<f64>().map_err(|_| mismatch())?,
                other => other.as_float().ok_or_else(mismatch)?,
            };
            SqlValue::Float(f)
        }
        BindTarget::Str => match value {
            SqlValue::Text(s) => SqlValue::Text(s.clone()),
            SqlValue::Bytes(_) => return Err(mismatch()),
            other => SqlValue::Text(other.to_string()),
        },
        BindTarget::Date => match value {
            SqlValue::Date(d) => SqlValue::Date(*d),
            SqlValue::Timestamp(ts) => SqlValue::Date(ts.date()),
            SqlValue::Text(s) => SqlValue::Date(
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| mismatch())?,
            ),
            _ => return Err(mismatch()),
        },
        BindTarget::Time => match value {
            SqlValue::Time(t) => SqlValue::Time(*t),
            SqlValue::Timestamp(ts) => SqlValue::Time(ts.time()),
            SqlValue::Text(s) => SqlValue::Time(parse_time_text(s.trim()).ok_or_else(mismatch)?),
            _ => return Err(mismatch()),
        },
        BindTarget::DateTime | BindTarget::DateTimeOffset => {
            SqlValue::Timestamp(value.as_timestamp().ok_or_else(mismatch)?)
        }
        BindTarget::Uuid => match value {
            SqlValue::Uuid(u) => SqlValue::Uuid(*u),
            SqlValue::Text(s) => {
                SqlValue::Uuid(Uuid::parse_str(s.trim()).map_err(|_| mismatch())?)
            }
            _ => return Err(mismatch()),
        },
        BindTarget::Bytes => match value {
            SqlValue::Bytes(b) => SqlValue::Bytes(b.clone()),
            _ => return Err(mismatch()),
        },
    };
    Ok(coerced)
}

fn parse_time_text(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Bind every resolved parameter onto the query in order. NULLs bind as
/// typed `Option::None` so the parameter is present in the TDS request.
pub fn bind_all(query: &mut Query<'_>, params: &[BoundParam]) {
    for p in params {
        bind_one(query, p);
    }
}

#[allow(clippy::cast_possible_truncation)]
fn bind_one(query: &mut Query<'_>, param: &BoundParam) {
    match (param.target, &param.value) {
        (BindTarget::Bit, SqlValue::Bool(b)) => query.bind(*b),
        (BindTarget::Bit, _) => query.bind(Option::<bool>::None),
        (BindTarget::TinyInt, SqlValue::Int(i)) => query.bind(*i as u8),
        (BindTarget::TinyInt, _) => query.bind(Option::<u8>::None),
        (BindTarget::SmallInt, SqlValue::Int(i)) => query.bind(*i as i16),
        (BindTarget::SmallInt, _) => query.bind(Option::<i16>::None),
        (BindTarget::Int, SqlValue::Int(i)) => query.bind(*i as i32),
        (BindTarget::Int, _) => query.bind(Option::<i32>::None),
        (BindTarget::BigInt, SqlValue::Int(i)) => query.bind(*i),
        (BindTarget::BigInt, _) => query.bind(Option::<i64>::None),
        (BindTarget::Real, SqlValue::Float(f)) => query.bind(*f as f32),
        (BindTarget::Real, _) => query.bind(Option::<f32>::None),
        (BindTarget::Float, SqlValue::Float(f)) => query.bind(*f),
        (BindTarget::Float, _) => query.bind(Option::<f64>::None),
        (BindTarget::Str, SqlValue::Text(s)) => query.bind(s.clone()),
        (BindTarget::Str, _) => query.bind(Option::<String>::None),
        (BindTarget::Date, SqlValue::Date(d)) => query.bind(*d),
        (BindTarget::Date, _) => query.bind(Option::<NaiveDate>::None),
        (BindTarget::Time, SqlValue::Time(t)) => query.bind(*t),
        (BindTarget::Time, _) => query.bind(Option::<NaiveTime>::None),
        (BindTarget::DateTime, SqlValue::Timestamp(ts)) => query.bind(*ts),
        (BindTarget::DateTime, _) => query.bind(Option::<NaiveDateTime>::None),
        (BindTarget::DateTimeOffset, SqlValue::Timestamp(ts)) => {
            query.bind(DateTime::<Utc>::from_naive_utc_and_offset(*ts, Utc));
        }
        (BindTarget::DateTimeOffset, _) => query.bind(Option::<DateTime<Utc>>::None),
        (BindTarget::Uuid, SqlValue::Uuid(u)) => query.bind(*u),
        (BindTarget::Uuid, _) => query.bind(Option::<Uuid>::None),
        (BindTarget::Bytes, SqlValue::Bytes(b)) => query.bind(b.clone()),
        (BindTarget::Bytes, _) => query.bind(Option::<Vec<u8>>::None),
    }
}
