use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::ValueEnum;
use serde_json::Value as JsonValue;
use tiberius::Uuid;

/// Values that can cross the boundary of this crate: query parameters going
/// in, and result cells coming out.
///
/// JSON-origin input is converted eagerly into this model before it reaches
/// the binder, so no untyped value ever threads through binding logic:
/// ```rust
/// use mssql_exec::SqlValue;
///
/// let params = vec![
///     SqlValue::Int(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Null,
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Date-only value
    Date(NaiveDate),
    /// Time-only value
    Time(NaiveTime),
    /// Date-and-time value
    Timestamp(NaiveDateTime),
    /// Uniqueidentifier value
    Uuid(Uuid),
    /// Binary data, preserved byte-for-byte
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let SqlValue::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(value) => Some(*value),
            SqlValue::Int(0) => Some(false),
            SqlValue::Int(1) => Some(true),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SqlValue::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::Timestamp(value) => Some(*value),
            SqlValue::Date(d) => d.and_hms_opt(0, 0, 0),
            SqlValue::Text(s) => parse_datetime_text(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let SqlValue::Bytes(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Eager conversion from a JSON value into the boundary model.
    ///
    /// Numbers without a fractional part become `Int`; arrays and objects are
    /// carried as their JSON text form.
    #[must_use]
    pub fn from_json(value: &JsonValue) -> SqlValue {
        match value {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(b) => SqlValue::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Int(i)
                } else {
                    SqlValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            JsonValue::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }

    /// Project into a JSON document value.
    ///
    /// Binary stays a byte array (not text-encoded); temporal values use
    /// fixed ISO forms so documents are locale-stable.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            SqlValue::Null => JsonValue::Null,
            SqlValue::Bool(b) => JsonValue::Bool(*b),
            SqlValue::Int(i) => JsonValue::from(*i),
            SqlValue::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number)
            }
            SqlValue::Text(s) => JsonValue::String(s.clone()),
            SqlValue::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            SqlValue::Time(t) => JsonValue::String(t.format("%H:%M:%S%.f").to_string()),
            SqlValue::Timestamp(ts) => {
                JsonValue::String(ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
            }
            SqlValue::Uuid(u) => JsonValue::String(u.to_string()),
            SqlValue::Bytes(bytes) => {
                JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect())
            }
        }
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Null => Ok(()),
            SqlValue::Bool(b) => write!(f, "{b}"),
            SqlValue::Int(i) => write!(f, "{i}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Text(s) => write!(f, "{s}"),
            SqlValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            SqlValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            SqlValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S%.f")),
            SqlValue::Uuid(u) => write!(f, "{u}"),
            SqlValue::Bytes(bytes) => write!(f, "{}", crate::export::hex_dump(bytes)),
        }
    }
}

fn parse_datetime_text(s: &str) -> Option<NaiveDateTime> {
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    None
}

/// Declared provider type for a parameter, or `Auto` to infer from the
/// value's runtime shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlParamType {
    Auto,
    Bit,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Real,
    Decimal,
    Money,
    Char,
    VarChar,
    NChar,
    NVarChar,
    Text,
    NText,
    Xml,
    Date,
    Time,
    DateTime,
    DateTime2,
    SmallDateTime,
    DateTimeOffset,
    UniqueIdentifier,
    Binary,
    VarBinary,
    Image,
}

impl SqlParamType {
    #[must_use]
    pub fn is_auto(self) -> bool {
        matches!(self, SqlParamType::Auto)
    }
}

/// A named parameter with its value and declared (or inferred) type.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Placeholder name as it appears in the statement, without the `@`.
    pub name: String,
    pub value: SqlValue,
    pub param_type: SqlParamType,
}

impl Parameter {
    /// Parameter with an auto-inferred provider type.
    pub fn new(name: impl Into<String>, value: SqlValue) -> Self {
        Self::typed(name, value, SqlParamType::Auto)
    }

    /// Parameter with an explicit declared type, honored verbatim regardless
    /// of the value's shape.
    pub fn typed(name: impl Into<String>, value: SqlValue, param_type: SqlParamType) -> Self {
        let name = name.into();
        let name = name.strip_prefix('@').map_or(name.clone(), str::to_string);
        Self {
            name,
            value,
            param_type,
        }
    }
}

/// Concurrency-control strength requested for the call's transaction.
///
/// `Default` and `Unspecified` defer to the driver's default; `None` runs the
/// statement autocommit with no transaction wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum IsolationLevel {
    Unspecified,
    None,
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Snapshot,
}

impl IsolationLevel {
    /// Whether the call runs inside an explicit transaction.
    #[must_use]
    pub fn wraps_transaction(self) -> bool {
        !matches!(self, IsolationLevel::None)
    }

    /// The `SET TRANSACTION ISOLATION LEVEL` argument, when one applies.
    #[must_use]
    pub fn set_clause(self) -> Option<&'static str> {
        match self {
            IsolationLevel::Unspecified | IsolationLevel::None | IsolationLevel::Default => None,
            IsolationLevel::ReadUncommitted => Some("READ UNCOMMITTED"),
            IsolationLevel::ReadCommitted => Some("READ COMMITTED"),
            IsolationLevel::RepeatableRead => Some("REPEATABLE READ"),
            IsolationLevel::Serializable => Some("SERIALIZABLE"),
            IsolationLevel::Snapshot => Some("SNAPSHOT"),
        }
    }
}

/// Which result shape a call requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ExecuteKind {
    /// Inspect the statement's shape and pick Reader or NonQuery semantics.
    Auto,
    /// Affected-row count only.
    NonQuery,
    /// First column of the first row.
    Scalar,
    /// Full ordered result set.
    ExecuteReader,
}

/// What to do when a call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Raise the fault to the caller (`Err`), annotated with rollback detail.
    Propagate,
    /// Capture the fault into a failure `OutcomeEnvelope`.
    Capture,
}

/// A single execution request: statement, parameters, and call options.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Opaque ADO connection string, passed through to the driver unchanged.
    pub connection_string: String,
    pub statement: String,
    pub params: Vec<Parameter>,
    pub kind: ExecuteKind,
    pub isolation: IsolationLevel,
    /// Per-call execute timeout in seconds; `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
    pub failure_mode: FailureMode,
}

impl ExecutionRequest {
    pub fn new(connection_string: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            statement: statement.into(),
            params: Vec::new(),
            kind: ExecuteKind::Auto,
            isolation: IsolationLevel::Default,
            timeout_secs: None,
            failure_mode: FailureMode::Capture,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Vec<Parameter>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ExecuteKind) -> Self {
        self.kind = kind;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_vocabulary_maps_to_set_clauses() {
        assert_eq!(
            IsolationLevel::ReadUncommitted.set_clause(),
            Some("READ UNCOMMITTED")
        );
        assert_eq!(IsolationLevel::Snapshot.set_clause(), Some("SNAPSHOT"));
        assert_eq!(IsolationLevel::Default.set_clause(), None);
        assert_eq!(IsolationLevel::Unspecified.set_clause(), None);
        assert!(!IsolationLevel::None.wraps_transaction());
        assert!(IsolationLevel::Default.wraps_transaction());
    }

    #[test]
    fn json_numbers_become_int_when_integral() {
        let v: serde_json::Value = serde_json::json!(42);
        assert_eq!(SqlValue::from_json(&v), SqlValue::Int(42));
        let v: serde_json::Value = serde_json::json!(1.5);
        assert_eq!(SqlValue::from_json(&v), SqlValue::Float(1.5));
        let v: serde_json::Value = serde_json::json!(null);
        assert!(SqlValue::from_json(&v).is_null());
    }

    #[test]
    fn parameter_name_drops_at_prefix() {
        let p = Parameter::new("@LastName", SqlValue::Text("x".into()));
        assert_eq!(p.name, "LastName");
        let p = Parameter::new("LastName", SqlValue::Null);
        assert_eq!(p.name, "LastName");
    }

    #[test]
    fn request_builder_defaults() {
        let req = ExecutionRequest::new("Server=tcp:localhost,1433", "SELECT 1");
        assert_eq!(req.kind, ExecuteKind::Auto);
        assert_eq!(req.isolation, IsolationLevel::Default);
        assert_eq!(req.failure_mode, FailureMode::Capture);
        assert!(req.timeout_secs.is_none());
    }
}
