use serde_json::{Map, Value as JsonValue};

use super::result_set::ResultSet;
use crate::error::MssqlExecError;
use crate::types::SqlValue;

/// Sentinel meaning "row count not applicable" for Reader-kind results.
pub const ROWS_NOT_APPLICABLE: i64 = -1;

/// The shaped outcome of a successful execution, discriminated by the
/// requested execute kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Affected-row count from the provider.
    NonQuery { affected: u64 },
    /// First column of the first row; `SqlValue::Null` when no row came back.
    Scalar { value: SqlValue, affected: u64 },
    /// Full ordered result set.
    Rows(ResultSet),
}

impl ExecutionOutcome {
    /// The records-affected figure this outcome reports; `-1` for row sets.
    #[must_use]
    pub fn records_affected(&self) -> i64 {
        match self {
            ExecutionOutcome::NonQuery { affected } | ExecutionOutcome::Scalar { affected, .. } => {
                i64::try_from(*affected).unwrap_or(i64::MAX)
            }
            ExecutionOutcome::Rows(_) => ROWS_NOT_APPLICABLE,
        }
    }

    /// Project into the uniform result document: `{"AffectedRows": n}`,
    /// `{"Value": v}`, or the ordered row array.
    #[must_use]
    pub fn to_document(&self) -> JsonValue {
        match self {
            ExecutionOutcome::NonQuery { affected } => {
                let mut map = Map::new();
                map.insert("AffectedRows".to_string(), JsonValue::from(*affected));
                JsonValue::Object(map)
            }
            ExecutionOutcome::Scalar { value, .. } => {
                let mut map = Map::new();
                map.insert("Value".to_string(), value.to_json());
                JsonValue::Object(map)
            }
            ExecutionOutcome::Rows(rs) => JsonValue::Array(rs.to_documents()),
        }
    }
}

/// The uniform wrapper returned when faults are captured rather than raised.
///
/// Built fresh per call and never persisted. On failure `data` is `None` and
/// `records_affected` is 0; a fault is never partially swallowed.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeEnvelope {
    pub success: bool,
    pub error_message: Option<String>,
    pub data: Option<ExecutionOutcome>,
    pub records_affected: i64,
}

impl OutcomeEnvelope {
    #[must_use]
    pub fn succeeded(outcome: ExecutionOutcome) -> Self {
        let records_affected = outcome.records_affected();
        Self {
            success: true,
            error_message: None,
            data: Some(outcome),
            records_affected,
        }
    }

    #[must_use]
    pub fn failed(error: &MssqlExecError) -> Self {
        Self {
            success: false,
            error_message: Some(error.to_string()),
            data: None,
            records_affected: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_outcome_reports_the_sentinel() {
        let outcome = ExecutionOutcome::Rows(ResultSet::new(vec!["a".into()]));
        assert_eq!(outcome.records_affected(), -1);
        let envelope = OutcomeEnvelope::succeeded(outcome);
        assert!(envelope.success);
        assert_eq!(envelope.records_affected, -1);
    }

    #[test]
    fn nonquery_echo_document() {
        let outcome = ExecutionOutcome::NonQuery { affected: 3 };
        assert_eq!(
            outcome.to_document(),
            serde_json::json!({"AffectedRows": 3})
        );
        assert_eq!(outcome.records_affected(), 3);
    }

    #[test]
    fn scalar_document_wraps_the_value() {
        let outcome = ExecutionOutcome::Scalar {
            value: SqlValue::Null,
            affected: 0,
        };
        assert_eq!(outcome.to_document(), serde_json::json!({"Value": null}));
    }

    #[test]
    fn failure_envelope_is_fully_populated() {
        let err = MssqlExecError::ExecutionError("Login failed for user 'sa'".to_string());
        let envelope = OutcomeEnvelope::failed(&err);
        assert!(!envelope.success);
        assert!(envelope.error_message.unwrap().contains("Login failed"));
        assert!(envelope.data.is_none());
        assert_eq!(envelope.records_affected, 0);
    }
}
