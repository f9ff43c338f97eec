use thiserror::Error;

/// How a rollback attempt ended after a primary fault.
///
/// The rollback result is only ever an annotation on the fault that caused it;
/// the primary diagnostic text always renders first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// Rollback completed (or no transaction was open to roll back).
    Completed,
    /// Rollback itself failed; carries the secondary diagnostic.
    Failed(String),
}

impl RollbackOutcome {
    #[must_use]
    pub fn annotation(&self) -> String {
        match self {
            RollbackOutcome::Completed => {
                " (If required) transaction rollback completed without exception".to_string()
            }
            RollbackOutcome::Failed(detail) => format!(" (rollback failed: {detail})"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MssqlExecError {
    #[error(transparent)]
    Tiberius(#[from] tiberius::error::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    /// A fault that triggered a rollback attempt. Displays the primary fault
    /// first and the rollback outcome as a trailing annotation, never the
    /// other way around.
    #[error("{source}{}", .rollback.annotation())]
    RolledBack {
        source: Box<MssqlExecError>,
        rollback: RollbackOutcome,
    },
}

impl MssqlExecError {
    /// Wrap a primary fault with the outcome of the rollback it triggered.
    #[must_use]
    pub fn with_rollback(self, rollback: RollbackOutcome) -> Self {
        MssqlExecError::RolledBack {
            source: Box::new(self),
            rollback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_annotation_keeps_primary_text_first() {
        let primary = MssqlExecError::ExecutionError("divide by zero".to_string());
        let wrapped = primary.with_rollback(RollbackOutcome::Completed);
        let text = wrapped.to_string();
        assert!(text.starts_with("SQL execution error: divide by zero"));
        assert!(text.ends_with("transaction rollback completed without exception"));
    }

    #[test]
    fn failed_rollback_is_appended_not_substituted() {
        let primary = MssqlExecError::ExecutionError("constraint violation".to_string());
        let wrapped =
            primary.with_rollback(RollbackOutcome::Failed("connection reset".to_string()));
        let text = wrapped.to_string();
        let primary_pos = text.find("constraint violation").unwrap();
        let secondary_pos = text.find("connection reset").unwrap();
        assert!(primary_pos < secondary_pos);
    }
}
