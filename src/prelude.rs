//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::bulk::{BulkInsertRequest, BulkOptions, bulk_insert};
pub use crate::error::{MssqlExecError, RollbackOutcome};
pub use crate::executor::execute;
pub use crate::export::{
    CsvOptions, CsvWriteResult, Delimiter, ExportRequest, FileEncoding, LineBreak, export_to_file,
};
pub use crate::results::{ExecutionOutcome, OutcomeEnvelope, ResultSet, Row};
pub use crate::types::{
    ExecuteKind, ExecutionRequest, FailureMode, IsolationLevel, Parameter, SqlParamType, SqlValue,
};
