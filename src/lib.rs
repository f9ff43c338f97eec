//! Transactional SQL Server execution with typed parameter binding, shaped
//! result projection, bulk JSON row loading, and streaming CSV export.
//!
//! Every call is an independent unit of work: a fresh connection, a
//! transaction at the requested isolation level, and a commit on success or
//! a rollback on any fault. Faults either propagate as errors annotated with
//! the rollback outcome or come back captured in an [`OutcomeEnvelope`],
//! depending on the request's failure mode.
//!
//! ```no_run
//! use mssql_exec::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), MssqlExecError> {
//! let request = ExecutionRequest::new(
//!     "Server=tcp:localhost,1433;User Id=sa;Password=secret;TrustServerCertificate=true",
//!     "SELECT Id, LastName FROM People WHERE LastName = @LastName",
//! )
//! .with_params(vec![Parameter::new("LastName", SqlValue::Text("Meikalainen".into()))])
//! .with_kind(ExecuteKind::ExecuteReader);
//!
//! let envelope = execute(&request, &CancellationToken::new()).await?;
//! assert!(envelope.success);
//! # Ok(())
//! # }
//! ```

pub mod bulk;
pub mod client;
pub mod error;
pub mod executor;
pub mod export;
pub mod params;
pub mod prelude;
pub mod results;
pub mod types;

pub use bulk::{BulkInsertRequest, BulkOptions, bulk_insert};
pub use error::{MssqlExecError, RollbackOutcome};
pub use executor::execute;
pub use export::{
    CsvOptions, CsvWriteResult, Delimiter, ExportRequest, FileEncoding, LineBreak, export_to_file,
};
pub use results::{ExecutionOutcome, OutcomeEnvelope, ROWS_NOT_APPLICABLE, ResultSet, Row};
pub use types::{
    ExecuteKind, ExecutionRequest, FailureMode, IsolationLevel, Parameter, SqlParamType, SqlValue,
};
