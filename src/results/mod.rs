//! Result materialization: shaping a command's outcome into one of the four
//! result forms (row set, scalar, affected-row count, auto-detected).

pub mod dispatch;
pub mod extract;
pub mod materialize;
pub mod outcome;
pub mod result_set;
pub mod row;

pub use dispatch::{StatementShape, classify_statement};
pub use extract::extract_cell;
pub use materialize::materialize;
pub use outcome::{ExecutionOutcome, OutcomeEnvelope, ROWS_NOT_APPLICABLE};
pub use result_set::ResultSet;
pub use row::Row;
