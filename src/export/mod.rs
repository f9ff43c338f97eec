//! CSV projection: stream a live row cursor straight into a delimited text
//! file, inside the same transaction/rollback discipline as the statement
//! executor. The full result set is never buffered in memory.

pub mod encoding;
pub mod format;
pub mod options;

use std::path::{Path, PathBuf};

use futures_util::TryStreamExt;
use tiberius::Query;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::MssqlClient;
use crate::error::MssqlExecError;
use crate::executor::{Session, guard, settle, with_limits};
use crate::params::{self, BoundParam, bind_all};
use crate::results::extract_cell;
use crate::types::{IsolationLevel, Parameter, SqlValue};

pub use encoding::Codec;
pub use format::{ColumnClass, format_cell, hex_dump, render_line, sanitize_header};
pub use options::{CsvOptions, CsvWriteResult, Delimiter, FileEncoding, LineBreak};

/// A file-export request: query, call options, and destination path.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Opaque ADO connection string, passed through to the driver unchanged.
    pub connection_string: String,
    pub statement: String,
    pub params: Vec<Parameter>,
    pub isolation: IsolationLevel,
    pub timeout_secs: Option<u64>,
    pub path: PathBuf,
    pub options: CsvOptions,
}

impl ExportRequest {
    pub fn new(
        connection_string: impl Into<String>,
        statement: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            connection_string: connection_string.into(),
            statement: statement.into(),
            params: Vec::new(),
            isolation: IsolationLevel::Default,
            timeout_secs: None,
            path: path.into(),
            options: CsvOptions::default(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Vec<Parameter>) -> Self {
        self.params = params;
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
    pub fn with_options(mut self, options: CsvOptions) -> Self {
        self.options = options;
        self
    }
}

/// Run the request's query and stream its rows to the destination file.
///
/// The cursor stays bound to the open transaction for the write's duration;
/// the transaction commits only after the last row reaches the writer. The
/// destination file is held exclusively until then.
///
/// # Errors
///
/// Any configuration, connectivity, statement, decode, or file I/O fault,
/// annotated with the rollback outcome when a transaction was open.
pub async fn export_to_file(
    request: &ExportRequest,
    cancel: &CancellationToken,
) -> Result<CsvWriteResult, MssqlExecError> {
    // Pre-connection faults: encoding label and parameter resolution.
    let codec = Codec::resolve(&request.options.file_encoding)?;
    let (sql, bound) = params::prepare(&request.statement, &request.params)?;

    let mut session = guard(cancel, Session::connect(&request.connection_string)).await?;
    session.begin(request.isolation).await?;

    let result = {
        let write = write_csv(session.client_mut(), &sql, &bound, request, codec);
        with_limits(cancel, request.timeout_secs, write).await
    };

    settle(session, result).await
}

async fn write_csv(
    client: &mut MssqlClient,
    sql: &str,
    bound: &[BoundParam],
    request: &ExportRequest,
    codec: Codec,
) -> Result<CsvWriteResult, MssqlExecError> {
    let options = &request.options;

    let mut query = Query::new(sql.to_string());
    bind_all(&mut query, bound);
    let mut stream = query.query(client).await?;

    // Column plan, computed once: index, class, and header text per
    // included column.
    let mut indexes: Vec<usize> = Vec::new();
    let mut classes: Vec<ColumnClass> = Vec::new();
    let mut headers: Vec<String> = Vec::new();
    if let Some(columns) = stream.columns().await? {
        for (idx, column) in columns.iter().enumerate() {
            if !include_column(column.name(), options.columns_to_include.as_deref()) {
                continue;
            }
            indexes.push(idx);
            classes.push(ColumnClass::of(column.column_type()));
            headers.push(format::header_text(column.name(), options));
        }
    }

    let file = File::create(&request.path).await?;
    let mut writer = BufWriter::new(file);
    writer.write_all(codec.bom(options.enable_bom)).await?;

    let line_break = options.line_break.as_str();
    if options.include_headers {
        let header_line = headers.join(options.field_delimiter.as_str());
        write_line(&mut writer, &header_line, line_break, codec).await?;
    }

    let mut rows_written: u64 = 0;
    let mut rows = stream.into_row_stream();
    while let Some(row) = rows.try_next().await? {
        let mut values: Vec<SqlValue> = Vec::with_capacity(indexes.len());
        for &idx in &indexes {
            values.push(extract_cell(&row, column_type_of(&row, idx), idx)?);
        }
        let line = render_line(&values, &classes, options);
        write_line(&mut writer, &line, line_break, codec).await?;
        rows_written += 1;
    }

    writer.flush().await?;
    debug!(rows_written, path = %request.path.display(), "csv export finished");

    Ok(CsvWriteResult {
        rows_written,
        file_name: file_name_of(&request.path),
        path: request.path.clone(),
    })
}

fn column_type_of(row: &tiberius::Row, idx: usize) -> tiberius::ColumnType {
    row.columns()
        .get(idx)
        .map_or(tiberius::ColumnType::Null, tiberius::Column::column_type)
}

async fn write_line<W: AsyncWrite + Unpin>(
    writer: &mut W,
    line: &str,
    line_break: &str,
    codec: Codec,
) -> Result<(), MssqlExecError> {
    writer.write_all(&codec.encode(line)).await?;
    writer.write_all(&codec.encode(line_break)).await?;
    Ok(())
}

fn include_column(name: &str, allow_list: Option<&[String]>) -> bool {
    allow_list.is_none_or(|columns| columns.iter().any(|c| c.eq_ignore_ascii_case(name)))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn semicolon_export_matches_the_expected_framing() {
        let options = CsvOptions::new()
            .field_delimiter(Delimiter::Semicolon)
            .add_quotes_to_strings(true);
        let headers = ["Id", "LastName", "FirstName", "Salary"]
            .map(str::to_string)
            .join(options.field_delimiter.as_str());
        let values = vec![
            SqlValue::Int(1),
            SqlValue::Text("Meikalainen".to_string()),
            SqlValue::Text("Matti".to_string()),
            SqlValue::Text("1523,25".to_string()),
        ];
        let classes = vec![
            ColumnClass::Other,
            ColumnClass::Textual,
            ColumnClass::Textual,
            ColumnClass::Textual,
        ];

        let mut out: Vec<u8> = Vec::new();
        let codec = Codec::Utf8;
        write_line(&mut out, &headers, "\r\n", codec).await.unwrap();
        let line = render_line(&values, &classes, &options);
        write_line(&mut out, &line, "\r\n", codec).await.unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Id;LastName;FirstName;Salary\r\n1;\"Meikalainen\";\"Matti\";\"1523,25\"\r\n"
        );
    }

    #[test]
    fn allow_list_matches_case_insensitively() {
        let allow = vec!["id".to_string(), "LASTNAME".to_string()];
        assert!(include_column("Id", Some(&allow)));
        assert!(include_column("LastName", Some(&allow)));
        assert!(!include_column("Salary", Some(&allow)));
        assert!(include_column("anything", None));
    }

    #[test]
    fn file_name_comes_from_the_path() {
        assert_eq!(file_name_of(Path::new("/tmp/out/people.csv")), "people.csv");
        assert_eq!(file_name_of(Path::new("people.csv")), "people.csv");
    }

    #[test]
    fn request_builder_defaults() {
        let req = ExportRequest::new("Server=tcp:localhost,1433", "SELECT 1", "/tmp/x.csv");
        assert_eq!(req.isolation, IsolationLevel::Default);
        assert!(req.timeout_secs.is_none());
        assert!(req.params.is_empty());
        assert_eq!(req.options.field_delimiter, Delimiter::Comma);
    }
}
