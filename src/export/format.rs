//! Per-cell and per-header text rules for the CSV projection.
//!
//! Cells format by the value's runtime shape, not the column's declared SQL
//! type; the declared type only decides how a NULL is rendered (quoted-empty
//! for textual and quote-configured date columns).

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use tiberius::ColumnType;

use super::options::CsvOptions;
use crate::types::SqlValue;

static NEWLINE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\r\n]+").unwrap());
static HEADER_STRIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());
static HEADER_LEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9_]+").unwrap());

/// How a column's declared type steers NULL rendering and quote defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    Textual,
    DateOnly,
    OtherTemporal,
    Other,
}

impl ColumnClass {
    #[must_use]
    pub fn of(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::BigChar
            | ColumnType::BigVarChar
            | ColumnType::NChar
            | ColumnType::NVarchar
            | ColumnType::Text
            | ColumnType::NText
            | ColumnType::Xml => ColumnClass::Textual,
            ColumnType::Daten => ColumnClass::DateOnly,
            ColumnType::Timen
            | ColumnType::Datetime
            | ColumnType::Datetime4
            | ColumnType::Datetimen
            | ColumnType::Datetime2
            | ColumnType::DatetimeOffsetn => ColumnClass::OtherTemporal,
            _ => ColumnClass::Other,
        }
    }

    fn is_temporal(self) -> bool {
        matches!(self, ColumnClass::DateOnly | ColumnClass::OtherTemporal)
    }
}

/// Normalized header text: non-alphanumeric/underscore characters dropped, a
/// leading digit/underscore run dropped, the rest lower-cased.
#[must_use]
pub fn sanitize_header(name: &str) -> String {
    let stripped = HEADER_STRIP.replace_all(name, "");
    let stripped = HEADER_LEAD.replace(&stripped, "");
    stripped.to_lowercase()
}

#[must_use]
pub fn header_text(name: &str, options: &CsvOptions) -> String {
    if options.sanitize_headers {
        sanitize_header(name)
    } else {
        name.to_string()
    }
}

/// Format one cell. Values never carry a raw CR or LF into the output, so a
/// row always occupies exactly one line.
#[must_use]
pub fn format_cell(value: &SqlValue, class: ColumnClass, options: &CsvOptions) -> String {
    match value {
        SqlValue::Null => format_null(class, options),
        SqlValue::Text(s) => {
            let escaped = s.replace('"', "\\\"");
            let flat = NEWLINE_RUN.replace_all(&escaped, " ").into_owned();
            maybe_quote(flat, options.add_quotes_to_strings)
        }
        SqlValue::Date(d) => maybe_quote(
            d.format(&options.date_format).to_string(),
            options.add_quotes_to_dates,
        ),
        SqlValue::Timestamp(ts) => maybe_quote(
            ts.format(&options.date_time_format).to_string(),
            options.add_quotes_to_dates,
        ),
        SqlValue::Time(t) => maybe_quote(t.to_string(), options.add_quotes_to_dates),
        SqlValue::Float(f) => format_float(*f),
        SqlValue::Bytes(bytes) => hex_dump(bytes),
        other => other.to_string(),
    }
}

fn format_null(class: ColumnClass, options: &CsvOptions) -> String {
    let quoted = match class {
        ColumnClass::Textual => options.add_quotes_to_strings,
        _ if class.is_temporal() => options.add_quotes_to_dates,
        _ => false,
    };
    if quoted {
        "\"\"".to_string()
    } else {
        String::new()
    }
}

fn maybe_quote(text: String, quote: bool) -> String {
    if quote {
        format!("\"{text}\"")
    } else {
        text
    }
}

/// Locale-invariant decimal rendering: up to 11 fractional digits, trailing
/// zeros trimmed, and no trailing point.
#[must_use]
pub fn format_float(value: f64) -> String {
    let text = format!("{value:.11}");
    let text = text.trim_end_matches('0');
    text.trim_end_matches('.').to_string()
}

/// Uppercase hyphen-separated hex dump of every byte (`89-50-4E-47`).
#[must_use]
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push('-');
        }
        let _ = write!(out, "{byte:02X}");
    }
    out
}

/// Join one row's formatted cells into a single output line, without the
/// trailing line break.
#[must_use]
pub fn render_line(
    values: &[SqlValue],
    classes: &[ColumnClass],
    options: &CsvOptions,
) -> String {
    let cells: Vec<String> = values
        .iter()
        .zip(classes)
        .map(|(value, class)| format_cell(value, *class, options))
        .collect();
    cells.join(options.field_delimiter.as_str())
}
