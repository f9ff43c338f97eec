use std::path::PathBuf;

/// Field delimiter placed between cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Comma,
    Pipe,
    Semicolon,
    Custom(String),
}

impl Delimiter {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Delimiter::Comma => ",",
            Delimiter::Pipe => "|",
            Delimiter::Semicolon => ";",
            Delimiter::Custom(s) => s,
        }
    }
}

/// Line break written after every line, the header included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineBreak {
    #[default]
    Crlf,
    Cr,
    Lf,
}

impl LineBreak {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LineBreak::Crlf => "\r\n",
            LineBreak::Cr => "\r",
            LineBreak::Lf => "\n",
        }
    }
}

/// Output text encoding. `Custom` carries an encoding label resolved at
/// export time; an unknown label fails the call before any connection opens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FileEncoding {
    #[default]
    Utf8,
    Ascii,
    SystemDefault,
    Utf16,
    Custom(String),
}

/// Options for the CSV projection.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Column allow-list; `None` includes every cursor column.
    pub columns_to_include: Option<Vec<String>>,
    pub field_delimiter: Delimiter,
    pub line_break: LineBreak,
    pub file_encoding: FileEncoding,
    /// Write a byte-order mark. Meaningful only for UTF-8.
    pub enable_bom: bool,
    pub include_headers: bool,
    /// Normalize header text: drop non-alphanumeric/underscore characters,
    /// drop a leading digit/underscore run, lower-case the rest.
    pub sanitize_headers: bool,
    pub add_quotes_to_dates: bool,
    pub add_quotes_to_strings: bool,
    pub date_format: String,
    pub date_time_format: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            columns_to_include: None,
            field_delimiter: Delimiter::Comma,
            line_break: LineBreak::Crlf,
            file_encoding: FileEncoding::Utf8,
            enable_bom: false,
            include_headers: true,
            sanitize_headers: false,
            add_quotes_to_dates: false,
            add_quotes_to_strings: false,
            date_format: "%Y-%m-%d".to_string(),
            date_time_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

impl CsvOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn columns_to_include(mut self, columns: Vec<String>) -> Self {
        self.columns_to_include = Some(columns);
        self
    }

    #[must_use]
    pub fn field_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.field_delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn line_break(mut self, line_break: LineBreak) -> Self {
        self.line_break = line_break;
        self
    }

    #[must_use]
    pub fn file_encoding(mut self, encoding: FileEncoding) -> Self {
        self.file_encoding = encoding;
        self
    }

    #[must_use]
    pub fn enable_bom(mut self, enable: bool) -> Self {
        self.enable_bom = enable;
        self
    }

    #[must_use]
    pub fn include_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }

    #[must_use]
    pub fn sanitize_headers(mut self, sanitize: bool) -> Self {
        self.sanitize_headers = sanitize;
        self
    }

    #[must_use]
    pub fn add_quotes_to_dates(mut self, quote: bool) -> Self {
        self.add_quotes_to_dates = quote;
        self
    }

    #[must_use]
    pub fn add_quotes_to_strings(mut self, quote: bool) -> Self {
        self.add_quotes_to_strings = quote;
        self
    }

    #[must_use]
    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    #[must_use]
    pub fn date_time_format(mut self, format: impl Into<String>) -> Self {
        self.date_time_format = format.into();
        self
    }
}

/// What a finished export produced. The header line never counts toward
/// `rows_written`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvWriteResult {
    pub rows_written: u64,
    pub path: PathBuf,
    pub file_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_defaults() {
        let opts = CsvOptions::default();
        assert_eq!(opts.field_delimiter, Delimiter::Comma);
        assert_eq!(opts.line_break, LineBreak::Crlf);
        assert_eq!(opts.file_encoding, FileEncoding::Utf8);
        assert!(opts.include_headers);
        assert!(!opts.enable_bom);
        assert!(!opts.sanitize_headers);
        assert!(opts.columns_to_include.is_none());
        assert_eq!(opts.date_format, "%Y-%m-%d");
    }

    #[test]
    fn builder_applies_every_field() {
        let opts = CsvOptions::new()
            .field_delimiter(Delimiter::Semicolon)
            .line_break(LineBreak::Lf)
            .file_encoding(FileEncoding::Utf16)
            .enable_bom(true)
            .include_headers(false)
            .sanitize_headers(true)
            .add_quotes_to_dates(true)
            .add_quotes_to_strings(true)
            .columns_to_include(vec!["Id".to_string()])
            .date_format("%d.%m.%Y")
            .date_time_format("%d.%m.%Y %H:%M");
        assert_eq!(opts.field_delimiter.as_str(), ";");
        assert_eq!(opts.line_break.as_str(), "\n");
        assert_eq!(opts.file_encoding, FileEncoding::Utf16);
        assert!(opts.enable_bom);
        assert!(!opts.include_headers);
        assert!(opts.sanitize_headers);
        assert!(opts.add_quotes_to_dates);
        assert!(opts.add_quotes_to_strings);
        assert_eq!(opts.columns_to_include.as_deref(), Some(&["Id".to_string()][..]));
        assert_eq!(opts.date_format, "%d.%m.%Y");
    }

    #[test]
    fn custom_delimiter_passes_through() {
        assert_eq!(Delimiter::Custom("||".to_string()).as_str(), "||");
        assert_eq!(Delimiter::Pipe.as_str(), "|");
    }
}
