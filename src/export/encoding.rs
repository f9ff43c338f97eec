//! Output text encodings for CSV files.
//!
//! Labels resolve before any connection opens, so a bad encoding name fails
//! the call without touching the database.

use super::options::FileEncoding;
use crate::error::MssqlExecError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// A resolved encoder. `SystemDefault` resolves to UTF-8; process-locale
/// codepages are not consulted, output is locale-stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Utf8,
    Ascii,
    Utf16Le,
    Latin1,
}

impl Codec {
    /// # Errors
    ///
    /// `ConfigError` for an unrecognized custom encoding label.
    pub fn resolve(encoding: &FileEncoding) -> Result<Self, MssqlExecError> {
        match encoding {
            FileEncoding::Utf8 | FileEncoding::SystemDefault => Ok(Codec::Utf8),
            FileEncoding::Ascii => Ok(Codec::Ascii),
            FileEncoding::Utf16 => Ok(Codec::Utf16Le),
            FileEncoding::Custom(label) => match label.trim().to_lowercase().as_str() {
                "utf-8" | "utf8" => Ok(Codec::Utf8),
                "ascii" | "us-ascii" => Ok(Codec::Ascii),
                "utf-16" | "utf16" | "utf-16le" => Ok(Codec::Utf16Le),
                "latin1" | "iso-8859-1" | "windows-1252" => Ok(Codec::Latin1),
                _ => Err(MssqlExecError::ConfigError(format!(
                    "unsupported file encoding '{label}'"
                ))),
            },
        }
    }

    /// Encode one chunk of output text. Characters outside the target
    /// repertoire become `?`.
    #[must_use]
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Codec::Utf8 => text.as_bytes().to_vec(),
            Codec::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            Codec::Utf16Le => text
                .encode_utf16()
                .flat_map(u16::to_le_bytes)
                .collect(),
            Codec::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }

    /// The byte-order mark to write first, when one applies.
    #[must_use]
    pub fn bom(self, enabled: bool) -> &'static [u8] {
        if enabled && self == Codec::Utf8 {
            UTF8_BOM
        } else {
            &[]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_resolve_case_insensitively() {
        assert_eq!(
            Codec::resolve(&FileEncoding::Custom("Latin1".to_string())).unwrap(),
            Codec::Latin1
        );
        assert_eq!(
            Codec::resolve(&FileEncoding::Custom("ISO-8859-1".to_string())).unwrap(),
            Codec::Latin1
        );
        assert_eq!(
            Codec::resolve(&FileEncoding::Custom("utf-8".to_string())).unwrap(),
            Codec::Utf8
        );
        assert!(Codec::resolve(&FileEncoding::Custom("klingon".to_string())).is_err());
    }

    #[test]
    fn system_default_is_utf8() {
        assert_eq!(Codec::resolve(&FileEncoding::SystemDefault).unwrap(), Codec::Utf8);
    }

    #[test]
    fn ascii_replaces_out_of_range_characters() {
        assert_eq!(Codec::Ascii.encode("Meikäläinen"), b"Meik?l?inen".to_vec());
        assert_eq!(Codec::Ascii.encode("plain"), b"plain".to_vec());
    }

    #[test]
    fn latin1_keeps_the_first_256_codepoints() {
        assert_eq!(Codec::Latin1.encode("Meikäläinen"), b"Meik\xE4l\xE4inen".to_vec());
        assert_eq!(Codec::Latin1.encode("\u{20AC}"), b"?".to_vec());
    }

    #[test]
    fn utf16_is_little_endian_without_bom() {
        assert_eq!(Codec::Utf16Le.encode("A"), vec![0x41, 0x00]);
        assert_eq!(Codec::Utf16Le.bom(true), &[] as &[u8]);
    }

    #[test]
    fn bom_applies_only_to_utf8() {
        assert_eq!(Codec::Utf8.bom(true), &[0xEF, 0xBB, 0xBF]);
        assert_eq!(Codec::Utf8.bom(false), &[] as &[u8]);
        assert_eq!(Codec::Latin1.bom(true), &[] as &[u8]);
    }
}
