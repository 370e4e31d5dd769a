//! Value Codec
//!
//! Converts `VariantValue`s to the raw bytes stored next to a `StoreType`
//! tag, and to the text form used in the flat export file.
//!
//! ## Store encoding
//!
//! - String: UTF-8 bytes plus a trailing NUL (an empty string is `[0]`)
//! - Int: 4-byte little-endian word
//! - Bool: 4-byte little-endian word holding 0 or 1
//!
//! Words carry no Int/Bool distinction, so decoding is directed by the
//! type the caller expects.

use crate::options::error::OptionError;
use crate::options::value::{ValueType, VariantValue};
use crate::storage::StoreType;

/// Codec failure, before an option name is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value (or the expected type) has no store encoding
    UnknownType,
    /// Stored representation does not match the expected type
    WrongType { expected: ValueType, found: String },
    /// Text could not be parsed as the tagged type
    Malformed(String),
}

impl CodecError {
    /// Attach the option name this failure belongs to
    pub fn for_option(self, name: &str) -> OptionError {
        match self {
            CodecError::UnknownType => OptionError::UnknownType(name.to_string()),
            CodecError::WrongType { expected, found } => OptionError::WrongType {
                name: name.to_string(),
                expected,
                found,
            },
            CodecError::Malformed(msg) => {
                OptionError::Generic(format!("{}: malformed value: {}", name, msg))
            }
        }
    }
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::UnknownType => write!(f, "unknown value type"),
            CodecError::WrongType { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            CodecError::Malformed(msg) => write!(f, "malformed value: {}", msg),
        }
    }
}

impl std::error::Error for CodecError {}

const WORD_LEN: usize = 4;

/// Stateless value codec
pub struct ValueCodec;

impl ValueCodec {
    // =========================================================================
    // Store encoding
    // =========================================================================

    /// Encode a value for the store
    pub fn encode(value: &VariantValue) -> Result<(Vec<u8>, StoreType), CodecError> {
        match value {
            VariantValue::String(s) => {
                let mut bytes = Vec::with_capacity(s.len() + 1);
                bytes.extend_from_slice(s.as_bytes());
                bytes.push(0);
                Ok((bytes, StoreType::String))
            }
            VariantValue::Int(v) => Ok(((*v as u32).to_le_bytes().to_vec(), StoreType::Word)),
            VariantValue::Bool(v) => Ok(((*v as u32).to_le_bytes().to_vec(), StoreType::Word)),
            VariantValue::Null => Err(CodecError::UnknownType),
        }
    }

    /// Decode stored bytes as the type the caller expects
    pub fn decode(
        bytes: &[u8],
        store_type: StoreType,
        expected: ValueType,
    ) -> Result<VariantValue, CodecError> {
        match (store_type, expected) {
            (_, ValueType::Null) => Err(CodecError::UnknownType),
            (StoreType::String, ValueType::String) => {
                Ok(VariantValue::String(Self::decode_string(bytes)))
            }
            (StoreType::Word, ValueType::Int) if bytes.len() >= WORD_LEN => {
                Ok(VariantValue::Int(Self::decode_word(bytes) as i32))
            }
            (StoreType::Word, ValueType::Bool) if bytes.len() >= WORD_LEN => {
                Ok(VariantValue::Bool(Self::decode_word(bytes) != 0))
            }
            (StoreType::Word, _) if bytes.len() < WORD_LEN => Err(CodecError::WrongType {
                expected,
                found: format!("{}-byte word", bytes.len()),
            }),
            (found, _) => Err(CodecError::WrongType {
                expected,
                found: found.to_string(),
            }),
        }
    }

    /// Decode by store tag alone: words become Int, strings become String.
    ///
    /// Binary values and short words have no option representation.
    pub fn decode_native(bytes: &[u8], store_type: StoreType) -> Option<VariantValue> {
        match store_type {
            StoreType::Word if bytes.len() >= WORD_LEN => {
                Some(VariantValue::Int(Self::decode_word(bytes) as i32))
            }
            StoreType::String => Some(VariantValue::String(Self::decode_string(bytes))),
            _ => None,
        }
    }

    fn decode_word(bytes: &[u8]) -> u32 {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn decode_string(bytes: &[u8]) -> String {
        let end = memchr::memchr(0, bytes).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }

    // =========================================================================
    // Text encoding
    // =========================================================================

    /// Render a value as flat-file text
    pub fn to_text(value: &VariantValue) -> Result<String, CodecError> {
        match value {
            VariantValue::Int(v) => Ok(v.to_string()),
            VariantValue::Bool(v) => Ok(if *v { "1" } else { "0" }.to_string()),
            VariantValue::String(s) => Ok(Self::escape(s)),
            VariantValue::Null => Err(CodecError::UnknownType),
        }
    }

    /// Parse flat-file text as the tagged type
    pub fn from_text(text: &str, tag: ValueType) -> Result<VariantValue, CodecError> {
        match tag {
            ValueType::Int => Self::parse_int(text).map(VariantValue::Int),
            ValueType::Bool => {
                let trimmed = text.trim();
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok(VariantValue::Bool(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Ok(VariantValue::Bool(false))
                } else {
                    Self::parse_int(trimmed).map(|v| VariantValue::Bool(v != 0))
                }
            }
            ValueType::String => Ok(VariantValue::String(Self::unescape(text))),
            ValueType::Null => Err(CodecError::UnknownType),
        }
    }

    /// Parse an integer: decimal, or hex when the second character is `x`.
    /// Parsed as 64 bits, then truncated to 32.
    fn parse_int(text: &str) -> Result<i32, CodecError> {
        let trimmed = text.trim();
        let bytes = trimmed.as_bytes();
        let parsed = if bytes.len() >= 2 && (bytes[1] == b'x' || bytes[1] == b'X') {
            i64::from_str_radix(&trimmed[2..], 16)
        } else {
            trimmed.parse::<i64>()
        };
        parsed
            .map(|v| v as u32 as i32)
            .map_err(|e| CodecError::Malformed(format!("{:?}: {}", trimmed, e)))
    }

    /// Escape text so that it survives a `key=value` line.
    ///
    /// `\`, newline, carriage return, tab and `=` never appear raw. Leading
    /// and trailing spaces become `\s`. A leading `;`, `#` or `[` is escaped
    /// so the line cannot read back as a comment or section header.
    pub fn escape(text: &str) -> String {
        let lead = text.chars().take_while(|c| *c == ' ').count();
        let trail = if lead == text.chars().count() {
            0
        } else {
            text.chars().rev().take_while(|c| *c == ' ').count()
        };
        let total = text.chars().count();

        let mut out = String::with_capacity(text.len() + 8);
        for (i, c) in text.chars().enumerate() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '=' => out.push_str("\\="),
                ' ' if i < lead || i >= total - trail => out.push_str("\\s"),
                ';' | '#' | '[' if i == 0 => {
                    out.push('\\');
                    out.push(c);
                }
                c => out.push(c),
            }
        }
        out
    }

    /// Inverse of `escape`. Unknown escapes are kept as written.
    pub fn unescape(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('=') => out.push('='),
                Some('s') => out.push(' '),
                Some(marker @ (';' | '#' | '[')) => out.push(marker),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        }
        out
    }
}
