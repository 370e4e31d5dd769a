//! Option error types

use crate::options::value::ValueType;
use crate::storage::StoreError;
use std::io::Error as IoError;

/// Error returned by option and persistence operations
#[derive(Debug)]
pub enum OptionError {
    /// I/O or backend failure
    Generic(String),
    /// Option or stored value does not exist
    NotFound(String),
    /// Value type does not match what was expected
    WrongType {
        name: String,
        expected: ValueType,
        found: String,
    },
    /// Value has no store encoding
    UnknownType(String),
}

/// Flat result code for callers that only need the category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Ok,
    GenericError,
    NotFound,
    WrongType,
    UnknownType,
}

impl OptionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            OptionError::Generic(_) => ErrorCode::GenericError,
            OptionError::NotFound(_) => ErrorCode::NotFound,
            OptionError::WrongType { .. } => ErrorCode::WrongType,
            OptionError::UnknownType(_) => ErrorCode::UnknownType,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OptionError::NotFound(_))
    }
}

impl ErrorCode {
    /// Collapse a result into its code
    pub fn of<T>(result: &Result<T, OptionError>) -> ErrorCode {
        match result {
            Ok(_) => ErrorCode::Ok,
            Err(e) => e.code(),
        }
    }
}

impl std::fmt::Display for OptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionError::Generic(msg) => write!(f, "Option error: {}", msg),
            OptionError::NotFound(name) => write!(f, "Option not found: {}", name),
            OptionError::WrongType {
                name,
                expected,
                found,
            } => write!(
                f,
                "Wrong type for {}: expected {}, found {}",
                name, expected, found
            ),
            OptionError::UnknownType(name) => write!(f, "Unknown type for {}", name),
        }
    }
}

impl std::error::Error for OptionError {}

impl From<StoreError> for OptionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => OptionError::NotFound(what),
            other => OptionError::Generic(other.to_string()),
        }
    }
}

impl From<IoError> for OptionError {
    fn from(e: IoError) -> Self {
        OptionError::Generic(e.to_string())
    }
}
