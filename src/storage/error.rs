//! Store error type

use std::io::{Error as IoError, ErrorKind};

/// Error type for hierarchical store operations
#[derive(Debug)]
pub enum StoreError {
    /// Key or value does not exist
    NotFound(String),
    /// Handle refers to a key that has since been deleted
    KeyDeleted(String),
    /// Caller's buffer is too small; `required` bytes are needed
    MoreData { required: usize },
    /// Stored data failed validation
    Corrupt(String),
    /// I/O error
    Io(IoError),
    /// Other errors
    Other(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(what) => write!(f, "Not found: {}", what),
            StoreError::KeyDeleted(path) => write!(f, "Key deleted: {}", path),
            StoreError::MoreData { required } => {
                write!(f, "Buffer too small: {} bytes required", required)
            }
            StoreError::Corrupt(msg) => write!(f, "Corrupt value: {}", msg),
            StoreError::Io(e) => write!(f, "Store I/O error: {}", e),
            StoreError::Other(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for StoreError {
    fn from(e: IoError) -> Self {
        match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(e.to_string()),
            _ => StoreError::Io(e),
        }
    }
}
