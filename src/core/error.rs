use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl LedgerError {
    /// Whether the caller may retry the failed operation as-is. Only the
    /// flag-number assignment race qualifies; everything else is a hard error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict(_))
    }
}
