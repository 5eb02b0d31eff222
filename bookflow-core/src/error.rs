//! Error types for Bookflow Core

use crate::source::SourceType;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using BookflowError
pub type Result<T> = std::result::Result<T, BookflowError>;

/// Top-level error type for all Bookflow operations
#[derive(Debug, Error)]
pub enum BookflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while a workflow is being assembled.
///
/// All of these abort before any item is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported reader type: {0}")]
    UnsupportedReader(SourceType),

    #[error("Unsupported writer type: {0}")]
    UnsupportedWriter(SourceType),

    #[error("Unknown source type: {0}")]
    UnknownSourceType(String),

    #[error("Writer type {0} needs a callback supplied in code")]
    CallbackRequired(SourceType),

    #[error("Destination does not exist: {}", .0.display())]
    DestinationMissing(PathBuf),

    #[error("Reader type {0} needs a source path")]
    MissingSourcePath(SourceType),

    #[error("Cannot open destination {}: {reason}", path.display())]
    Destination { path: PathBuf, reason: String },

    #[error("Invalid mapping file {}: {reason}", path.display())]
    MappingFile { path: PathBuf, reason: String },
}

/// Errors decoding a single source item into a record
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unreadable file: {0}")]
    Unreadable(String),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("Incorrect version: {0}")]
    IncorrectVersion(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Malformed content: {0}")]
    MalformedContent(String),
}

/// Errors persisting a record to a destination
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Record rejected: {0}")]
    Rejected(String),
}

impl WriteError {
    /// Whether the destination itself is unusable, as opposed to one bad record.
    pub fn is_fatal(&self) -> bool {
        use rusqlite::ErrorCode;

        match self {
            WriteError::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseCorrupt
                    | ErrorCode::NotADatabase
                    | ErrorCode::CannotOpen
                    | ErrorCode::ReadOnly
                    | ErrorCode::DiskFull
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::PermissionDenied
            ),
            WriteError::Database(_) => false,
            WriteError::Io(_) => true,
            WriteError::Serialization(_) | WriteError::Rejected(_) => false,
        }
    }
}

impl From<csv::Error> for WriteError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            match err.into_kind() {
                csv::ErrorKind::Io(io) => WriteError::Io(io),
                other => WriteError::Serialization(format!("{:?}", other)),
            }
        } else {
            WriteError::Serialization(err.to_string())
        }
    }
}

impl From<serde_json::Error> for WriteError {
    fn from(err: serde_json::Error) -> Self {
        WriteError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let corrupt = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CORRUPT),
            None,
        );
        assert!(WriteError::Database(corrupt).is_fatal());

        let constraint = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            None,
        );
        assert!(!WriteError::Database(constraint).is_fatal());

        assert!(!WriteError::Rejected("empty title".to_string()).is_fatal());
    }

    #[test]
    fn test_config_error_names_type() {
        let err = ConfigError::UnsupportedWriter(SourceType::LocalBooks);
        assert!(err.to_string().contains("LOCAL_BOOKS"));
    }
}
