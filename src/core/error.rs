/// Sequel Error Module
///
/// This module defines the error types surfaced by every adapter. Driver
/// failures are carried through unchanged inside `SequelError::Driver`.
use thiserror::Error;

/// A failure reported by the Driver Facade.
///
/// `code` holds the engine's native error number when the driver exposes
/// one (SQL Server message numbers, SQLite extended result codes).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct DriverError {
    pub code: Option<i32>,
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        DriverError {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        DriverError {
            code: Some(code),
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(ffi, _) => Some(ffi.extended_code),
            _ => None,
        };
        DriverError {
            code,
            message: err.to_string(),
        }
    }
}

/// Error type for every public operation of this crate.
#[derive(Error, Debug)]
pub enum SequelError {
    /// The connection descriptor named a scheme with no registered adapter
    #[error("Unsupported adapter: {0}")]
    UnsupportedAdapter(String),

    /// The driver reported a column type with no logical mapping
    #[error("Unknown column type '{type_name}' for column {table}.{column}")]
    UnknownColumnType {
        table: String,
        column: String,
        type_name: String,
    },

    /// Update or ordered read attempted on a table without a primary key
    #[error("Table '{0}' has no primary key")]
    NoPrimaryKey(String),

    /// A row was used for a table-bound operation without an owning table
    #[error("Row is not associated with a table: {0}")]
    MissingTable(String),

    /// A parameter name that cannot follow the '@' prefix
    #[error("Invalid parameter name: {0}")]
    InvalidParameter(String),

    /// Opaque passthrough of Driver Facade failures
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for SequelError {
    fn from(err: rusqlite::Error) -> Self {
        SequelError::Driver(err.into())
    }
}

/// Type alias for Result to use SequelError as the error type.
pub type Result<T> = std::result::Result<T, SequelError>;
