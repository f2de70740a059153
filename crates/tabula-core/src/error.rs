//! Typed errors for the core crate.

use std::fmt;

/// Errors raised by the table engine and the upload store.
#[derive(Debug)]
pub enum CoreError {
    /// The requested table is not registered.
    TableNotFound(String),
    /// A table name could not be derived from the upload.
    InvalidTableName(String),
    /// The file extension is not one of the accepted upload formats.
    UnsupportedFormat(String),
    /// The uploaded content could not be parsed.
    InvalidUpload(String),
    /// The SQL text could not be parsed.
    InvalidSql(String),
    /// The SQL parsed but is not a single read-only query.
    ForbiddenStatement(String),
    /// DataFusion failed to plan or execute a query.
    QueryFailed(String),
    /// Reading or writing the data directory failed.
    Io(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::TableNotFound(msg) => write!(f, "table not found: {}", msg),
            CoreError::InvalidTableName(msg) => write!(f, "invalid table name: {}", msg),
            CoreError::UnsupportedFormat(msg) => write!(f, "unsupported file format: {}", msg),
            CoreError::InvalidUpload(msg) => write!(f, "invalid upload: {}", msg),
            CoreError::InvalidSql(msg) => write!(f, "invalid SQL: {}", msg),
            CoreError::ForbiddenStatement(msg) => write!(f, "forbidden statement: {}", msg),
            CoreError::QueryFailed(msg) => write!(f, "query failed: {}", msg),
            CoreError::Io(msg) => write!(f, "io error: {}", msg),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<datafusion::error::DataFusionError> for CoreError {
    fn from(e: datafusion::error::DataFusionError) -> Self {
        CoreError::QueryFailed(e.to_string())
    }
}

impl From<arrow::error::ArrowError> for CoreError {
    fn from(e: arrow::error::ArrowError) -> Self {
        CoreError::QueryFailed(e.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e.to_string())
    }
}
