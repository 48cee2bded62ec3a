//! Core error types.

use thiserror::Error;

/// Errors building or reshaping a table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("column '{column}' has {actual} rows, expected {expected}")]
    RaggedColumns {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),
}

/// Errors in serialization options.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("unknown serialization option: {0}")]
    UnknownOption(String),

    #[error("invalid value for option '{key}': {value}")]
    InvalidValue { key: String, value: String },

    #[error("batch_size must be greater than zero")]
    ZeroBatchSize,
}

/// Errors from a serializer.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("table has no columns")]
    EmptySchema,

    #[error("unsupported column type for '{column}': {data_type}")]
    UnsupportedType { column: String, data_type: String },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("invalid table: {0}")]
    Table(#[from] TableError),

    #[error("invalid options: {0}")]
    Options(#[from] OptionsError),
}

impl SerializeError {
    /// Returns an error code suitable for protocol responses.
    pub fn error_code(&self) -> &'static str {
        "SERIALIZATION_FAILED"
    }
}

/// Errors applying an operation to its argument.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("operation not found: {0}")]
    NotFound(String),

    #[error("type mismatch in '{operation}': expected {expected}, got {actual}")]
    TypeMismatch {
        operation: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid argument to '{operation}': {reason}")]
    InvalidArgument { operation: String, reason: String },
}

impl OperationError {
    /// Returns an error code suitable for protocol responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            OperationError::NotFound(_) => "UNKNOWN_OPERATION",
            OperationError::TypeMismatch { .. } => "TYPE_MISMATCH",
            OperationError::InvalidArgument { .. } => "INVALID_ARGUMENT",
        }
    }
}
