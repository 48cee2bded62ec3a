//! Server error types.

use arrowgate_core::{OperationError, SerializeError};
use arrowgate_protocol::{ErrorCode, ProtocolError};
use thiserror::Error;

/// Failures propagated out of the dispatcher.
///
/// Everything except `Transport` is reported to the client as an error line
/// and the connection stays open.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] SerializeError),

    #[error("{0}")]
    Operation(#[from] OperationError),

    #[error("frame write failed: {0}")]
    Transport(std::io::Error),

    #[error("cannot frame payload: {0}")]
    Frame(#[from] ProtocolError),
}

impl DispatchError {
    /// Converts to protocol error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            DispatchError::Serialization(_) => ErrorCode::SerializationFailed,
            DispatchError::Operation(e) => match e.error_code() {
                "UNKNOWN_OPERATION" => ErrorCode::UnknownOperation,
                "TYPE_MISMATCH" => ErrorCode::TypeMismatch,
                "INVALID_ARGUMENT" => ErrorCode::InvalidArgument,
                _ => ErrorCode::InternalError,
            },
            DispatchError::Transport(_) => ErrorCode::InternalError,
            DispatchError::Frame(ProtocolError::FrameTooLarge { .. }) => ErrorCode::PayloadTooLarge,
            DispatchError::Frame(_) => ErrorCode::InternalError,
        }
    }

    /// Returns whether the connection must be closed.
    ///
    /// A failed frame write may have left a partial frame on the socket.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DispatchError::Transport(_))
    }
}

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Converts to protocol error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ServerError::Io(_) => ErrorCode::InternalError,
            ServerError::Protocol(ProtocolError::LineTooLong { .. }) => ErrorCode::PayloadTooLarge,
            ServerError::Protocol(_) => ErrorCode::BadRequest,
            ServerError::Dispatch(e) => e.error_code(),
            ServerError::Json(_) => ErrorCode::BadRequest,
            ServerError::Metrics(_) => ErrorCode::InternalError,
            ServerError::ShuttingDown => ErrorCode::InternalError,
        }
    }

    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.error_code().is_retryable()
    }
}
