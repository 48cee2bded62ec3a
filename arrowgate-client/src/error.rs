//! Client error types.

use arrowgate_protocol::{ErrorCode, ProtocolError};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("cannot decode table: {0}")]
    Decode(#[from] arrowgate_core::SerializeError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("server error: {code} - {message}")]
    Server {
        code: ErrorCode,
        message: String,
        retryable: bool,
    },

    #[error("unexpected reply: {0}")]
    UnexpectedReply(serde_json::Value),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Timeout => true,
            ClientError::ConnectionClosed => true,
            ClientError::Server { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Returns whether the request was rejected for being too large.
    pub fn is_too_large(&self) -> bool {
        matches!(
            self,
            ClientError::Server {
                code: ErrorCode::PayloadTooLarge,
                ..
            } | ClientError::Protocol(ProtocolError::FrameTooLarge { .. })
        )
    }
}
