//! Inbound messages and synchronous replies.
//!
//! A client sends one message per line. A line holding a JSON array is a
//! structured call; anything else is a raw command compared byte-for-byte
//! against [`GET_DATA_COMMAND`].

use crate::error::ErrorCode;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only recognized raw command.
pub const GET_DATA_COMMAND: &str = "getArrowData";

/// Reply to a raw command other than [`GET_DATA_COMMAND`].
pub const UNRECOGNIZED_COMMAND: &str = "Unrecognized command";

/// Reply to a structured call that does not have exactly two elements.
pub const UNSUPPORTED_MESSAGE_FORMAT: &str = "Unsupported message format";

/// Value signalling that a frame was written to the connection.
pub const SENT_SENTINEL: i64 = 0;

/// An inbound message, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Raw command bytes (line terminator removed).
    Command(Bytes),
    /// Structured call elements, expected to be `[operation, argument]`.
    Call(Vec<Value>),
}

impl Inbound {
    /// Creates a raw command message.
    pub fn command(cmd: impl Into<Bytes>) -> Self {
        Inbound::Command(cmd.into())
    }

    /// Creates a structured call message from its elements.
    pub fn call(elements: Vec<Value>) -> Self {
        Inbound::Call(elements)
    }

    /// Classifies one inbound line.
    ///
    /// The line must not include its `\n` terminator. A trailing `\r` is
    /// removed.
    pub fn parse(line: &[u8]) -> Self {
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        let first = line.iter().find(|b| !b.is_ascii_whitespace());
        if first == Some(&b'[') {
            if let Ok(Value::Array(elements)) = serde_json::from_slice::<Value>(line) {
                return Inbound::Call(elements);
            }
        }

        Inbound::Command(Bytes::copy_from_slice(line))
    }

    /// Returns a short label for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::Command(_) => "command",
            Inbound::Call(_) => "call",
        }
    }
}

/// Result of handling one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A frame was written to the connection. Carries [`SENT_SENTINEL`]
    /// semantics and is never transmitted.
    Sent,
    /// A value to return through the reply channel.
    Value(Value),
}

impl Reply {
    /// Creates a text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Value(Value::String(text.into()))
    }

    /// Returns whether a frame was sent.
    pub fn is_sent(&self) -> bool {
        matches!(self, Reply::Sent)
    }

    /// Returns the reply as the value a caller observes: the zero sentinel
    /// for [`Reply::Sent`], otherwise the value itself.
    pub fn into_value(self) -> Value {
        match self {
            Reply::Sent => Value::from(SENT_SENTINEL),
            Reply::Value(v) => v,
        }
    }

    /// Returns the line to transmit, if any.
    pub fn into_line(self) -> Option<ReplyLine> {
        match self {
            Reply::Sent => None,
            Reply::Value(value) => Some(ReplyLine::Reply { value }),
        }
    }
}

/// A JSON line written back to the client for replies that are not framed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReplyLine {
    /// A synchronous reply value.
    Reply { value: Value },
    /// A failure surfaced by the connection layer.
    Error {
        code: ErrorCode,
        message: String,
        retryable: bool,
    },
}

impl ReplyLine {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ReplyLine::Error {
            retryable: code.is_retryable(),
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ReplyLine::Error { .. })
    }
}
