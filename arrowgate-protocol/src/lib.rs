//! # arrowgate-protocol
//!
//! Wire protocol implementation for arrowgate.
//!
//! This crate provides:
//! - The 8-byte big-endian length header
//! - Length-prefixed frames carrying an opaque payload
//! - Classification of inbound lines into raw commands and structured calls
//! - JSON reply lines for results that are not framed
//! - Error codes and protocol constants

pub mod codec;
pub mod error;
pub mod frame;
pub mod header;
pub mod message;

pub use codec::{Decoder, Encoder, Incoming, LineDecoder};
pub use error::{ErrorCode, ProtocolError};
pub use frame::Frame;
pub use header::HEADER_SIZE;
pub use message::{
    Inbound, Reply, ReplyLine, GET_DATA_COMMAND, SENT_SENTINEL, UNRECOGNIZED_COMMAND,
    UNSUPPORTED_MESSAGE_FORMAT,
};

/// Default port for the arrowgate server.
pub const DEFAULT_PORT: u16 = 5001;

/// Maximum length of one inbound line (1 MiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Default cap on frame payloads accepted by readers (4 GiB).
///
/// The header itself can describe payloads up to `u64::MAX` bytes; readers
/// enforce a practical limit of their own.
pub const DEFAULT_MAX_PAYLOAD: u64 = 4 * 1024 * 1024 * 1024;
