//! Encoders and decoders for both directions of the wire.
//!
//! Client to server: newline-terminated lines ([`LineDecoder`]).
//! Server to client: frames and JSON reply lines ([`Decoder`]).

use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::message::ReplyLine;
use crate::{DEFAULT_MAX_LINE_BYTES, DEFAULT_MAX_PAYLOAD};
use bytes::{Buf, Bytes, BytesMut};
use serde_json::Value;

/// Encodes outbound messages.
pub struct Encoder;

impl Encoder {
    /// Encodes a raw command line.
    pub fn encode_command(command: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(command.len() + 1);
        bytes.extend_from_slice(command.as_bytes());
        bytes.push(b'\n');
        bytes
    }

    /// Encodes a structured call `[operation, argument]` as a JSON line.
    pub fn encode_call(operation: &str, argument: &Value) -> Result<Vec<u8>, ProtocolError> {
        Self::encode_elements(&[Value::String(operation.to_string()), argument.clone()])
    }

    /// Encodes arbitrary call elements as a JSON line.
    pub fn encode_elements(elements: &[Value]) -> Result<Vec<u8>, ProtocolError> {
        let mut bytes = serde_json::to_vec(elements)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Encodes a reply line.
    pub fn encode_reply(line: &ReplyLine) -> Result<Vec<u8>, ProtocolError> {
        let mut bytes = serde_json::to_vec(line)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Splits inbound bytes into lines.
pub struct LineDecoder {
    buffer: BytesMut,
    max_line: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE_BYTES)
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_line,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to take the next complete line, without its `\n`.
    pub fn decode_line(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                if pos > self.max_line {
                    return Err(ProtocolError::LineTooLong {
                        len: pos,
                        max: self.max_line,
                    });
                }
                let line = self.buffer.split_to(pos).freeze();
                self.buffer.advance(1);
                Ok(Some(line))
            }
            None if self.buffer.len() > self.max_line => Err(ProtocolError::LineTooLong {
                len: self.buffer.len(),
                max: self.max_line,
            }),
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// A message received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A length-prefixed frame.
    Frame(Frame),
    /// A JSON reply line.
    Reply(ReplyLine),
}

/// Decodes frames and reply lines sent by the server.
///
/// A reply line always starts with `{`. Any other first byte is the most
/// significant byte of a frame header.
pub struct Decoder {
    buffer: BytesMut,
    max_payload: u64,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload: u64) -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            max_payload,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame or reply line.
    pub fn decode(&mut self) -> Result<Option<Incoming>, ProtocolError> {
        match self.buffer.first() {
            None => Ok(None),
            Some(&b'{') => self.decode_reply_line(),
            Some(_) => Ok(Frame::decode(&mut self.buffer, self.max_payload)?.map(Incoming::Frame)),
        }
    }

    fn decode_reply_line(&mut self) -> Result<Option<Incoming>, ProtocolError> {
        let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let line = self.buffer.split_to(pos + 1);
        let json =
            std::str::from_utf8(&line[..pos]).map_err(|_| ProtocolError::InvalidUtf8)?;
        let reply: ReplyLine = serde_json::from_str(json)?;
        Ok(Some(Incoming::Reply(reply)))
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
