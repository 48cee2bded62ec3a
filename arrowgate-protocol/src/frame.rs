//! Length-prefixed frame format.
//!
//! Frame layout (8 bytes header + payload):
//!
//! ```text
//! +----------------------+-----------------------------+
//! | payload_len (u64 BE) | payload                     |
//! | 8 bytes              | payload_len bytes (opaque)  |
//! +----------------------+-----------------------------+
//! ```
//!
//! The payload is whatever the serializer produced; this module never looks
//! inside it.

use crate::error::ProtocolError;
use crate::header::{self, HEADER_SIZE};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A length-prefixed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame payload.
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame with the given payload.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Returns the number of bytes this frame occupies on the wire.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Encodes the frame into bytes: header first, then the payload.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let header = header::encode_len(self.payload.len())?;
        let mut buf = BytesMut::with_capacity(self.wire_size());
        buf.put_slice(&header);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` if the header announces
    /// more than `max_payload` bytes.
    pub fn decode(buf: &mut BytesMut, max_payload: u64) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let payload_len = header::decode_slice(&buf[..])?;
        if payload_len > max_payload {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: max_payload,
            });
        }

        let payload_len = usize::try_from(payload_len).map_err(|_| {
            ProtocolError::FrameTooLarge {
                size: payload_len,
                max: usize::MAX as u64,
            }
        })?;

        let total_len = HEADER_SIZE + payload_len;
        if buf.len() < total_len {
            buf.reserve(total_len - buf.len());
            return Ok(None);
        }

        buf.advance(HEADER_SIZE);
        let payload = buf.split_to(payload_len).freeze();

        Ok(Some(Self { payload }))
    }
}
