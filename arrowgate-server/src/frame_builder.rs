//! Builds frames from tables.

use crate::error::DispatchError;
use arrowgate_core::{SerializationOptions, Serializer, Table};
use arrowgate_protocol::Frame;
use bytes::Bytes;

/// Serializes `table` and prefixes the payload with its 8-byte length.
///
/// The header is derived from the serializer's output, so it always matches
/// the payload that follows it. Serializer failures propagate unchanged.
pub fn build_frame(
    serializer: &dyn Serializer,
    table: &Table,
    options: &SerializationOptions,
) -> Result<Bytes, DispatchError> {
    let payload = serializer.serialize(table, options)?;
    let frame = Frame::new(payload).encode()?;
    Ok(frame.freeze())
}
