//! Serialization capability.

use crate::error::SerializeError;
use crate::options::SerializationOptions;
use crate::table::Table;

/// Turns a table into a byte payload.
///
/// Implementations must be deterministic for a given table and options, so
/// that two serializations of the same table produce identical frames.
pub trait Serializer: Send + Sync {
    /// Serializes the whole table.
    fn serialize(
        &self,
        table: &Table,
        options: &SerializationOptions,
    ) -> Result<Vec<u8>, SerializeError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "serializer"
    }
}
