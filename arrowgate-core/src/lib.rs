//! # arrowgate-core
//!
//! Domain layer for arrowgate.
//!
//! This crate provides:
//! - The in-memory table model and sample data
//! - Serialization options (rows per batch, compression codec)
//! - The `Serializer` capability and its Arrow IPC stream implementation
//! - Call arguments and results (`Datum`)
//! - The registry of operations callable by clients

pub mod datum;
pub mod error;
pub mod ipc;
pub mod operation;
pub mod options;
pub mod serializer;
pub mod table;

pub use datum::Datum;
pub use error::{OperationError, OptionsError, SerializeError, TableError};
pub use ipc::ArrowIpcSerializer;
pub use operation::{Operation, OperationRegistry};
pub use options::{Compression, SerializationOptions};
pub use serializer::Serializer;
pub use table::{Column, ColumnValues, Table};
