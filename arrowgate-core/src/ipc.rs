//! Arrow IPC stream encoding.
//!
//! [`ArrowIpcSerializer`] writes a table as an Arrow IPC stream: one schema
//! message, then record batches of at most `batch_size` rows, then the
//! end-of-stream marker. [`decode_stream`] reads such a stream back.

use crate::error::SerializeError;
use crate::options::{Compression, SerializationOptions};
use crate::serializer::Serializer;
use crate::table::{Column, ColumnValues, Table};
use arrow::array::{ArrayRef, AsArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::{IpcWriteOptions, StreamWriter};
use arrow::ipc::CompressionType;
use arrow::record_batch::RecordBatch;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Serializes tables into the Arrow IPC streaming format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrowIpcSerializer;

impl ArrowIpcSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for ArrowIpcSerializer {
    fn serialize(
        &self,
        table: &Table,
        options: &SerializationOptions,
    ) -> Result<Vec<u8>, SerializeError> {
        options.validate()?;
        let batch = to_record_batch(table)?;
        let schema = batch.schema();

        let write_options =
            IpcWriteOptions::default().try_with_compression(compression_type(options.compression))?;

        let mut buffer = Vec::new();
        {
            let mut writer =
                StreamWriter::try_new_with_options(&mut buffer, &schema, write_options)?;

            let rows = batch.num_rows();
            let mut offset = 0;
            while offset < rows {
                let len = options.batch_size.min(rows - offset);
                writer.write(&batch.slice(offset, len))?;
                offset += len;
            }
            writer.finish()?;
        }

        debug!(
            "Serialized {} rows x {} columns into {} bytes ({})",
            table.row_count(),
            table.num_columns(),
            buffer.len(),
            options.compression
        );

        Ok(buffer)
    }

    fn name(&self) -> &'static str {
        "arrow-ipc"
    }
}

fn compression_type(compression: Compression) -> Option<CompressionType> {
    match compression {
        Compression::Uncompressed => None,
        Compression::Zstd => Some(CompressionType::ZSTD),
        Compression::Lz4 => Some(CompressionType::LZ4_FRAME),
    }
}

/// Converts a table into a single Arrow record batch.
pub fn to_record_batch(table: &Table) -> Result<RecordBatch, SerializeError> {
    if table.num_columns() == 0 {
        return Err(SerializeError::EmptySchema);
    }

    let mut fields = Vec::with_capacity(table.num_columns());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.num_columns());

    for column in table.columns() {
        let (data_type, array): (DataType, ArrayRef) = match &column.values {
            ColumnValues::Int64(v) => (DataType::Int64, Arc::new(Int64Array::from(v.clone()))),
            ColumnValues::Float64(v) => {
                (DataType::Float64, Arc::new(Float64Array::from(v.clone())))
            }
            ColumnValues::Utf8(v) => (
                DataType::Utf8,
                Arc::new(StringArray::from_iter_values(v.iter())),
            ),
        };
        fields.push(Field::new(column.name.as_str(), data_type, false));
        arrays.push(array);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Reads an Arrow IPC stream back into a table.
///
/// Batches are concatenated in stream order. Null entries are not part of
/// the table model and decode as zero or the empty string.
pub fn decode_stream(bytes: &[u8]) -> Result<Table, SerializeError> {
    let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
    let schema = reader.schema();

    let mut columns = schema
        .fields()
        .iter()
        .map(|field| {
            let values = match field.data_type() {
                DataType::Int64 => ColumnValues::Int64(Vec::new()),
                DataType::Float64 => ColumnValues::Float64(Vec::new()),
                DataType::Utf8 => ColumnValues::Utf8(Vec::new()),
                other => {
                    return Err(SerializeError::UnsupportedType {
                        column: field.name().clone(),
                        data_type: other.to_string(),
                    })
                }
            };
            Ok(Column::new(field.name().clone(), values))
        })
        .collect::<Result<Vec<_>, SerializeError>>()?;

    for batch in reader {
        let batch = batch?;
        for (column, array) in columns.iter_mut().zip(batch.columns()) {
            match &mut column.values {
                ColumnValues::Int64(v) => {
                    v.extend(array.as_primitive::<Int64Type>().iter().map(|x| x.unwrap_or(0)))
                }
                ColumnValues::Float64(v) => v.extend(
                    array
                        .as_primitive::<Float64Type>()
                        .iter()
                        .map(|x| x.unwrap_or(0.0)),
                ),
                ColumnValues::Utf8(v) => v.extend(
                    array
                        .as_string::<i32>()
                        .iter()
                        .map(|s| s.unwrap_or_default().to_string()),
                ),
            }
        }
    }

    Ok(Table::new(columns)?)
}

/// Counts the record batches in an Arrow IPC stream.
pub fn count_batches(bytes: &[u8]) -> Result<usize, SerializeError> {
    let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
    let mut count = 0;
    for batch in reader {
        batch?;
        count += 1;
    }
    Ok(count)
}
