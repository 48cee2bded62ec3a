//! Call arguments and results.
//!
//! A call's argument and its result are either a table or a plain JSON
//! value. On the wire a table is wrapped as `{"table": {...}}`; every other
//! JSON value is a scalar.

use crate::error::OperationError;
use crate::table::Table;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Key marking a wrapped table in JSON.
pub const TABLE_KEY: &str = "table";

/// A table or a scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Table(Arc<Table>),
    Scalar(Value),
}

impl Datum {
    pub fn table(table: Table) -> Self {
        Datum::Table(Arc::new(table))
    }

    pub fn scalar(value: impl Into<Value>) -> Self {
        Datum::Scalar(value.into())
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Datum::Table(_))
    }

    pub fn as_table(&self) -> Option<&Arc<Table>> {
        match self {
            Datum::Table(t) => Some(t),
            Datum::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Datum::Scalar(v) => Some(v),
            Datum::Table(_) => None,
        }
    }

    /// Returns a short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Table(_) => "table",
            Datum::Scalar(Value::Null) => "null",
            Datum::Scalar(Value::Bool(_)) => "bool",
            Datum::Scalar(Value::Number(_)) => "number",
            Datum::Scalar(Value::String(_)) => "string",
            Datum::Scalar(Value::Array(_)) => "list",
            Datum::Scalar(Value::Object(_)) => "dict",
        }
    }

    /// Interprets a JSON value received from a client.
    ///
    /// An object whose only key is `table` must hold a valid table.
    pub fn from_json(value: Value) -> Result<Self, OperationError> {
        match value {
            Value::Object(mut map) if map.len() == 1 && map.contains_key(TABLE_KEY) => {
                let inner = map.remove(TABLE_KEY).unwrap_or(Value::Null);
                let table: Table =
                    serde_json::from_value(inner).map_err(|e| OperationError::InvalidArgument {
                        operation: "decode".to_string(),
                        reason: format!("invalid table: {}", e),
                    })?;
                Ok(Datum::table(table))
            }
            other => Ok(Datum::Scalar(other)),
        }
    }

    /// Converts the datum to its JSON form.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        match self {
            Datum::Table(table) => {
                let mut map = Map::new();
                map.insert(TABLE_KEY.to_string(), serde_json::to_value(table.as_ref())?);
                Ok(Value::Object(map))
            }
            Datum::Scalar(v) => Ok(v.clone()),
        }
    }
}

impl From<Table> for Datum {
    fn from(table: Table) -> Self {
        Datum::table(table)
    }
}

impl From<Arc<Table>> for Datum {
    fn from(table: Arc<Table>) -> Self {
        Datum::Table(table)
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::Scalar(value)
    }
}
