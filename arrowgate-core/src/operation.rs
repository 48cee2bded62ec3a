//! Operations callable through structured calls.
//!
//! A structured call names an operation and supplies one argument. The
//! registry resolves the name and applies the operation; the result may be a
//! table (which the connection layer frames) or any other value.

use crate::datum::Datum;
use crate::error::OperationError;
use crate::table::Table;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A named function from one datum to another.
pub trait Operation: Send + Sync {
    fn apply(&self, argument: Datum) -> Result<Datum, OperationError>;
}

impl<F> Operation for F
where
    F: Fn(Datum) -> Result<Datum, OperationError> + Send + Sync,
{
    fn apply(&self, argument: Datum) -> Result<Datum, OperationError> {
        self(argument)
    }
}

/// Registry of operations by name.
#[derive(Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Arc<dyn Operation>>,
}

impl OperationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in operations over `table`.
    ///
    /// - `identity`: returns its argument
    /// - `table`: returns the served table
    /// - `head`: returns the first `n` rows of the served table
    /// - `count`: returns the row count of a table argument
    /// - `columns`: returns the column names of a table argument
    pub fn with_builtins(table: Arc<Table>) -> Self {
        let mut registry = Self::new();

        registry.register("identity", |arg: Datum| Ok(arg));

        let served = table.clone();
        registry.register("table", move |_arg: Datum| Ok(Datum::Table(served.clone())));

        registry.register("head", move |arg: Datum| {
            let n = match &arg {
                Datum::Scalar(Value::Number(n)) => n.as_u64(),
                _ => None,
            };
            match n {
                Some(n) => Ok(Datum::table(
                    table.head(usize::try_from(n).unwrap_or(usize::MAX)),
                )),
                None => Err(mismatch("head", "non-negative integer", &arg)),
            }
        });

        registry.register("count", |arg: Datum| match &arg {
            Datum::Table(t) => Ok(Datum::scalar(t.row_count() as u64)),
            _ => Err(mismatch("count", "table", &arg)),
        });

        registry.register("columns", |arg: Datum| match &arg {
            Datum::Table(t) => Ok(Datum::scalar(t.column_names())),
            _ => Err(mismatch("columns", "table", &arg)),
        });

        registry
    }

    /// Registers a function, replacing any existing operation with that name.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Datum) -> Result<Datum, OperationError> + Send + Sync + 'static,
    {
        self.register_operation(name, f);
    }

    /// Registers an operation, replacing any existing one with that name.
    pub fn register_operation(
        &mut self,
        name: impl Into<String>,
        operation: impl Operation + 'static,
    ) {
        self.operations.insert(name.into(), Arc::new(operation));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.operations.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Returns registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolves `name` and applies it to `argument`.
    pub fn apply(&self, name: &str, argument: Datum) -> Result<Datum, OperationError> {
        let operation = self
            .operations
            .get(name)
            .ok_or_else(|| OperationError::NotFound(name.to_string()))?;
        operation.apply(argument)
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.names())
            .finish()
    }
}

fn mismatch(operation: &str, expected: &'static str, actual: &Datum) -> OperationError {
    OperationError::TypeMismatch {
        operation: operation.to_string(),
        expected,
        actual: actual.type_name(),
    }
}
