//! Command execution.

use crate::Commands;
use arrowgate_client::{CallOutcome, Client, ClientError, RetryPolicy};
use arrowgate_core::{ColumnValues, Datum, Table};
use colored::Colorize;
use serde_json::Value;

/// Executes a command and returns the formatted output.
pub async fn execute(
    client: &Client,
    retry: &RetryPolicy,
    cmd: Commands,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Fetch { limit, json, out } => {
            let table = retry.run(|| reconnecting(client, client.fetch_table())).await?;

            if let Some(path) = out {
                std::fs::write(&path, serde_json::to_vec_pretty(&table)?)?;
                return Ok(format!(
                    "{} {} rows to {}",
                    "Wrote".green(),
                    table.row_count(),
                    path.display().to_string().cyan()
                ));
            }

            if json {
                Ok(serde_json::to_string_pretty(&table)?)
            } else {
                Ok(format_table(&table, limit))
            }
        }

        Commands::Call {
            operation,
            argument,
            each: true,
            ..
        } => {
            let items = match parse_json_arg(&argument)? {
                Value::Array(items) => items,
                other => {
                    return Err(format!(
                        "--each needs a list argument, got {}",
                        Datum::scalar(other).type_name()
                    )
                    .into())
                }
            };
            let count = items.len();
            let results = call_each(client, retry, &operation, items).await?;
            tracing::debug!("Called '{}' on {} items", operation, count);
            Ok(format_json(&Value::Array(results)))
        }

        Commands::Call {
            operation,
            argument,
            limit,
            each: false,
        } => {
            let argument = Datum::from_json(parse_json_arg(&argument)?)?;
            let outcome = retry
                .run(|| reconnecting(client, client.call(&operation, &argument)))
                .await?;
            Ok(format_outcome(&outcome, limit))
        }

        Commands::Send { command } => {
            let outcome = retry
                .run(|| reconnecting(client, client.send_command(&command)))
                .await?;
            Ok(format_outcome(&outcome, 20))
        }
    }
}

/// Calls `operation` on `items` in batches, one result per item.
///
/// Each batch is sent as a list argument and must come back as a list of
/// the same length. Batches rejected as too large are halved.
pub async fn call_each(
    client: &Client,
    retry: &RetryPolicy,
    operation: &str,
    items: Vec<Value>,
) -> Result<Vec<Value>, ClientError> {
    retry
        .run_subdividing(items, |batch: Vec<Value>| async move {
            let size = batch.len();
            let argument = Datum::scalar(Value::Array(batch));
            match reconnecting(client, client.call(operation, &argument)).await? {
                CallOutcome::Value(Value::Array(values)) if values.len() == size => Ok(values),
                CallOutcome::Value(other) => Err(ClientError::UnexpectedReply(other)),
                CallOutcome::Table(table) => Err(ClientError::UnexpectedReply(
                    Datum::table(table).to_json()?,
                )),
            }
        })
        .await
}

/// Awaits `request`, reconnecting first if an earlier attempt dropped the
/// connection.
async fn reconnecting<T>(
    client: &Client,
    request: impl std::future::Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    if !client.is_connected() {
        client.connect().await?;
    }
    request.await
}

/// Formats a call outcome for display.
pub fn format_outcome(outcome: &CallOutcome, limit: usize) -> String {
    match outcome {
        CallOutcome::Table(table) => format_table(table, limit),
        CallOutcome::Value(Value::String(s)) => s.yellow().to_string(),
        CallOutcome::Value(value) => format_json(value),
    }
}

/// Formats the first `limit` rows of a table as an aligned grid.
pub fn format_table(table: &Table, limit: usize) -> String {
    if table.num_columns() == 0 {
        return "Empty table (no columns)".yellow().to_string();
    }

    let shown = table.row_count().min(limit);
    let cells: Vec<Vec<String>> = table
        .columns()
        .iter()
        .map(|c| (0..shown).map(|row| format_cell(&c.values, row)).collect())
        .collect();

    let widths: Vec<usize> = table
        .columns()
        .iter()
        .zip(&cells)
        .map(|(c, values)| {
            values
                .iter()
                .map(String::len)
                .chain(std::iter::once(c.name.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut output = String::new();

    let header: Vec<String> = table
        .columns()
        .iter()
        .zip(&widths)
        .map(|(c, &w)| format!("{:<w$}", c.name))
        .collect();
    output.push_str(&header.join("  ").bold().cyan().to_string());
    output.push('\n');

    for row in 0..shown {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(values, &w)| format!("{:<w$}", values[row]))
            .collect();
        output.push_str(line.join("  ").trim_end());
        output.push('\n');
    }

    let footer = if shown < table.row_count() {
        format!("({} of {} rows)", shown, table.row_count())
    } else {
        format!("({} rows)", table.row_count())
    };
    output.push_str(&footer.dimmed().to_string());
    output
}

fn format_cell(values: &ColumnValues, row: usize) -> String {
    match values {
        ColumnValues::Int64(v) => v[row].to_string(),
        ColumnValues::Float64(v) => v[row].to_string(),
        ColumnValues::Utf8(v) => v[row].clone(),
    }
}

/// Parses a JSON argument (either inline JSON or @file.json).
fn parse_json_arg(arg: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(arg)?)
    }
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
