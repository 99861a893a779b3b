//! JSON I/O handling for CLI
//!
//! - Plans and inputs are read from JSON files
//! - Output: single JSON object via stdout
//! - Cells convert through the column type declared by the plan

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Number, Value as Json};

use super::errors::{CliError, CliResult};
use crate::row::{Bucket, Row};
use crate::types::{DataType, Value};

/// Rows held by one simulated node, grouped by shard
#[derive(Debug, Clone, Deserialize)]
pub struct NodeInput {
    pub shards: Vec<Vec<Vec<Json>>>,
}

/// Read and deserialize a JSON file
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::io_error(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&content)?)
}

/// Write a success response to stdout
pub fn write_response(data: Json) -> CliResult<()> {
    let response = json!({
        "status": "ok",
        "data": data
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

/// Converts node inputs into shard buckets typed by `types`
pub fn buckets_from_inputs(
    inputs: Vec<NodeInput>,
    types: &[DataType],
) -> CliResult<Vec<Vec<Bucket>>> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(node, input)| {
            input
                .shards
                .into_iter()
                .map(|shard| {
                    shard
                        .iter()
                        .map(|row| row_from_json(row, types))
                        .collect::<CliResult<Vec<Row>>>()
                        .map(Bucket::materialized)
                })
                .collect::<CliResult<Vec<Bucket>>>()
                .map_err(|e| CliError::input_error(format!("node {}: {}", node, e.message())))
        })
        .collect()
}

fn row_from_json(row: &[Json], types: &[DataType]) -> CliResult<Row> {
    if row.len() != types.len() {
        return Err(CliError::input_error(format!(
            "row has {} columns, expected {}",
            row.len(),
            types.len()
        )));
    }
    row.iter()
        .zip(types)
        .map(|(cell, data_type)| value_from_json(cell, *data_type))
        .collect()
}

/// Converts one JSON cell into a value of `data_type`
pub fn value_from_json(cell: &Json, data_type: DataType) -> CliResult<Value> {
    if cell.is_null() {
        return Ok(Value::Null);
    }
    let mismatch = || {
        CliError::input_error(format!("cannot read {} as {}", cell, data_type.name()))
    };
    let integral = |cell: &Json| cell.as_i64().ok_or_else(mismatch);
    let value = match data_type {
        DataType::Boolean => Value::Boolean(cell.as_bool().ok_or_else(mismatch)?),
        DataType::Byte => Value::Byte(i8::try_from(integral(cell)?).map_err(|_| mismatch())?),
        DataType::Short => Value::Short(i16::try_from(integral(cell)?).map_err(|_| mismatch())?),
        DataType::Integer => {
            Value::Integer(i32::try_from(integral(cell)?).map_err(|_| mismatch())?)
        }
        DataType::Long => Value::Long(integral(cell)?),
        DataType::Float => Value::Float(cell.as_f64().ok_or_else(mismatch)? as f32),
        DataType::Double => Value::Double(cell.as_f64().ok_or_else(mismatch)?),
        DataType::String => Value::String(cell.as_str().ok_or_else(mismatch)?.to_string()),
        DataType::Timestamp => match cell {
            Json::String(text) => DateTime::parse_from_rfc3339(text)
                .map(|at| Value::Timestamp(at.timestamp_millis()))
                .map_err(|_| mismatch())?,
            _ => Value::Timestamp(integral(cell)?),
        },
        DataType::Undefined | DataType::AggregationState => return Err(mismatch()),
    };
    Ok(value)
}

/// Converts a value into its JSON form; timestamps render as RFC 3339
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Boolean(v) => Json::Bool(*v),
        Value::Byte(v) => json!(v),
        Value::Short(v) => json!(v),
        Value::Integer(v) => json!(v),
        Value::Long(v) => json!(v),
        Value::Float(v) => Number::from_f64(f64::from(*v)).map_or(Json::Null, Json::Number),
        Value::Double(v) => Number::from_f64(*v).map_or(Json::Null, Json::Number),
        Value::String(v) => Json::String(v.clone()),
        Value::Timestamp(millis) => match DateTime::<Utc>::from_timestamp_millis(*millis) {
            Some(at) => Json::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => json!(millis),
        },
        Value::State(_) => Json::String(value.to_string()),
    }
}

pub fn rows_to_json(rows: &[Row]) -> Json {
    Json::Array(
        rows.iter()
            .map(|row| Json::Array(row.iter().map(value_to_json).collect()))
            .collect(),
    )
}
