//! JSON rows and `key=value` options to engine inputs

use crate::ast::FieldIndex;
use crate::output::row_from_object;
use crate::value::Val;

use super::CliError;

/// Convert a JSON array of objects to rows laid out by `fields`. A single
/// object is treated as one row.
pub fn rows_from_json(json: &serde_json::Value, fields: &FieldIndex) -> Result<Vec<Vec<Val>>, CliError> {
    let objects: Vec<&serde_json::Value> = match json {
        serde_json::Value::Array(items) => items.iter().collect(),
        serde_json::Value::Object(_) => vec![json],
        _ => {
            return Err(CliError::InvalidInput(
                "expected an array of objects".to_string(),
            ));
        }
    };

    objects
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            serde_json::Value::Object(object) => Ok(row_from_object(object, fields)),
            _ => Err(CliError::InvalidInput(format!("row {} is not an object", i))),
        })
        .collect()
}

/// Split a `--param key=value` option.
pub fn parse_param(s: &str) -> Result<(String, String), CliError> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(CliError::Config(format!("expected key=value, found '{}'", s))),
    }
}
