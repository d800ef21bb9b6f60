//! Evaluate formulas against JSON rows

use std::collections::HashMap;

use bytes::BytesMut;
use tracing::debug;

use super::{CliError, rows_from_json};
use crate::ast::{Expression, FieldIndex};
use crate::config::EngineConfig;
use crate::generator::{Generator, GroupKey};
use crate::output::val_to_json;
use crate::parser::Parser;
use crate::value::Val;

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The formula to evaluate
    pub formula: String,
    /// JSON rows: an array of objects
    pub input: Option<String>,
    /// Only parse and bind, don't evaluate
    pub syntax_only: bool,
    /// Field whose value splits rows into groups
    pub group_by: Option<String>,
    /// Number of partitions each group is accumulated in before merging
    pub partitions: usize,
    /// Values for `param()`, `params()` and `currentUser()`
    pub params: HashMap<String, String>,
    pub config: EngineConfig,
}

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// Formula is valid; carries its canonical form
    SyntaxValid(String),
    /// Evaluation output
    Success(serde_json::Value),
}

/// Execute a check operation.
///
/// Formulas without aggregates evaluate once per row. Aggregating formulas,
/// or any formula with `group_by`, evaluate once per group: rows of a group
/// are spread over `partitions` generators whose state is written, read back
/// and merged, as a distributed run would.
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let parser = Parser::new(options.config.clone());
    let mut fields = FieldIndex::new();
    let group_position = options.group_by.as_deref().map(|name| fields.create(name));
    let mut expression = parser.parse(&options.formula, &mut fields)?;

    if options.syntax_only {
        return Ok(CheckResult::SyntaxValid(expression.to_string()));
    }
    expression.set_static_mapped_values(&options.params);

    let input = options.input.as_ref().ok_or(CliError::NoInput)?;
    let json: serde_json::Value = serde_json::from_str(input)?;
    let rows = rows_from_json(&json, &fields)?;
    let partitions = options.partitions.max(1);

    let Some(position) = group_position else {
        if !expression.has_aggregate() {
            let values = rows
                .iter()
                .map(|row| {
                    let mut generator = expression.create_generator();
                    generator.set(row);
                    val_to_json(&generator.eval())
                })
                .collect();
            return Ok(CheckResult::Success(serde_json::Value::Array(values)));
        }
        let all: Vec<&[Val]> = rows.iter().map(Vec::as_slice).collect();
        let value = evaluate_group(&expression, &all, partitions)?;
        return Ok(CheckResult::Success(val_to_json(&value)));
    };

    let mut order: Vec<GroupKey> = Vec::new();
    let mut groups: HashMap<GroupKey, Vec<&[Val]>> = HashMap::new();
    for row in &rows {
        let key = GroupKey::new(vec![row.get(position).cloned().unwrap_or(Val::Null)]);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(row);
    }

    let mut results = Vec::with_capacity(order.len());
    for key in &order {
        let Some(members) = groups.get(key) else {
            continue;
        };
        let value = evaluate_group(&expression, members, partitions)?;
        let mut object = serde_json::Map::new();
        let group = key.values().first().map(val_to_json).unwrap_or(serde_json::Value::Null);
        object.insert("group".to_string(), group);
        object.insert("value".to_string(), val_to_json(&value));
        results.push(serde_json::Value::Object(object));
    }
    Ok(CheckResult::Success(serde_json::Value::Array(results)))
}

fn evaluate_group(expression: &Expression, rows: &[&[Val]], partitions: usize) -> Result<Val, CliError> {
    let mut parts: Vec<Generator> = (0..partitions).map(|_| expression.create_generator()).collect();
    for (i, row) in rows.iter().enumerate() {
        parts[i % partitions].set(row);
    }

    let mut merged = expression.create_generator();
    for part in &parts {
        let mut buf = BytesMut::new();
        part.write(&mut buf);
        let mut received = expression.create_generator();
        received.read(&mut buf.freeze())?;
        merged.merge(&received)?;
    }
    debug!(rows = rows.len(), partitions, "merged partial results");

    if expression.requires_child_data() {
        let children: Vec<Generator> = rows
            .iter()
            .map(|row| {
                let mut child = expression.create_generator();
                child.set(row);
                child
            })
            .collect();
        return Ok(merged.select(&children));
    }
    Ok(merged.eval())
}
