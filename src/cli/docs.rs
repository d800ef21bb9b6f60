//! Function reference for the dashexpr CLI

use std::fmt::Write;

use super::CliError;
use crate::functions::{self, Category, FUNCTIONS, FunctionDef};

const CATEGORIES: &[Category] = &[
    Category::Aggregate,
    Category::Selection,
    Category::Mathematics,
    Category::Logic,
    Category::String,
    Category::Link,
    Category::Date,
    Category::Uri,
    Category::Type,
    Category::Value,
    Category::Param,
];

/// List every function grouped by category
pub fn get_functions_overview() -> String {
    let mut out = String::from(
        "DASHEXPR FUNCTIONS

Formulas combine literals, ${field} references, operators and function calls.
Names are case-insensitive; operators are aliases of the functions shown.
",
    );

    for category in CATEGORIES {
        let _ = write!(out, "\n{}\n", category.name().to_uppercase());
        for def in FUNCTIONS.iter().filter(|d| d.category == *category) {
            let _ = writeln!(out, "  {:<22}{}", signature(def), def.description);
        }
    }
    out.push_str("\nRun 'dashexpr function <name>' for details on one function.\n");
    out
}

/// Describe a single function or operator alias
pub fn get_function_doc(name: &str) -> Result<String, CliError> {
    let def = functions::lookup(name).ok_or_else(|| CliError::UnknownFunction(name.to_string()))?;

    let mut out = String::new();
    let _ = writeln!(out, "{}\n", def.name);
    let _ = writeln!(out, "  {}\n", def.description);
    let _ = writeln!(out, "ARGUMENTS\n  {}\n", arity(def));
    if !def.aliases.is_empty() {
        let _ = writeln!(out, "ALIASES\n  {}\n", def.aliases.join(", "));
    }
    let _ = writeln!(out, "CATEGORY\n  {}", def.category.name());
    if def.kind.is_aggregate(def.min_params.max(1)) {
        out.push_str("\nAccumulates over the rows of a group; partial results merge.\n");
    } else if def.kind.requires_child_data() {
        out.push_str("\nReads the same expression evaluated over the child groups.\n");
    }
    Ok(out)
}

fn signature(def: &FunctionDef) -> String {
    match def.max_params {
        Some(0) => format!("{}()", def.name),
        _ => format!("{}(..)", def.name),
    }
}

fn arity(def: &FunctionDef) -> String {
    match (def.min_params, def.max_params) {
        (0, Some(0)) => "none".to_string(),
        (min, Some(max)) if min == max => format!("exactly {min}"),
        (min, Some(max)) => format!("{min} to {max}"),
        (min, None) => format!("{min} or more"),
    }
}
