//! CLI support for dashexpr
//!
//! Provides programmatic access to the `dashexpr` commands so other tools can
//! check formulas against sample rows without shelling out.

mod check;
mod convert;
mod docs;

pub use check::{CheckOptions, CheckResult, execute_check};
pub use convert::{parse_param, rows_from_json};
pub use docs::{get_function_doc, get_functions_overview};

use std::io;

use crate::error::{GeneratorError, ParseError};

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Formula failed to parse or bind
    Parse(ParseError),
    /// Partial results could not be serialized or merged
    Generator(GeneratorError),
    /// JSON parsing error
    Json(serde_json::Error),
    /// IO error
    Io(io::Error),
    /// No input provided
    NoInput,
    /// Input was valid JSON but not an array of row objects
    InvalidInput(String),
    /// Unknown function name
    UnknownFunction(String),
    /// Invalid configuration or option
    Config(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Parse(e) => write!(f, "Parse error: {}", e),
            CliError::Generator(e) => write!(f, "Aggregation error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => write!(f, "No input provided. Use --input or pipe JSON rows to stdin."),
            CliError::InvalidInput(m) => write!(f, "Invalid input: {}", m),
            CliError::UnknownFunction(name) => {
                write!(f, "Unknown function: '{}'\nRun 'dashexpr functions' to see available functions.", name)
            }
            CliError::Config(m) => write!(f, "Configuration error: {}", m),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Parse(e) => Some(e),
            CliError::Generator(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ParseError> for CliError {
    fn from(e: ParseError) -> Self {
        CliError::Parse(e)
    }
}

impl From<GeneratorError> for CliError {
    fn from(e: GeneratorError) -> Self {
        CliError::Generator(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
