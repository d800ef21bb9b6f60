use thiserror::Error;

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

/// Wrong number of arguments passed to a function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe_arity(.function, .min, .max, .actual))]
pub struct ArityError {
    pub function: String,
    pub min: usize,
    /// `None` when the function takes any number of arguments
    pub max: Option<usize>,
    pub actual: usize,
}

fn describe_arity(function: &str, min: &usize, max: &Option<usize>, actual: &usize) -> String {
    let (min, max) = (*min, *max);
    let expected = match max {
        Some(max) if max == min => format!("{min}"),
        Some(max) => format!("between {min} and {max}"),
        None => format!("at least {min}"),
    };
    let noun = if max == Some(1) && min == 1 { "argument" } else { "arguments" };
    format!("Function '{function}' expects {expected} {noun} but found {actual}")
}

/// Errors raised while turning formula text into a bound expression.
///
/// Nothing is evaluated until parsing succeeds, so these errors always
/// surface before the first row is seen.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Expression is empty")]
    Empty,

    #[error("Unknown function '{name}' at position {position}")]
    UnknownFunction { name: String, position: usize },

    #[error("Unexpected {found} at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("Unbalanced bracket at position {position}")]
    UnbalancedBracket { position: usize },

    #[error("Unterminated string starting at position {position}")]
    UnterminatedString { position: usize },

    #[error(transparent)]
    Arity(#[from] ArityError),

    #[error("Invalid {position} argument to '{function}': {message}")]
    InvalidParam {
        function: String,
        position: &'static str,
        message: String,
    },
}

impl ParseError {
    pub(crate) fn invalid_param(function: &str, index: usize, message: impl Into<String>) -> Self {
        ParseError::InvalidParam {
            function: function.to_string(),
            position: ordinal(index),
            message: message.into(),
        }
    }
}

/// Ordinal word for a zero-based argument index
pub fn ordinal(index: usize) -> &'static str {
    const WORDS: [&str; 10] = [
        "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth",
        "tenth",
    ];
    WORDS.get(index).copied().unwrap_or("nth")
}

/// Failures in generator plumbing: serialization and merging of state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    #[error("Unexpected end of input while reading generator state")]
    UnexpectedEof,

    #[error("Unknown value type id {0}")]
    UnknownTypeTag(u8),

    #[error("Invalid UTF-8 in serialized string")]
    InvalidUtf8,

    #[error("Invalid generator state: {0}")]
    InvalidState(&'static str),

    #[error("Generator shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}
