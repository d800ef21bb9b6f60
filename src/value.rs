use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

/// A single value flowing through an expression.
///
/// Every function reads and produces `Val`s. Conversions between variants
/// never fail loudly: the `as_*` accessors return `None` when a value has no
/// sensible representation in the requested form, and functions turn that
/// into [`Val::Null`] or [`Val::Err`] as appropriate.
///
/// # Examples
///
/// ```
/// use dashexpr::Val;
///
/// let n = Val::Integer(42);
/// assert_eq!(n.as_string().as_deref(), Some("42"));
///
/// let s = Val::string("1.5");
/// assert_eq!(s.as_double(), Some(1.5));
///
/// assert_eq!(Val::Null.as_long(), None);
/// ```
#[derive(Debug, Clone)]
pub enum Val {
    /// Absence of a value
    Null,

    /// `true` / `false`
    Boolean(bool),

    /// 64-bit floating point number. Numeric literals parse to this variant.
    Double(f64),

    /// 32-bit signed integer
    Integer(i32),

    /// 64-bit signed integer
    Long(i64),

    /// UTF-8 string
    String(String),

    /// Milliseconds since the Unix epoch (UTC)
    Date(i64),

    /// An evaluation error carried as a value
    Err(String),
}

/// Descriptor for a [`Val`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Null,
    Boolean,
    Double,
    Integer,
    Long,
    Date,
    String,
    Err,
}

impl Type {
    /// Stable wire identifier. Ids 2 and 9 are reserved and never produced.
    pub fn id(self) -> u8 {
        match self {
            Type::Null => 0,
            Type::Boolean => 1,
            Type::Double => 3,
            Type::Integer => 4,
            Type::Long => 5,
            Type::Date => 6,
            Type::String => 7,
            Type::Err => 8,
        }
    }

    pub fn from_id(id: u8) -> Option<Type> {
        match id {
            0 => Some(Type::Null),
            1 => Some(Type::Boolean),
            3 => Some(Type::Double),
            4 => Some(Type::Integer),
            5 => Some(Type::Long),
            6 => Some(Type::Date),
            7 => Some(Type::String),
            8 => Some(Type::Err),
            _ => None,
        }
    }

    /// Lower-case name as reported by `typeOf()`
    pub fn name(self) -> &'static str {
        match self {
            Type::Null => "null",
            Type::Boolean => "boolean",
            Type::Double => "double",
            Type::Integer => "integer",
            Type::Long => "long",
            Type::Date => "date",
            Type::String => "string",
            Type::Err => "error",
        }
    }

    pub fn is_value(self) -> bool {
        !matches!(self, Type::Null | Type::Err)
    }

    pub fn is_number(self) -> bool {
        matches!(self, Type::Double | Type::Integer | Type::Long)
    }

    pub fn is_error(self) -> bool {
        self == Type::Err
    }

    pub fn is_null(self) -> bool {
        self == Type::Null
    }
}

static CANONICAL_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})\.(\d{3})Z$")
        .expect("canonical date pattern is valid")
});

/// Parse a `yyyy-MM-ddTHH:mm:ss.SSSZ` string to epoch millis.
pub fn parse_canonical_date(s: &str) -> Option<i64> {
    let caps = CANONICAL_DATE.captures(s)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)?;
    let time = date.and_hms_milli_opt(field(4)?, field(5)?, field(6)?, field(7)?)?;
    Some(time.and_utc().timestamp_millis())
}

/// Format epoch millis as `yyyy-MM-ddTHH:mm:ss.SSSZ`.
pub fn format_canonical_date(ms: i64) -> Option<String> {
    let dt = DateTime::<Utc>::from_timestamp_millis(ms)?;
    Some(dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

fn parse_double(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

fn parse_long(s: &str) -> Option<i64> {
    if let Some(ms) = parse_canonical_date(s) {
        return Some(ms);
    }
    let trimmed = s.trim();
    match trimmed.parse::<i64>() {
        Ok(n) => Some(n),
        Err(_) => parse_double(trimmed).and_then(double_to_long),
    }
}

fn double_to_long(d: f64) -> Option<i64> {
    if d.is_finite() { Some(d as i64) } else { None }
}

impl Val {
    pub fn string(s: impl Into<String>) -> Val {
        Val::String(s.into())
    }

    pub fn err(message: impl Into<String>) -> Val {
        Val::Err(message.into())
    }

    pub fn type_of(&self) -> Type {
        match self {
            Val::Null => Type::Null,
            Val::Boolean(_) => Type::Boolean,
            Val::Double(_) => Type::Double,
            Val::Integer(_) => Type::Integer,
            Val::Long(_) => Type::Long,
            Val::String(_) => Type::String,
            Val::Date(_) => Type::Date,
            Val::Err(_) => Type::Err,
        }
    }

    /// `false` for [`Val::Null`] and [`Val::Err`]
    pub fn is_value(&self) -> bool {
        self.type_of().is_value()
    }

    pub fn is_number(&self) -> bool {
        self.type_of().is_number()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Val::Null)
    }

    pub fn is_err(&self) -> bool {
        matches!(self, Val::Err(_))
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Val::Null | Val::Err(_) => None,
            Val::Boolean(b) => Some(i32::from(*b)),
            Val::Integer(n) => Some(*n),
            Val::Long(n) | Val::Date(n) => i32::try_from(*n).ok(),
            Val::Double(d) => double_to_long(*d).and_then(|n| i32::try_from(n).ok()),
            Val::String(s) => parse_long(s).and_then(|n| i32::try_from(n).ok()),
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Val::Null | Val::Err(_) => None,
            Val::Boolean(b) => Some(i64::from(*b)),
            Val::Integer(n) => Some(i64::from(*n)),
            Val::Long(n) | Val::Date(n) => Some(*n),
            Val::Double(d) => double_to_long(*d),
            Val::String(s) => parse_long(s),
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Val::Null | Val::Err(_) => None,
            Val::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Val::Integer(n) => Some(f64::from(*n)),
            Val::Long(n) | Val::Date(n) => Some(*n as f64),
            Val::Double(d) => Some(*d),
            Val::String(s) => match parse_canonical_date(s) {
                Some(ms) => Some(ms as f64),
                None => parse_double(s),
            },
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Val::Null | Val::Err(_) => None,
            Val::Boolean(b) => Some(*b),
            Val::Integer(n) => Some(*n != 0),
            Val::Long(n) | Val::Date(n) => Some(*n != 0),
            Val::Double(d) => Some(*d != 0.0),
            Val::String(s) => Some(s.eq_ignore_ascii_case("true")),
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            Val::Null | Val::Err(_) => None,
            Val::Boolean(b) => Some(b.to_string()),
            Val::Integer(n) => Some(n.to_string()),
            Val::Long(n) => Some(n.to_string()),
            Val::Double(d) => Some(d.to_string()),
            Val::Date(ms) => format_canonical_date(*ms),
            Val::String(s) => Some(s.clone()),
        }
    }

    /// The error message if this is an error value
    pub fn err_message(&self) -> Option<&str> {
        match self {
            Val::Err(m) => Some(m),
            _ => None,
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Null, Val::Null) => true,
            (Val::Boolean(a), Val::Boolean(b)) => a == b,
            (Val::Double(a), Val::Double(b)) => a.to_bits() == b.to_bits(),
            (Val::Integer(a), Val::Integer(b)) => a == b,
            (Val::Long(a), Val::Long(b)) => a == b,
            (Val::String(a), Val::String(b)) => a == b,
            (Val::Date(a), Val::Date(b)) => a == b,
            (Val::Err(a), Val::Err(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Val {}

impl Hash for Val {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_of().id().hash(state);
        match self {
            Val::Null => {}
            Val::Boolean(b) => b.hash(state),
            Val::Double(d) => d.to_bits().hash(state),
            Val::Integer(n) => n.hash(state),
            Val::Long(n) | Val::Date(n) => n.hash(state),
            Val::String(s) | Val::Err(s) => s.hash(state),
        }
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Boolean(b)
    }
}

impl From<f64> for Val {
    fn from(d: f64) -> Self {
        Val::Double(d)
    }
}

impl From<i32> for Val {
    fn from(n: i32) -> Self {
        Val::Integer(n)
    }
}

impl From<i64> for Val {
    fn from(n: i64) -> Self {
        Val::Long(n)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::String(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_to_string_drops_trailing_zero() {
        assert_eq!(Val::Double(50.0).as_string().as_deref(), Some("50"));
        assert_eq!(Val::Double(2.5).as_string().as_deref(), Some("2.5"));
    }

    #[test]
    fn test_string_parses_canonical_date_first() {
        let v = Val::string("2014-02-22T12:12:12.888Z");
        assert_eq!(v.as_long(), Some(1393071132888));
        assert_eq!(Val::Date(1393071132888).as_string().as_deref(), Some("2014-02-22T12:12:12.888Z"));
    }

    #[test]
    fn test_null_and_err_have_no_conversions() {
        for v in [Val::Null, Val::err("x")] {
            assert!(!v.is_value());
            assert_eq!(v.as_double(), None);
            assert_eq!(v.as_string(), None);
            assert_eq!(v.as_boolean(), None);
        }
    }

    #[test]
    fn test_string_boolean() {
        assert_eq!(Val::string("TRUE").as_boolean(), Some(true));
        assert_eq!(Val::string("yes").as_boolean(), Some(false));
    }

    #[test]
    fn test_type_ids_skip_reserved() {
        assert_eq!(Type::from_id(2), None);
        assert_eq!(Type::from_id(9), None);
        assert_eq!(Type::from_id(Type::String.id()), Some(Type::String));
    }
}
