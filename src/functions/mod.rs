//! The function catalog.
//!
//! Every function a formula can call is described by a [`FunctionDef`] in
//! [`FUNCTIONS`]. Lookup is case-insensitive and covers aliases, including
//! the operator symbols the parser emits.

pub mod binder;
pub mod date;
pub mod logic;
pub mod math;
pub mod string;
pub mod uri;

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::ast::Function;
use crate::compare::CompareOp;
use crate::generator::{AggregateKind, LimitedKind, SelectorKind};
use crate::value::{Type, Val};

pub use date::{DateRounding, DateUnit};
pub use logic::TypeTest;
pub use uri::UriPart;

/// What a function does. Several names can map to one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// `${name}` reference to a column of the input row
    Field,
    /// Unnamed `( ... )` grouping
    Bracket,

    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Power,
    Negate,
    Compare(CompareOp),

    If,
    Not,
    True,
    False,
    Null,
    Err,

    Count,
    CountGroups,
    Aggregate(AggregateKind),
    Selector(SelectorKind),
    Limited(LimitedKind),

    Concat,
    StringLength,
    UpperCase,
    LowerCase,
    Substring,
    SubstringBefore,
    SubstringAfter,
    IndexOf,
    LastIndexOf,
    Replace,
    Match,
    Decode,
    Include,
    Exclude,
    Hash,
    EncodeUrl,
    DecodeUrl,

    Link,
    Dashboard,
    Annotation,

    Round,
    Ceiling,
    Floor,

    ParseDate,
    FormatDate,
    RoundDate(DateRounding, DateUnit),

    ExtractUri(UriPart),

    TypeOf,
    IsType(TypeTest),
    Cast(Type),

    Param,
    Params,
    CurrentUser,
    Random,
}

impl FunctionKind {
    /// Whether the function summarizes many rows given `param_count`
    /// arguments. Multi-argument forms of `sum`, `min` and friends work
    /// across their arguments instead.
    pub fn is_aggregate(self, param_count: usize) -> bool {
        match self {
            FunctionKind::Count
            | FunctionKind::CountGroups
            | FunctionKind::Selector(_)
            | FunctionKind::Limited(_) => true,
            FunctionKind::Aggregate(_) => param_count == 1,
            _ => false,
        }
    }

    /// Whether a call with constant arguments may be evaluated once at bind
    /// time.
    pub fn is_foldable(self, param_count: usize) -> bool {
        !self.is_aggregate(param_count)
            && !matches!(
                self,
                FunctionKind::Field
                    | FunctionKind::Random
                    | FunctionKind::Param
                    | FunctionKind::Params
                    | FunctionKind::CurrentUser
            )
    }

    pub fn requires_child_data(self) -> bool {
        matches!(self, FunctionKind::Selector(_) | FunctionKind::CountGroups)
    }

    /// Value supplied by the host through static mapped values
    pub fn is_static_mapped(self) -> bool {
        matches!(
            self,
            FunctionKind::Param | FunctionKind::Params | FunctionKind::CurrentUser
        )
    }
}

/// Grouping used when listing functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Aggregate,
    Selection,
    Mathematics,
    Logic,
    String,
    Link,
    Date,
    Uri,
    Type,
    Value,
    Param,
}

impl Category {
    pub fn name(self) -> &'static str {
        match self {
            Category::Aggregate => "Aggregate",
            Category::Selection => "Selection",
            Category::Mathematics => "Mathematics",
            Category::Logic => "Logic",
            Category::String => "String",
            Category::Link => "Link",
            Category::Date => "Date",
            Category::Uri => "URI",
            Category::Type => "Type Checking",
            Category::Value => "Value",
            Category::Param => "Param",
        }
    }
}

#[derive(Debug)]
pub struct FunctionDef {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: FunctionKind,
    pub min_params: usize,
    /// `None` for any number of arguments
    pub max_params: Option<usize>,
    pub category: Category,
    pub description: &'static str,
}

macro_rules! def {
    ($name:literal, [$($alias:literal),*], $kind:expr, $min:literal..$max:expr, $cat:ident, $desc:literal) => {
        FunctionDef {
            name: $name,
            aliases: &[$($alias),*],
            kind: $kind,
            min_params: $min,
            max_params: $max,
            category: Category::$cat,
            description: $desc,
        }
    };
}

use self::DateRounding::{Ceiling as DCeil, Floor as DFloor, Round as DRound};
use self::FunctionKind as K;

pub static FUNCTIONS: &[FunctionDef] = &[
    // Aggregate
    def!("count", [], K::Count, 0..Some(0), Aggregate, "Number of rows in the group"),
    def!("countGroups", [], K::CountGroups, 0..Some(0), Aggregate, "Number of child groups under the group"),
    def!("countUnique", [], K::Aggregate(AggregateKind::CountUnique), 1..None, Aggregate, "Number of distinct values"),
    def!("sum", [], K::Aggregate(AggregateKind::Sum), 1..None, Aggregate, "Sum of values"),
    def!("average", ["mean"], K::Aggregate(AggregateKind::Average), 1..None, Aggregate, "Mean of values"),
    def!("min", [], K::Aggregate(AggregateKind::Min), 1..None, Aggregate, "Smallest value"),
    def!("max", [], K::Aggregate(AggregateKind::Max), 1..None, Aggregate, "Largest value"),
    def!("variance", [], K::Aggregate(AggregateKind::Variance), 1..None, Aggregate, "Population variance of values"),
    def!("stDev", [], K::Aggregate(AggregateKind::StDev), 1..None, Aggregate, "Population standard deviation of values"),
    def!("distinct", [], K::Limited(LimitedKind::Distinct), 1..Some(3), Aggregate, "Distinct values joined by a delimiter (default ', ') up to a limit (default 10)"),
    def!("joining", [], K::Limited(LimitedKind::Joining), 1..Some(3), Aggregate, "Values joined by a delimiter (default '') up to a limit (default 10)"),
    // Selection
    def!("any", [], K::Selector(SelectorKind::Any), 1..Some(1), Selection, "Any child value"),
    def!("first", [], K::Selector(SelectorKind::First), 1..Some(1), Selection, "First child value"),
    def!("last", [], K::Selector(SelectorKind::Last), 1..Some(1), Selection, "Last child value"),
    def!("nth", [], K::Selector(SelectorKind::Nth), 2..Some(2), Selection, "Child value at a 1-based position"),
    def!("top", [], K::Selector(SelectorKind::Top), 3..Some(3), Selection, "First n child values joined by a delimiter"),
    def!("bottom", [], K::Selector(SelectorKind::Bottom), 3..Some(3), Selection, "Last n child values joined by a delimiter"),
    // Mathematics
    def!("add", ["+"], K::Add, 2..None, Mathematics, "Add numbers or concatenate when any argument is a string"),
    def!("subtract", ["-"], K::Subtract, 2..None, Mathematics, "Subtract numbers"),
    def!("multiply", ["*"], K::Multiply, 2..None, Mathematics, "Multiply numbers"),
    def!("divide", ["/"], K::Divide, 2..None, Mathematics, "Divide numbers"),
    def!("modulus", ["%", "mod"], K::Modulus, 2..None, Mathematics, "Remainder after division"),
    def!("power", ["^"], K::Power, 2..None, Mathematics, "Raise to a power"),
    def!("negate", [], K::Negate, 1..Some(1), Mathematics, "Negate a number"),
    def!("round", [], K::Round, 1..Some(2), Mathematics, "Round to a number of decimal places"),
    def!("ceiling", [], K::Ceiling, 1..Some(2), Mathematics, "Round up to a number of decimal places"),
    def!("floor", [], K::Floor, 1..Some(2), Mathematics, "Round down to a number of decimal places"),
    def!("random", [], K::Random, 0..Some(0), Mathematics, "Random number between 0 and 1"),
    // Logic
    def!("equals", ["="], K::Compare(CompareOp::Equals), 2..Some(2), Logic, "Whether two values are equal"),
    def!("notEquals", ["!="], K::Compare(CompareOp::NotEquals), 2..Some(2), Logic, "Whether two values differ"),
    def!("greaterThan", [">"], K::Compare(CompareOp::GreaterThan), 2..Some(2), Logic, "Whether the first value is greater"),
    def!("greaterThanOrEqualTo", [">="], K::Compare(CompareOp::GreaterThanOrEqualTo), 2..Some(2), Logic, "Whether the first value is greater or equal"),
    def!("lessThan", ["<"], K::Compare(CompareOp::LessThan), 2..Some(2), Logic, "Whether the first value is less"),
    def!("lessThanOrEqualTo", ["<="], K::Compare(CompareOp::LessThanOrEqualTo), 2..Some(2), Logic, "Whether the first value is less or equal"),
    def!("if", [], K::If, 3..Some(3), Logic, "Second argument when the first is true, otherwise the third"),
    def!("not", [], K::Not, 1..Some(1), Logic, "Boolean inverse"),
    def!("match", [], K::Match, 2..Some(2), Logic, "Whether the whole value matches a regular expression"),
    // Value
    def!("true", [], K::True, 0..Some(0), Value, "Boolean true"),
    def!("false", [], K::False, 0..Some(0), Value, "Boolean false"),
    def!("null", [], K::Null, 0..Some(0), Value, "Null"),
    def!("err", [], K::Err, 0..Some(0), Value, "An error value"),
    // String
    def!("concat", [], K::Concat, 1..None, String, "Concatenate values"),
    def!("stringLength", [], K::StringLength, 1..Some(1), String, "Number of characters"),
    def!("upperCase", [], K::UpperCase, 1..Some(1), String, "Upper-case a string"),
    def!("lowerCase", [], K::LowerCase, 1..Some(1), String, "Lower-case a string"),
    def!("substring", [], K::Substring, 3..Some(3), String, "Characters from a start (inclusive) to an end (exclusive) position"),
    def!("substringBefore", [], K::SubstringBefore, 2..Some(2), String, "Text before the first occurrence of a delimiter"),
    def!("substringAfter", [], K::SubstringAfter, 2..Some(2), String, "Text after the first occurrence of a delimiter"),
    def!("indexOf", [], K::IndexOf, 2..Some(2), String, "Position of the first occurrence of a substring, or -1"),
    def!("lastIndexOf", [], K::LastIndexOf, 2..Some(2), String, "Position of the last occurrence of a substring, or -1"),
    def!("replace", [], K::Replace, 3..Some(3), String, "Replace every regular expression match"),
    def!("decode", [], K::Decode, 4..None, String, "Map a value through pattern/result pairs with a default"),
    def!("include", [], K::Include, 2..None, String, "The value if it matches any pattern, otherwise null"),
    def!("exclude", [], K::Exclude, 2..None, String, "Null if the value matches any pattern, otherwise the value"),
    def!("hash", [], K::Hash, 1..Some(3), String, "Hex digest with an optional algorithm and salt"),
    def!("encodeUrl", [], K::EncodeUrl, 1..Some(1), String, "Form-encode a string"),
    def!("decodeUrl", [], K::DecodeUrl, 1..Some(1), String, "Decode a form-encoded string"),
    // Link
    def!("link", [], K::Link, 1..Some(3), Link, "Hyperlink from text, url and type"),
    def!("dashboard", [], K::Dashboard, 2..Some(3), Link, "Hyperlink that opens a dashboard"),
    def!("annotation", [], K::Annotation, 2..Some(9), Link, "Hyperlink that opens an annotation"),
    // Date
    def!("parseDate", [], K::ParseDate, 1..Some(3), Date, "Parse text to a date with an optional pattern and time zone"),
    def!("formatDate", [], K::FormatDate, 1..Some(3), Date, "Format a date with an optional pattern and time zone"),
    def!("ceilingSecond", [], K::RoundDate(DCeil, DateUnit::Second), 1..Some(1), Date, "Round a date up to the second"),
    def!("ceilingMinute", [], K::RoundDate(DCeil, DateUnit::Minute), 1..Some(1), Date, "Round a date up to the minute"),
    def!("ceilingHour", [], K::RoundDate(DCeil, DateUnit::Hour), 1..Some(1), Date, "Round a date up to the hour"),
    def!("ceilingDay", [], K::RoundDate(DCeil, DateUnit::Day), 1..Some(1), Date, "Round a date up to the day"),
    def!("ceilingMonth", [], K::RoundDate(DCeil, DateUnit::Month), 1..Some(1), Date, "Round a date up to the month"),
    def!("ceilingYear", [], K::RoundDate(DCeil, DateUnit::Year), 1..Some(1), Date, "Round a date up to the year"),
    def!("floorSecond", [], K::RoundDate(DFloor, DateUnit::Second), 1..Some(1), Date, "Round a date down to the second"),
    def!("floorMinute", [], K::RoundDate(DFloor, DateUnit::Minute), 1..Some(1), Date, "Round a date down to the minute"),
    def!("floorHour", [], K::RoundDate(DFloor, DateUnit::Hour), 1..Some(1), Date, "Round a date down to the hour"),
    def!("floorDay", [], K::RoundDate(DFloor, DateUnit::Day), 1..Some(1), Date, "Round a date down to the day"),
    def!("floorMonth", [], K::RoundDate(DFloor, DateUnit::Month), 1..Some(1), Date, "Round a date down to the month"),
    def!("floorYear", [], K::RoundDate(DFloor, DateUnit::Year), 1..Some(1), Date, "Round a date down to the year"),
    def!("roundSecond", [], K::RoundDate(DRound, DateUnit::Second), 1..Some(1), Date, "Round a date to the nearest second"),
    def!("roundMinute", [], K::RoundDate(DRound, DateUnit::Minute), 1..Some(1), Date, "Round a date to the nearest minute"),
    def!("roundHour", [], K::RoundDate(DRound, DateUnit::Hour), 1..Some(1), Date, "Round a date to the nearest hour"),
    def!("roundDay", [], K::RoundDate(DRound, DateUnit::Day), 1..Some(1), Date, "Round a date to the nearest day"),
    def!("roundMonth", [], K::RoundDate(DRound, DateUnit::Month), 1..Some(1), Date, "Round a date to the nearest month"),
    def!("roundYear", [], K::RoundDate(DRound, DateUnit::Year), 1..Some(1), Date, "Round a date to the nearest year"),
    // URI
    def!("extractAuthorityFromUri", [], K::ExtractUri(UriPart::Authority), 1..Some(1), Uri, "Authority component of a URI"),
    def!("extractFragmentFromUri", [], K::ExtractUri(UriPart::Fragment), 1..Some(1), Uri, "Fragment component of a URI"),
    def!("extractHostFromUri", [], K::ExtractUri(UriPart::Host), 1..Some(1), Uri, "Host component of a URI"),
    def!("extractPathFromUri", [], K::ExtractUri(UriPart::Path), 1..Some(1), Uri, "Path component of a URI"),
    def!("extractPortFromUri", [], K::ExtractUri(UriPart::Port), 1..Some(1), Uri, "Port component of a URI"),
    def!("extractQueryFromUri", [], K::ExtractUri(UriPart::Query), 1..Some(1), Uri, "Query component of a URI"),
    def!("extractSchemeFromUri", [], K::ExtractUri(UriPart::Scheme), 1..Some(1), Uri, "Scheme component of a URI"),
    def!("extractSchemeSpecificPartFromUri", [], K::ExtractUri(UriPart::SchemeSpecificPart), 1..Some(1), Uri, "Everything after the scheme, excluding the fragment"),
    def!("extractUserInfoFromUri", [], K::ExtractUri(UriPart::UserInfo), 1..Some(1), Uri, "User info component of a URI"),
    // Type checking and casts
    def!("typeOf", [], K::TypeOf, 1..Some(1), Type, "Name of the value's type"),
    def!("isBoolean", [], K::IsType(TypeTest::Boolean), 1..Some(1), Type, "Whether the value is a boolean"),
    def!("isDouble", [], K::IsType(TypeTest::Double), 1..Some(1), Type, "Whether the value is a double"),
    def!("isInteger", [], K::IsType(TypeTest::Integer), 1..Some(1), Type, "Whether the value is an integer"),
    def!("isLong", [], K::IsType(TypeTest::Long), 1..Some(1), Type, "Whether the value is a long"),
    def!("isString", [], K::IsType(TypeTest::String), 1..Some(1), Type, "Whether the value is a string"),
    def!("isNumber", [], K::IsType(TypeTest::Number), 1..Some(1), Type, "Whether the value is numeric"),
    def!("isValue", [], K::IsType(TypeTest::Value), 1..Some(1), Type, "Whether the value is neither null nor an error"),
    def!("isNull", [], K::IsType(TypeTest::Null), 1..Some(1), Type, "Whether the value is null"),
    def!("isError", [], K::IsType(TypeTest::Error), 1..Some(1), Type, "Whether the value is an error"),
    def!("toBoolean", [], K::Cast(Type::Boolean), 1..Some(1), Type, "Convert to a boolean"),
    def!("toDouble", [], K::Cast(Type::Double), 1..Some(1), Type, "Convert to a double"),
    def!("toInteger", [], K::Cast(Type::Integer), 1..Some(1), Type, "Convert to an integer"),
    def!("toLong", [], K::Cast(Type::Long), 1..Some(1), Type, "Convert to a long"),
    def!("toString", [], K::Cast(Type::String), 1..Some(1), Type, "Convert to a string"),
    // Param
    def!("param", [], K::Param, 1..Some(1), Param, "Value of a named dashboard parameter"),
    def!("params", [], K::Params, 0..Some(0), Param, "All dashboard parameters as key=\"value\" pairs"),
    def!("currentUser", [], K::CurrentUser, 0..Some(0), Param, "Name of the user running the query"),
];

static NEGATE_BY_SIGN: FunctionDef = def!("-", [], K::Negate, 1..Some(1), Mathematics, "Negate a number");
static FIELD: FunctionDef = def!("${}", [], K::Field, 0..Some(0), Value, "Field reference");
static BRACKET: FunctionDef = def!("()", [], K::Bracket, 1..Some(1), Value, "Grouping");

static BY_NAME: LazyLock<HashMap<String, &'static FunctionDef>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for def in FUNCTIONS {
        map.insert(def.name.to_lowercase(), def);
        for alias in def.aliases {
            map.insert(alias.to_lowercase(), def);
        }
    }
    map
});

/// Find a function by name or alias, ignoring case.
pub fn lookup(name: &str) -> Option<&'static FunctionDef> {
    BY_NAME.get(&name.to_lowercase()).copied()
}

pub(crate) fn negate_def() -> &'static FunctionDef {
    &NEGATE_BY_SIGN
}

pub(crate) fn field_def() -> &'static FunctionDef {
    &FIELD
}

pub(crate) fn bracket_def() -> &'static FunctionDef {
    &BRACKET
}

/// Evaluate a non-aggregating function over already evaluated arguments.
pub(crate) fn apply(function: &Function, args: &[Val]) -> Val {
    let caches = function.caches();
    match function.kind() {
        K::Field | K::Bracket => args.first().cloned().unwrap_or(Val::Null),

        K::Add => math::add(args),
        K::Subtract => math::arithmetic(args, math::Op::Subtract),
        K::Multiply => math::arithmetic(args, math::Op::Multiply),
        K::Divide => math::arithmetic(args, math::Op::Divide),
        K::Modulus => math::arithmetic(args, math::Op::Modulus),
        K::Power => math::arithmetic(args, math::Op::Power),
        K::Negate => math::negate(&args[0]),
        K::Round | K::Ceiling | K::Floor => {
            math::round(function.kind(), &args[0], function.bound().decimal_places)
        }
        K::Aggregate(kind) => math::across(kind, args),
        K::Random => Val::Double(rand::random::<f64>()),

        K::Compare(op) => op.apply(&args[0], &args[1]),
        K::If => logic::if_then_else(&args[0], &args[1], &args[2]),
        K::Not => logic::not(&args[0]),
        K::True => Val::Boolean(true),
        K::False => Val::Boolean(false),
        K::Null => Val::Null,
        K::Err => Val::err("err()"),
        K::TypeOf => Val::string(args[0].type_of().name()),
        K::IsType(test) => Val::Boolean(test.test(&args[0])),
        K::Cast(ty) => logic::cast(&args[0], ty),

        K::Concat => string::concat(args),
        K::StringLength => string::length(&args[0]),
        K::UpperCase => string::map_string(&args[0], |s| s.to_uppercase()),
        K::LowerCase => string::map_string(&args[0], |s| s.to_lowercase()),
        K::Substring => string::substring(&args[0], &args[1], &args[2]),
        K::SubstringBefore => string::substring_before(&args[0], &args[1]),
        K::SubstringAfter => string::substring_after(&args[0], &args[1]),
        K::IndexOf => string::index_of(&args[0], &args[1], false),
        K::LastIndexOf => string::index_of(&args[0], &args[1], true),
        K::Replace => string::replace(caches, &args[0], &args[1], &args[2]),
        K::Match => string::matches(caches, &args[0], &args[1]),
        K::Decode => string::decode(caches, args),
        K::Include => string::include(caches, args, true),
        K::Exclude => string::include(caches, args, false),
        K::Hash => string::hash(args),
        K::EncodeUrl => string::map_string(&args[0], |s| string::encode_url(&s)),
        K::DecodeUrl => string::decode_url(&args[0]),
        K::Link => string::link(args),
        K::Dashboard => string::dashboard(args),
        K::Annotation => string::annotation(args),

        K::ParseDate => date::parse_date(caches, args),
        K::FormatDate => date::format_date(caches, args),
        K::RoundDate(rounding, unit) => date::round_date(&args[0], rounding, unit),

        K::ExtractUri(part) => uri::extract(&args[0], part),

        // These never reach a scalar generator.
        K::Count
        | K::CountGroups
        | K::Selector(_)
        | K::Limited(_)
        | K::Param
        | K::Params
        | K::CurrentUser => Val::err(format!("{} cannot be evaluated here", function.name())),
    }
}
