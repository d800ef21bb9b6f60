//! Value ordering: the comparison operators and the default row ordering.

use std::cmp::Ordering;

use crate::value::Val;

/// Compare two values the way the comparison operators do.
///
/// Both sides must be values. Values of the same variant compare natively
/// (strings case-sensitively); mixed variants compare numerically when both
/// convert to a double and fall back to comparing their string forms.
pub fn compare_values(a: &Val, b: &Val) -> Result<Ordering, Val> {
    if let Val::Err(_) = a {
        return Err(a.clone());
    }
    if let Val::Err(_) = b {
        return Err(b.clone());
    }
    if a.is_null() || b.is_null() {
        return Err(Val::err("Unable to compare null"));
    }

    let ord = match (a, b) {
        (Val::Boolean(x), Val::Boolean(y)) => x.cmp(y),
        (Val::Integer(x), Val::Integer(y)) => x.cmp(y),
        (Val::Long(x), Val::Long(y)) | (Val::Date(x), Val::Date(y)) => x.cmp(y),
        (Val::Double(x), Val::Double(y)) => x.total_cmp(y),
        (Val::String(x), Val::String(y)) => x.cmp(y),
        _ => match (a.as_double(), b.as_double()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => a.as_string().cmp(&b.as_string()),
        },
    };
    Ok(ord)
}

/// Comparison operator kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
}

impl CompareOp {
    pub fn apply(self, a: &Val, b: &Val) -> Val {
        match compare_values(a, b) {
            Ok(ord) => Val::Boolean(match self {
                CompareOp::Equals => ord == Ordering::Equal,
                CompareOp::NotEquals => ord != Ordering::Equal,
                CompareOp::GreaterThan => ord == Ordering::Greater,
                CompareOp::GreaterThanOrEqualTo => ord != Ordering::Less,
                CompareOp::LessThan => ord == Ordering::Less,
                CompareOp::LessThanOrEqualTo => ord != Ordering::Greater,
            }),
            Err(e) => e,
        }
    }
}

/// Default ordering for values of unknown type.
///
/// Values that convert to a number compare numerically and sort before
/// those that don't, which compare by their string form ignoring case.
/// Nulls (and errors) sort after every value. The result is a total order so
/// it is safe to hand to `sort_by`.
pub fn auto_compare(a: &Val, b: &Val) -> Ordering {
    match (a.is_value(), b.is_value()) {
        (false, false) => Ordering::Equal,
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        (true, true) => match (a.as_double(), b.as_double()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => {
                let x = a.as_string().unwrap_or_default().to_lowercase();
                let y = b.as_string().unwrap_or_default().to_lowercase();
                x.cmp(&y)
            }
        },
    }
}
