use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use super::FunctionKind;
use crate::generator::{AggregateKind, AggregateState};
use crate::value::Val;

/// Binary arithmetic applied left to right across arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Power,
}

fn not_a_number(val: &Val) -> Val {
    Val::err(format!(
        "Unable to convert '{}' to a number",
        val.as_string().unwrap_or_default()
    ))
}

/// Apply `op` in decimal arithmetic where both operands fit, so that
/// `0.1 + 0.2` is `0.3`; otherwise in floating point.
fn combine(op: Op, a: f64, b: f64) -> f64 {
    if op != Op::Power
        && let Some(x) = Decimal::from_f64(a)
        && let Some(y) = Decimal::from_f64(b)
    {
        let exact = match op {
            Op::Add => x.checked_add(y),
            Op::Subtract => x.checked_sub(y),
            Op::Multiply => x.checked_mul(y),
            Op::Divide => x.checked_div(y),
            Op::Modulus => x.checked_rem(y),
            Op::Power => None,
        };
        if let Some(r) = exact.and_then(|r| r.to_f64()) {
            return r;
        }
    }
    match op {
        Op::Add => a + b,
        Op::Subtract => a - b,
        Op::Multiply => a * b,
        Op::Divide => a / b,
        Op::Modulus => a % b,
        Op::Power => a.powf(b),
    }
}

/// Numeric addition, or concatenation when any argument is a string.
///
/// Errors propagate. When concatenating, nulls contribute nothing; when
/// adding numbers, any null makes the result null.
pub fn add(args: &[Val]) -> Val {
    if let Some(err) = args.iter().find(|v| v.is_err()) {
        return err.clone();
    }

    if args.iter().any(|v| matches!(v, Val::String(_))) {
        let joined: String = args.iter().filter_map(Val::as_string).collect();
        return Val::String(joined);
    }

    let mut total: Option<f64> = None;
    for v in args {
        if v.is_null() {
            return Val::Null;
        }
        let Some(d) = v.as_double() else {
            return not_a_number(v);
        };
        total = Some(match total {
            None => d,
            Some(t) => combine(Op::Add, t, d),
        });
    }
    total.map(Val::Double).unwrap_or(Val::Null)
}

/// Left-to-right arithmetic. The first argument that is not a value is
/// returned unchanged; division or modulus by zero is an error.
pub fn arithmetic(args: &[Val], op: Op) -> Val {
    if let Some(v) = args.iter().find(|v| !v.is_value()) {
        return v.clone();
    }

    let mut total: Option<f64> = None;
    for v in args {
        let Some(d) = v.as_double() else {
            return not_a_number(v);
        };
        total = Some(match total {
            None => d,
            Some(t) => {
                if matches!(op, Op::Divide | Op::Modulus) && d == 0.0 {
                    return Val::err("Division by zero");
                }
                combine(op, t, d)
            }
        });
    }
    total.map(Val::Double).unwrap_or(Val::Null)
}

pub fn negate(val: &Val) -> Val {
    if !val.is_value() {
        return val.clone();
    }
    match val.as_double() {
        Some(d) => Val::Double(-d),
        None => not_a_number(val),
    }
}

/// `round`, `ceiling` or `floor` to `decimal_places` (default 0). Rounding
/// is half up: `floor(x * 10^n + 0.5) / 10^n`.
pub fn round(kind: FunctionKind, val: &Val, decimal_places: Option<u32>) -> Val {
    if !val.is_value() {
        return val.clone();
    }
    let Some(d) = val.as_double() else {
        return not_a_number(val);
    };
    let places = decimal_places.unwrap_or(0).min(18);

    let exact = Decimal::from_f64(d).and_then(|x| {
        let factor = Decimal::from(10u64.pow(places));
        let scaled = x.checked_mul(factor)?;
        let rounded = match kind {
            FunctionKind::Ceiling => scaled.ceil(),
            FunctionKind::Floor => scaled.floor(),
            _ => scaled.checked_add(Decimal::new(5, 1))?.floor(),
        };
        rounded.checked_div(factor)?.to_f64()
    });
    if let Some(r) = exact {
        return Val::Double(r);
    }

    let factor = 10f64.powi(places as i32);
    let scaled = d * factor;
    let rounded = match kind {
        FunctionKind::Ceiling => scaled.ceil(),
        FunctionKind::Floor => scaled.floor(),
        _ => (scaled + 0.5).floor(),
    };
    Val::Double(rounded / factor)
}

/// Multi-argument `sum`, `min` and friends: the aggregate computed over
/// the arguments of a single row.
pub fn across(kind: AggregateKind, args: &[Val]) -> Val {
    let mut state = AggregateState::new(kind);
    for v in args {
        state.add(v);
    }
    state.eval()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_concatenates_strings() {
        assert_eq!(add(&[Val::string("a"), Val::Double(1.0)]), Val::string("a1"));
        assert_eq!(add(&[Val::Null, Val::Null, Val::string("test")]), Val::string("test"));
        assert_eq!(
            add(&[Val::Boolean(true), Val::string("test"), Val::Boolean(true)]),
            Val::string("truetesttrue")
        );
    }

    #[test]
    fn test_add_numbers() {
        assert_eq!(add(&[Val::Double(1.0), Val::Double(2.0)]), Val::Double(3.0));
        assert_eq!(add(&[Val::Boolean(true), Val::Boolean(true)]), Val::Double(2.0));
        assert_eq!(add(&[Val::Null, Val::Null]), Val::Null);
        assert_eq!(add(&[Val::Double(0.1), Val::Double(0.2)]), Val::Double(0.3));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(arithmetic(&[Val::Double(1.0), Val::Double(0.0)], Op::Divide).is_err());
        assert!(arithmetic(&[Val::Double(1.0), Val::Integer(0)], Op::Modulus).is_err());
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round(FunctionKind::Round, &Val::Double(2.5), None), Val::Double(3.0));
        assert_eq!(round(FunctionKind::Round, &Val::Double(-2.5), None), Val::Double(-2.0));
        assert_eq!(round(FunctionKind::Round, &Val::Double(8.4234), Some(2)), Val::Double(8.42));
        assert_eq!(round(FunctionKind::Ceiling, &Val::Double(8.4234), Some(1)), Val::Double(8.5));
        assert_eq!(round(FunctionKind::Floor, &Val::Double(8.4934), Some(1)), Val::Double(8.4));
    }
}
