use crate::value::{Type, Val};

pub fn if_then_else(condition: &Val, then: &Val, otherwise: &Val) -> Val {
    if !condition.is_value() {
        return condition.clone();
    }
    if condition.as_boolean().unwrap_or(false) {
        then.clone()
    } else {
        otherwise.clone()
    }
}

pub fn not(val: &Val) -> Val {
    if !val.is_value() {
        return val.clone();
    }
    Val::Boolean(!val.as_boolean().unwrap_or(false))
}

/// Convert `val` to `ty`. Errors pass through; a value with no form in the
/// target type becomes null.
pub fn cast(val: &Val, ty: Type) -> Val {
    if val.is_err() {
        return val.clone();
    }
    let converted = match ty {
        Type::Boolean => val.as_boolean().map(Val::Boolean),
        Type::Double => val.as_double().map(Val::Double),
        Type::Integer => val.as_integer().map(Val::Integer),
        Type::Long => val.as_long().map(Val::Long),
        Type::Date => val.as_long().map(Val::Date),
        Type::String => val.as_string().map(Val::String),
        Type::Null | Type::Err => None,
    };
    converted.unwrap_or(Val::Null)
}

/// The `is*` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTest {
    Boolean,
    Double,
    Integer,
    Long,
    String,
    Number,
    Value,
    Null,
    Error,
}

impl TypeTest {
    pub fn test(self, val: &Val) -> bool {
        match self {
            TypeTest::Boolean => matches!(val, Val::Boolean(_)),
            TypeTest::Double => matches!(val, Val::Double(_)),
            TypeTest::Integer => matches!(val, Val::Integer(_)),
            TypeTest::Long => matches!(val, Val::Long(_)),
            TypeTest::String => matches!(val, Val::String(_)),
            TypeTest::Number => val.is_number(),
            TypeTest::Value => val.is_value(),
            TypeTest::Null => val.is_null(),
            TypeTest::Error => val.is_err(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_failure_is_null() {
        assert_eq!(cast(&Val::string("abc"), Type::Integer), Val::Null);
        assert_eq!(cast(&Val::string("12"), Type::Integer), Val::Integer(12));
        assert!(cast(&Val::err("x"), Type::String).is_err());
    }

    #[test]
    fn test_if_propagates_condition_error() {
        let e = Val::err("bad");
        assert_eq!(if_then_else(&e, &Val::Integer(1), &Val::Integer(2)), e);
        assert_eq!(
            if_then_else(&Val::Boolean(false), &Val::Integer(1), &Val::Integer(2)),
            Val::Integer(2)
        );
    }
}
