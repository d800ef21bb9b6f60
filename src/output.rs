//! JSON bridge for hosts that exchange rows and results as JSON.
//!
//! Input conversion is lossless for scalars: integral numbers become
//! [`Val::Long`], other numbers [`Val::Double`]. Arrays and objects have no
//! `Val` counterpart and are carried as their JSON text.
//!
//! # Examples
//!
//! ```
//! use dashexpr::Val;
//! use dashexpr::output::{json_to_val, val_to_json};
//!
//! assert_eq!(json_to_val(&serde_json::json!(42)), Val::Long(42));
//! assert_eq!(val_to_json(&Val::Double(1.5)), serde_json::json!(1.5));
//! assert_eq!(val_to_json(&Val::Null), serde_json::Value::Null);
//! ```

use serde_json::{Map, Value as Json};

use crate::ast::FieldIndex;
use crate::value::{Val, format_canonical_date};

pub fn json_to_val(json: &Json) -> Val {
    match json {
        Json::Null => Val::Null,
        Json::Bool(b) => Val::Boolean(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Val::Long(i),
            None => n.as_f64().map(Val::Double).unwrap_or(Val::Null),
        },
        Json::String(s) => Val::String(s.clone()),
        other => Val::String(other.to_string()),
    }
}

/// Errors become `{"error": message}`; dates their canonical string.
pub fn val_to_json(val: &Val) -> Json {
    match val {
        Val::Null => Json::Null,
        Val::Boolean(b) => Json::Bool(*b),
        Val::Integer(n) => Json::from(*n),
        Val::Long(n) => Json::from(*n),
        Val::Double(d) => serde_json::Number::from_f64(*d)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Val::String(s) => Json::String(s.clone()),
        Val::Date(ms) => format_canonical_date(*ms)
            .map(Json::String)
            .unwrap_or_else(|| Json::from(*ms)),
        Val::Err(message) => {
            let mut map = Map::new();
            map.insert("error".to_string(), Json::String(message.clone()));
            Json::Object(map)
        }
    }
}

/// Lay out the fields of a JSON object as a row for `fields`. Fields the
/// object lacks are null; fields the index lacks are ignored.
pub fn row_from_object(object: &Map<String, Json>, fields: &FieldIndex) -> Vec<Val> {
    fields
        .names()
        .iter()
        .map(|name| object.get(name).map(json_to_val).unwrap_or(Val::Null))
        .collect()
}

/// Serialize compactly or with two-space indentation.
pub fn to_json(json: &Json, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(json)
    } else {
        serde_json::to_string(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers() {
        assert_eq!(json_to_val(&json!(1.25)), Val::Double(1.25));
        assert_eq!(json_to_val(&json!(-3)), Val::Long(-3));
        assert_eq!(val_to_json(&Val::Double(f64::NAN)), Json::Null);
    }

    #[test]
    fn test_nested_values_become_text() {
        assert_eq!(json_to_val(&json!([1, 2])), Val::string("[1,2]"));
    }

    #[test]
    fn test_error_and_date() {
        assert_eq!(val_to_json(&Val::err("bad")), json!({"error": "bad"}));
        assert_eq!(val_to_json(&Val::Date(1_393_071_132_888)), json!("2014-02-22T12:12:12.888Z"));
    }

    #[test]
    fn test_row_layout() {
        let mut fields = FieldIndex::new();
        fields.create("b");
        fields.create("a");
        let object = json!({"a": 1, "c": true});
        let row = row_from_object(object.as_object().unwrap(), &fields);
        assert_eq!(row, vec![Val::Null, Val::Long(1)]);
    }
}
