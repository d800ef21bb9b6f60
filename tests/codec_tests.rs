// tests/codec_tests.rs

use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use dashexpr::generator::codec::{val_from_bytes, val_to_bytes};
use dashexpr::{Expression, FieldIndex, Generator, GeneratorError, GroupKey, Parser, Val};

fn expression(formula: &str) -> Expression {
    let mut fields = FieldIndex::new();
    fields.create("v");
    Parser::default().parse(formula, &mut fields).unwrap()
}

/// Write `generator`, read the bytes into a fresh generator of the same
/// expression and check nothing is left over.
fn transfer(expression: &Expression, generator: &Generator) -> Generator {
    let mut buf = BytesMut::new();
    generator.write(&mut buf);
    let mut bytes = buf.freeze();
    let mut received = expression.create_generator();
    received.read(&mut bytes).unwrap();
    assert_eq!(bytes.remaining(), 0);
    received
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn test_value_layout() {
    assert_eq!(val_to_bytes(&Val::Null).to_vec(), vec![0u8]);
    assert_eq!(val_to_bytes(&Val::Boolean(true)).to_vec(), vec![1u8, 1]);
    assert_eq!(val_to_bytes(&Val::Integer(258)).to_vec(), vec![4u8, 0, 0, 1, 2]);
    assert_eq!(val_to_bytes(&Val::string("hi")).to_vec(), vec![7u8, 0, 0, 0, 2, b'h', b'i']);
}

#[test]
fn test_values_survive_transfer() {
    for val in [
        Val::Null,
        Val::Double(-0.5),
        Val::Long(i64::MIN),
        Val::Date(1_393_071_132_888),
        Val::string("héllo"),
        Val::err("Division by zero"),
    ] {
        assert_eq!(val_from_bytes(&val_to_bytes(&val)), Ok(val));
    }
}

#[test]
fn test_reserved_and_unknown_tags() {
    assert_eq!(val_from_bytes(&[2]), Err(GeneratorError::UnknownTypeTag(2)));
    assert_eq!(val_from_bytes(&[9]), Err(GeneratorError::UnknownTypeTag(9)));
    assert_eq!(val_from_bytes(&[200]), Err(GeneratorError::UnknownTypeTag(200)));
}

#[test]
fn test_truncated_input() {
    assert_eq!(val_from_bytes(&[]), Err(GeneratorError::UnexpectedEof));
    assert_eq!(val_from_bytes(&[5, 0, 0]), Err(GeneratorError::UnexpectedEof));
    assert_eq!(val_from_bytes(&[7, 0, 0, 0, 9, b'a']), Err(GeneratorError::UnexpectedEof));
}

#[test]
fn test_invalid_utf8() {
    assert_eq!(val_from_bytes(&[7, 0, 0, 0, 1, 0xff]), Err(GeneratorError::InvalidUtf8));
}

// ============================================================================
// Generators
// ============================================================================

#[test]
fn test_generator_state_survives_transfer() {
    for formula in [
        "sum(${v})",
        "average(${v}) + count()",
        "stDev(${v})",
        "countUnique(${v})",
        "distinct(${v}, ',', 3)",
        "joining(${v}, '|')",
        "min(${v}) * max(${v})",
        "${v} * 2",
    ] {
        let expression = expression(formula);
        let mut generator = expression.create_generator();
        for n in [3, 1, 4, 1, 5] {
            generator.set(&[Val::Integer(n)]);
        }
        let received = transfer(&expression, &generator);
        assert_eq!(received.eval(), generator.eval(), "{formula}");
    }
}

#[test]
fn test_random_survives_transfer() {
    let expression = expression("random()");
    let generator = expression.create_generator();
    assert_eq!(transfer(&expression, &generator).eval(), generator.eval());
}

#[test]
fn test_aggregate_error_survives_transfer() {
    let expression = expression("sum(${v})");
    let mut generator = expression.create_generator();
    generator.set(&[Val::err("boom")]);
    assert_eq!(transfer(&expression, &generator).eval(), Val::err("boom"));
}

#[test]
fn test_received_state_merges() {
    let expression = expression("sum(${v})");
    let mut left = expression.create_generator();
    left.set(&[Val::Double(0.1)]);
    let mut right = expression.create_generator();
    right.set(&[Val::Double(0.2)]);

    let mut received = transfer(&expression, &right);
    received.merge(&left).unwrap();
    assert_eq!(received.eval(), Val::Double(0.3));
}

#[test]
fn test_truncated_generator_state() {
    let expression = expression("sum(${v})");
    let mut generator = expression.create_generator();
    generator.set(&[Val::Integer(1)]);
    let mut buf = BytesMut::new();
    generator.write(&mut buf);
    let bytes = buf.freeze();

    let mut short = bytes.slice(..bytes.len() - 1);
    let mut received = expression.create_generator();
    assert_eq!(received.read(&mut short), Err(GeneratorError::UnexpectedEof));
}

// ============================================================================
// Group keys
// ============================================================================

#[test]
fn test_group_key_survives_transfer() {
    let parent = Arc::new(GroupKey::new(vec![Val::string("eu"), Val::Long(1)]));
    let key = GroupKey::child(parent, vec![Val::string("host-a")]);

    let mut buf = BytesMut::new();
    key.write(&mut buf);
    let mut bytes = buf.freeze();
    let read = GroupKey::read(&mut bytes).unwrap();

    assert_eq!(read, key);
    assert_eq!(read.depth(), 1);
    assert_eq!(read.to_string(), "eu|1/host-a");
}

#[test]
fn test_corrupt_group_key_is_an_error() {
    let mut deep = vec![1u8; 200_000];
    deep.push(0);
    assert!(matches!(
        GroupKey::read(&mut Bytes::from(deep)),
        Err(GeneratorError::InvalidState(_))
    ));

    assert_eq!(GroupKey::read(&mut Bytes::from_static(&[1, 1])), Err(GeneratorError::UnexpectedEof));

    // a root claiming depth 3
    let root_at_three: &[u8] = &[0, 0, 0, 0, 3, 0, 0, 0, 0];
    assert!(matches!(
        GroupKey::read(&mut Bytes::from_static(root_at_three)),
        Err(GeneratorError::InvalidState(_))
    ));
}

#[test]
fn test_deep_group_key_survives_transfer() {
    let mut key = Arc::new(GroupKey::new(vec![Val::Integer(0)]));
    for level in 1..50 {
        key = Arc::new(GroupKey::child(key, vec![Val::Integer(level)]));
    }
    let mut buf = BytesMut::new();
    key.write(&mut buf);
    let read = GroupKey::read(&mut buf.freeze()).unwrap();
    assert_eq!(read.depth(), 49);
    assert_eq!(&read, key.as_ref());
}

#[test]
fn test_count_groups_survives_transfer() {
    let expression = expression("countGroups()");
    let mut generator = expression.create_generator();
    for host in ["a", "b"] {
        generator.add_child_key(&GroupKey::new(vec![Val::string(host)]));
    }
    assert_eq!(transfer(&expression, &generator).eval(), Val::Long(2));
}
