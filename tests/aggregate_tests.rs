// tests/aggregate_tests.rs

use std::cell::Cell;
use std::sync::Arc;

use dashexpr::generator::{CURRENT_USER_KEY, GroupKey};
use dashexpr::{ChildData, ChildGenerators, Expression, FieldIndex, Generator, GeneratorError, NodeId, Parser, Val};

/// Expressions with a single field `v`
fn expression(formula: &str) -> Expression {
    let mut fields = FieldIndex::new();
    fields.create("v");
    Parser::default().parse(formula, &mut fields).unwrap()
}

fn accumulate(expression: &Expression, values: &[Val]) -> Generator {
    let mut generator = expression.create_generator();
    for v in values {
        generator.set(std::slice::from_ref(v));
    }
    generator
}

fn run(formula: &str, values: &[Val]) -> Val {
    accumulate(&expression(formula), values).eval()
}

fn ints(values: impl IntoIterator<Item = i32>) -> Vec<Val> {
    values.into_iter().map(Val::Integer).collect()
}

// ============================================================================
// Numeric aggregates
// ============================================================================

#[test]
fn test_sum_and_average() {
    assert_eq!(run("sum(${v})", &ints([1, 2, 3, 4])), Val::Double(10.0));
    assert_eq!(run("average(${v})", &ints([1, 2, 3, 4])), Val::Double(2.5));
    assert_eq!(run("mean(${v})", &ints([2, 4])), Val::Double(3.0));
}

#[test]
fn test_sum_is_exact_for_decimals() {
    let values = vec![Val::Double(0.1), Val::Double(0.1), Val::Double(0.1)];
    assert_eq!(run("sum(${v})", &values), Val::Double(0.3));
}

#[test]
fn test_min_max() {
    let values = vec![Val::Integer(3), Val::string("10"), Val::Null, Val::Double(-1.5)];
    assert_eq!(run("min(${v})", &values), Val::Double(-1.5));
    assert_eq!(run("max(${v})", &values), Val::Double(10.0));
}

#[test]
fn test_variance_and_stdev() {
    let values = ints([2, 4, 4, 4, 5, 5, 7, 9]);
    assert_eq!(run("variance(${v})", &values), Val::Double(4.0));
    assert_eq!(run("stDev(${v})", &values), Val::Double(2.0));
}

#[test]
fn test_count_unique() {
    let values = vec![Val::string("a"), Val::string("b"), Val::string("a"), Val::Null];
    assert_eq!(run("countUnique(${v})", &values), Val::Integer(2));
    assert_eq!(run("countUnique(${v})", &[]), Val::Integer(0));
}

#[test]
fn test_empty_group_is_null() {
    assert_eq!(run("sum(${v})", &[]), Val::Null);
    assert_eq!(run("average(${v})", &[Val::Null]), Val::Null);
    assert_eq!(run("min(${v})", &[]), Val::Null);
}

#[test]
fn test_count() {
    assert_eq!(run("count()", &ints(0..5)), Val::Long(5));
    assert_eq!(run("count()", &[]), Val::Long(0));
}

#[test]
fn test_aggregate_errors() {
    let values = vec![Val::Integer(1), Val::err("b"), Val::err("a")];
    assert_eq!(run("sum(${v})", &values), Val::err("a"));

    let bad = run("sum(${v})", &[Val::Integer(1), Val::string("x")]);
    assert_eq!(bad, Val::err("Unable to use 'x' in sum"));
}

#[test]
fn test_scalar_over_aggregates() {
    let values = ints([1, 2, 4]);
    assert_eq!(run("round(sum(${v}) / count(), 2)", &values), Val::Double(2.33));
    assert_eq!(run("max(${v}) - min(${v})", &values), Val::Double(3.0));
}

// ============================================================================
// Limited aggregates
// ============================================================================

#[test]
fn test_distinct() {
    let values = vec![Val::string("b"), Val::string("a"), Val::string("b"), Val::string("c")];
    assert_eq!(run("distinct(${v})", &values), Val::string("a, b, c"));
}

#[test]
fn test_distinct_limit() {
    let values: Vec<Val> = ["e", "d", "c", "b", "a"].into_iter().map(Val::string).collect();
    assert_eq!(run("distinct(${v}, ',', 3)", &values), Val::string("c,d,e"));
}

#[test]
fn test_joining_keeps_arrival_order() {
    let values = vec![Val::string("b"), Val::Null, Val::string("a"), Val::string("b")];
    assert_eq!(run("joining(${v})", &values), Val::string("bab"));
    assert_eq!(run("joining(${v}, '-', 2)", &values), Val::string("b-a"));
}

#[test]
fn test_limited_empty_is_null() {
    assert_eq!(run("distinct(${v})", &[Val::Null]), Val::Null);
}

#[test]
fn test_distinct_default_limit_from_config() {
    let config = dashexpr::EngineConfig {
        default_max_values: 2,
        ..Default::default()
    };
    let mut fields = FieldIndex::new();
    fields.create("v");
    let expression = Parser::new(config).parse("distinct(${v})", &mut fields).unwrap();
    let values = ints([3, 2, 1]);
    assert_eq!(accumulate(&expression, &values).eval(), Val::string("2, 3"));
}

// ============================================================================
// Merging partial results
// ============================================================================

#[test]
fn test_merge_partials() {
    let expression = expression("concat(sum(${v}), '/', count(), '/', max(${v}))");
    let mut left = accumulate(&expression, &ints([1, 2]));
    let right = accumulate(&expression, &ints([10]));
    left.merge(&right).unwrap();
    assert_eq!(left.eval(), Val::string("13/3/10"));
}

#[test]
fn test_merge_with_empty_partial() {
    let expression = expression("min(${v})");
    let mut left = accumulate(&expression, &[]);
    left.merge(&accumulate(&expression, &ints([4]))).unwrap();
    left.merge(&accumulate(&expression, &[])).unwrap();
    assert_eq!(left.eval(), Val::Double(4.0));
}

#[test]
fn test_merge_distinct_respects_limit() {
    let expression = expression("distinct(${v}, ',', 3)");
    let mut left = accumulate(&expression, &ints([1, 2]));
    left.merge(&accumulate(&expression, &ints([2, 3, 4]))).unwrap();
    assert_eq!(left.eval(), Val::string("1,2,3"));
}

#[test]
fn test_merge_shape_mismatch() {
    let mut sum = accumulate(&expression("sum(${v})"), &[]);
    let count = accumulate(&expression("count()"), &[]);
    assert_eq!(
        sum.merge(&count),
        Err(GeneratorError::ShapeMismatch {
            expected: "aggregate",
            found: "count"
        })
    );
}

// ============================================================================
// Selectors and child groups
// ============================================================================

fn children(expression: &Expression, values: &[Val]) -> Vec<Generator> {
    values
        .iter()
        .map(|v| accumulate(expression, std::slice::from_ref(v)))
        .collect()
}

#[test]
fn test_top_and_bottom() {
    let top = expression("top(${v}, ',', 3)");
    let group = accumulate(&top, &ints(1..=10));
    assert_eq!(group.select(&children(&top, &ints(1..=10))), Val::string("1,2,3"));

    let bottom = expression("bottom(${v}, ',', 3)");
    let group = accumulate(&bottom, &ints(1..=10));
    assert_eq!(group.select(&children(&bottom, &ints(1..=10))), Val::string("8,9,10"));
}

#[test]
fn test_first_last_nth() {
    let values = vec![Val::string("x"), Val::string("y"), Val::string("z")];
    for (formula, expected) in [
        ("first(${v})", Val::string("x")),
        ("any(${v})", Val::string("x")),
        ("last(${v})", Val::string("z")),
        ("nth(${v}, 2)", Val::string("y")),
        ("nth(${v}, 4)", Val::Null),
    ] {
        let expression = expression(formula);
        let group = accumulate(&expression, &values);
        assert_eq!(group.select(&children(&expression, &values)), expected, "{formula}");
    }
}

#[test]
fn test_selector_without_child_data_reads_its_argument() {
    assert_eq!(run("first(${v})", &[Val::string("only")]), Val::string("only"));
}

#[test]
fn test_selector_inside_scalar() {
    let expression = expression("concat(first(${v}), '..', last(${v}))");
    let values = ints([5, 6, 7]);
    let group = accumulate(&expression, &values);
    assert_eq!(group.select(&children(&expression, &values)), Val::string("5..7"));
}

fn sorted(children: &[Generator]) -> Option<Box<dyn ChildData + '_>> {
    Some(Box::new(ChildGenerators::sorted(children)))
}

#[test]
fn test_sorted_child_generators() {
    let expression = expression("top(${v}, ' ', 2)");
    let values = ints([30, 10, 20]);
    let group = accumulate(&expression, &values);
    let kids = children(&expression, &values);
    assert_eq!(group.eval_with(&|| sorted(&kids)), Val::string("10 20"));
}

struct FixedChildren;

impl ChildData for FixedChildren {
    fn first(&self, _node: NodeId) -> Val {
        Val::string("first")
    }

    fn last(&self, _node: NodeId) -> Val {
        Val::string("last")
    }

    fn nth(&self, _node: NodeId, position: usize) -> Val {
        Val::Long(position as i64)
    }

    fn top(&self, _node: NodeId, delimiter: &str, limit: usize) -> Val {
        Val::String(format!("top{delimiter}{limit}"))
    }

    fn bottom(&self, _node: NodeId, delimiter: &str, limit: usize) -> Val {
        Val::String(format!("bottom{delimiter}{limit}"))
    }

    fn count(&self) -> i64 {
        7
    }
}

fn fixed() -> Option<Box<dyn ChildData>> {
    Some(Box::new(FixedChildren))
}

#[test]
fn test_host_supplied_child_data() {
    let group = accumulate(&expression("concat(last(${v}), nth(${v}, 3), top(${v}, ':', 2))"), &[]);
    assert_eq!(group.eval_with(&fixed), Val::string("last3top:2"));
}

#[test]
fn test_child_data_is_fetched_lazily_and_once() {
    let calls = Cell::new(0);

    let plain = accumulate(&expression("sum(${v})"), &ints([1]));
    let value = plain.eval_with(&|| {
        calls.set(calls.get() + 1);
        fixed()
    });
    assert_eq!(value, Val::Double(1.0));
    assert_eq!(calls.get(), 0);

    let two = accumulate(&expression("concat(first(${v}), last(${v}))"), &[]);
    let value = two.eval_with(&|| {
        calls.set(calls.get() + 1);
        fixed()
    });
    assert_eq!(value, Val::string("firstlast"));
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_count_groups() {
    let expression = expression("countGroups()");
    let mut group = expression.create_generator();
    let parent = Arc::new(GroupKey::new(vec![Val::string("eu")]));
    for host in ["a", "b", "a"] {
        group.add_child_key(&GroupKey::child(Arc::clone(&parent), vec![Val::string(host)]));
    }
    assert_eq!(group.eval(), Val::Long(2));

    let mut other = expression.create_generator();
    other.add_child_key(&GroupKey::child(Arc::clone(&parent), vec![Val::string("c")]));
    group.merge(&other).unwrap();
    assert_eq!(group.eval(), Val::Long(3));
}

#[test]
fn test_count_groups_falls_back_to_child_data() {
    let group = expression("countGroups()").create_generator();
    assert_eq!(group.eval(), Val::Long(0));
    assert_eq!(group.eval_with(&fixed), Val::Long(7));
}

#[test]
fn test_current_user_key() {
    assert_eq!(CURRENT_USER_KEY, "currentUser()");
}
