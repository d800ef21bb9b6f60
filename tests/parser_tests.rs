// tests/parser_tests.rs

use dashexpr::{ArityError, FieldIndex, Param, ParseError, Parser, Val};

fn parse(formula: &str) -> Result<dashexpr::Expression, ParseError> {
    Parser::default().parse(formula, &mut FieldIndex::new())
}

fn eval(formula: &str) -> Val {
    parse(formula).unwrap().create_generator().eval()
}

fn eval_row(formula: &str, fields: &[(&str, Val)]) -> Val {
    let mut index = FieldIndex::new();
    for (name, _) in fields {
        index.create(name);
    }
    let expression = Parser::default().parse(formula, &mut index).unwrap();
    let row: Vec<Val> = fields.iter().map(|(_, v)| v.clone()).collect();
    let mut generator = expression.create_generator();
    generator.set(&row);
    generator.eval()
}

// ============================================================================
// Operator precedence
// ============================================================================

#[test]
fn test_bodmas() {
    assert_eq!(eval("4+4/2+2"), Val::Double(8.0));
    assert_eq!(eval("(4+4)/2+2"), Val::Double(6.0));
    assert_eq!(eval("(4+4)/(2+2)"), Val::Double(2.0));
    assert_eq!(eval("4+4/2+2*3"), Val::Double(12.0));
    assert_eq!(eval("8%3"), Val::Double(2.0));
}

#[test]
fn test_each_operator_has_its_own_rank() {
    // addition before subtraction
    assert_eq!(eval("10-1+2"), Val::Double(7.0));
    assert_eq!(eval("(10-1)+2"), Val::Double(11.0));
    // division before multiplication
    assert_eq!(eval("8/4*2"), Val::Double(4.0));
    assert_eq!(eval("8*4/2"), Val::Double(16.0));
    // multiplication before modulus
    assert_eq!(eval("7%4*2"), Val::Double(7.0));
}

#[test]
fn test_same_operator_reduces_leftmost_first() {
    assert_eq!(eval("2^3^2"), Val::Double(64.0));
    assert_eq!(eval("10-4-3"), Val::Double(3.0));
    assert_eq!(eval("16/4/2"), Val::Double(2.0));
}

#[test]
fn test_order_binds_tightest() {
    assert_eq!(eval("2*3^2"), Val::Double(18.0));
}

#[test]
fn test_unary_minus() {
    assert_eq!(eval("2*-3"), Val::Double(-6.0));
    assert_eq!(eval("-(1+2)"), Val::Double(-3.0));
    assert_eq!(eval_row("-${a}", &[("a", Val::Integer(4))]), Val::Double(-4.0));
}

#[test]
fn test_comparison_binds_loosest() {
    assert_eq!(eval_row("${a}+1=3", &[("a", Val::Integer(2))]), Val::Boolean(true));
    assert_eq!(eval("1+1>=3"), Val::Boolean(false));
    assert_eq!(eval("'abc' != 'abd'"), Val::Boolean(true));
}

#[test]
fn test_operators_are_function_aliases() {
    assert_eq!(eval("add(1, 2)"), eval("1+2"));
    assert_eq!(eval("greaterThan(2, 1)"), eval("2>1"));
}

#[test]
fn test_names_ignore_case() {
    assert_eq!(eval("MAX(1, 5, 3)"), Val::Double(5.0));
    assert_eq!(eval("Concat('a', 'b')"), Val::string("ab"));
}

// ============================================================================
// Syntax errors
// ============================================================================

#[test]
fn test_unknown_function() {
    assert_eq!(
        parse("1 + foo(1)").unwrap_err(),
        ParseError::UnknownFunction {
            name: "foo".to_string(),
            position: 4
        }
    );
}

#[test]
fn test_unbalanced_brackets() {
    assert_eq!(parse("sum(1").unwrap_err(), ParseError::UnbalancedBracket { position: 0 });
    assert_eq!(parse("1)").unwrap_err(), ParseError::UnbalancedBracket { position: 1 });
}

#[test]
fn test_misplaced_commas() {
    assert!(matches!(parse("1, 2"), Err(ParseError::UnexpectedToken { .. })));
    assert!(matches!(parse("max(1,)"), Err(ParseError::UnexpectedToken { .. })));
    assert!(matches!(parse("max(,1)"), Err(ParseError::UnexpectedToken { .. })));
}

#[test]
fn test_dangling_operators() {
    assert!(matches!(parse("1 +"), Err(ParseError::UnexpectedToken { .. })));
    assert!(matches!(parse("* 2"), Err(ParseError::UnexpectedToken { .. })));
    assert!(matches!(parse("1 * / 2"), Err(ParseError::UnexpectedToken { .. })));
}

#[test]
fn test_unidentified_text() {
    assert!(matches!(parse("1 @ 2"), Err(ParseError::UnexpectedToken { .. })));
}

#[test]
fn test_empty_brackets() {
    assert!(matches!(parse("()"), Err(ParseError::UnexpectedToken { .. })));
}

// ============================================================================
// Binding
// ============================================================================

#[test]
fn test_arity() {
    assert_eq!(
        parse("if(1, 2)").unwrap_err(),
        ParseError::Arity(ArityError {
            function: "if".to_string(),
            min: 3,
            max: Some(3),
            actual: 2,
        })
    );
    assert!(matches!(parse("count(1)"), Err(ParseError::Arity(_))));
    assert!(matches!(parse("sum()"), Err(ParseError::Arity(_))));
}

#[test]
fn test_arity_message() {
    let err = parse("not(1, 2)").unwrap_err();
    assert_eq!(err.to_string(), "Function 'not' expects 1 argument but found 2");
}

#[test]
fn test_static_arguments_are_validated() {
    let invalid = |formula: &str| matches!(parse(formula), Err(ParseError::InvalidParam { .. }));
    assert!(invalid("round(${a}, 19)"));
    assert!(invalid("round(${a}, 1.5)"));
    assert!(invalid("round(${a}, ${b})"));
    assert!(invalid("nth(${a}, 0)"));
    assert!(invalid("top(${a}, ',', 0)"));
    assert!(invalid("distinct(${a}, ', ', ${b})"));
    assert!(invalid("match(${a}, '')"));
    assert!(invalid("match(${a}, '[')"));
    assert!(invalid("replace(${a}, '(', 'x')"));
    assert!(invalid("decode(${a}, 'x', 1, 2, 3)"));
    assert!(invalid("include(${a}, 'ok', '')"));
    assert!(invalid("hash(${a}, 'SHA1')"));
    assert!(invalid("parseDate(${a}, 'qqq')"));
    assert!(invalid("formatDate(${a}, 'yyyy', 'Mars/Olympus')"));
    assert!(invalid("param(${a})"));
}

#[test]
fn test_invalid_param_message() {
    let err = parse("round(${a}, 19)").unwrap_err();
    assert!(err.to_string().starts_with("Invalid second argument to 'round'"), "{err}");
}

#[test]
fn test_runtime_patterns_are_not_checked_at_parse() {
    assert!(parse("match(${a}, ${b})").is_ok());
}

#[test]
fn test_constant_calls_fold() {
    let expression = parse("1 + 2 * 3").unwrap();
    assert_eq!(expression.root().and_then(Param::constant), Some(&Val::Double(7.0)));

    let expression = parse("upperCase(concat('a', 'b'))").unwrap();
    assert_eq!(expression.root().and_then(Param::constant), Some(&Val::string("AB")));
}

#[test]
fn test_folded_matches_unfolded() {
    let folded = parse("substring(upperCase('hello'), 1, 3)").unwrap();
    let unfolded = eval_row("substring(upperCase(${s}), 1, 3)", &[("s", Val::string("hello"))]);
    assert_eq!(folded.root().and_then(Param::constant), Some(&unfolded));
    assert_eq!(folded.create_generator().eval(), unfolded);
}

#[test]
fn test_non_constant_calls_do_not_fold() {
    for formula in ["${a} + 1", "random()", "sum(${a})", "count()", "param('x')"] {
        let expression = parse(formula).unwrap();
        assert_eq!(expression.root().and_then(Param::constant), None, "{formula}");
    }
}

#[test]
fn test_aggregate_flags() {
    assert!(parse("round(sum(${a}) / count(), 2)").unwrap().has_aggregate());
    assert!(!parse("sum(${a}, ${b})").unwrap().has_aggregate());
    assert!(!parse("${a} * 2").unwrap().has_aggregate());

    let selector = parse("first(${a}) + 1").unwrap();
    assert!(selector.has_aggregate());
    assert!(selector.requires_child_data());
    assert!(parse("countGroups()").unwrap().requires_child_data());
    assert!(!parse("count()").unwrap().requires_child_data());
}

// ============================================================================
// Fields
// ============================================================================

#[test]
fn test_fields_share_an_index() {
    let parser = Parser::default();
    let mut fields = FieldIndex::new();
    parser.parse("${x} + ${y}", &mut fields).unwrap();
    parser.parse("${y} * ${z}", &mut fields).unwrap();
    assert_eq!(fields.names(), ["x", "y", "z"]);
    assert_eq!(fields.get("z"), Some(2));
}

#[test]
fn test_referenced_fields() {
    let expression = parse("${b} + ${a} + ${b}").unwrap();
    assert_eq!(expression.referenced_fields(), vec!["b", "a"]);
}

#[test]
fn test_missing_column_reads_null() {
    let mut fields = FieldIndex::new();
    let expression = Parser::default().parse("isNull(${a})", &mut fields).unwrap();
    let mut generator = expression.create_generator();
    generator.set(&[]);
    assert_eq!(generator.eval(), Val::Boolean(true));
}

// ============================================================================
// Canonical form
// ============================================================================

#[test]
fn test_display() {
    assert_eq!(parse("add( 1 ,2)").unwrap().to_string(), "add(1, 2)");
    assert_eq!(parse("( 1 + 2 ) * ${a}").unwrap().to_string(), "(1+2)*${a}");
    assert_eq!(parse("concat('it''s')").unwrap().to_string(), "concat('it''s')");
    assert_eq!(parse("2 * -3").unwrap().to_string(), "2*-3");
}

#[test]
fn test_display_round_trips() {
    for formula in [
        "round(sum(${bytes}) / count(), 2)",
        "if(${a} >= 10, 'big', 'small')",
        "concat('a''b', ${c}, null())",
        "-${a} + 2 ^ 3",
        "10 - 1 + 2",
        "top(${host}, ', ', 3)",
    ] {
        let first = parse(formula).unwrap().to_string();
        let second = parse(&first).unwrap().to_string();
        assert_eq!(first, second, "{formula}");
    }
}
