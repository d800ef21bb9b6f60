// tests/lexer_tests.rs

use dashexpr::{TokenType, tokenize};

fn kinds(source: &str) -> Vec<TokenType> {
    tokenize(source)
        .iter()
        .map(|t| t.token_type)
        .filter(|t| *t != TokenType::Whitespace)
        .collect()
}

fn texts(source: &str) -> Vec<&str> {
    tokenize(source)
        .into_iter()
        .filter(|t| t.token_type != TokenType::Whitespace)
        .map(|t| t.text())
        .collect()
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_numbers() {
    assert_eq!(kinds("42"), vec![TokenType::Number]);
    assert_eq!(kinds("3.14"), vec![TokenType::Number]);
    assert_eq!(kinds(".5"), vec![TokenType::Number]);
    assert_eq!(kinds("1e3"), vec![TokenType::Number]);
    assert_eq!(kinds("1x"), vec![TokenType::Unidentified]);
}

#[test]
fn test_string_with_escaped_quote() {
    let tokens = tokenize("'it''s'");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].token_type, TokenType::String);
    assert_eq!(tokens[0].unquoted(), "it's");
}

#[test]
fn test_unterminated_string_is_unidentified() {
    let tokens = tokenize("concat('abc");
    assert_eq!(tokens.last().map(|t| t.token_type), Some(TokenType::Unidentified));
}

#[test]
fn test_empty_input() {
    assert!(tokenize("").is_empty());
}

// ============================================================================
// Field references and calls
// ============================================================================

#[test]
fn test_field_reference() {
    let tokens = tokenize("${EventTime}");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].token_type, TokenType::FieldRef);
    assert_eq!(tokens[0].field_name(), "EventTime");
}

#[test]
fn test_operator_inside_field_name_is_kept() {
    let tokens = tokenize("${a-b}");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].field_name(), "a-b");
}

#[test]
fn test_function_call() {
    assert_eq!(
        kinds("sum(${x}, 2)"),
        vec![
            TokenType::FunctionStart,
            TokenType::FieldRef,
            TokenType::Comma,
            TokenType::Number,
            TokenType::FunctionEnd
        ]
    );
    assert_eq!(tokenize("sum(")[0].function_name(), "sum");
}

#[test]
fn test_bare_bracket_has_no_name() {
    let tokens = tokenize("(1)");
    assert_eq!(tokens[0].token_type, TokenType::FunctionStart);
    assert_eq!(tokens[0].function_name(), "");
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_two_character_operators_win() {
    assert_eq!(
        kinds("1>=2<=3!=4"),
        vec![
            TokenType::Number,
            TokenType::GreaterThanOrEqualTo,
            TokenType::Number,
            TokenType::LessThanOrEqualTo,
            TokenType::Number,
            TokenType::NotEquals,
            TokenType::Number
        ]
    );
}

#[test]
fn test_all_arithmetic_operators() {
    assert_eq!(
        kinds("1^2/3*4%5+6"),
        vec![
            TokenType::Number,
            TokenType::Order,
            TokenType::Number,
            TokenType::Division,
            TokenType::Number,
            TokenType::Multiplication,
            TokenType::Number,
            TokenType::Modulus,
            TokenType::Number,
            TokenType::Plus,
            TokenType::Number
        ]
    );
}

#[test]
fn test_unknown_text_is_unidentified() {
    assert_eq!(kinds("1 @ 2"), vec![TokenType::Number, TokenType::Unidentified, TokenType::Number]);
}

// ============================================================================
// Negative numbers
// ============================================================================

#[test]
fn test_leading_minus_folds_into_number() {
    assert_eq!(texts("-10"), vec!["-10"]);
    assert_eq!(texts("2 * -3"), vec!["2", "*", "-3"]);
    assert_eq!(texts("max(-1)"), vec!["max(", "-1", ")"]);
}

#[test]
fn test_minus_after_operand_subtracts() {
    assert_eq!(texts("10-1"), vec!["10", "-", "1"]);
    assert_eq!(texts("${a} - 1"), vec!["${a}", "-", "1"]);
    assert_eq!(texts("(2)-1"), vec!["(", "2", ")", "-", "1"]);
}
