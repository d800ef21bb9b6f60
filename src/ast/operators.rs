use crate::ast::TokenType;

/// Reduction order for operators within one argument.
///
/// Each arithmetic operator has its own rank: every `^` is reduced before
/// any `/`, every `/` before any `*`, and so on down to `-`, leftmost first.
/// So `8/4*2` is `(8/4)*2` but `10-1+2` is `10-(1+2)`. Equality operators
/// share the loosest rank so that `${a}+1=3` compares the sum.
pub const PRECEDENCE: [&[TokenType]; 7] = [
    &[TokenType::Order],
    &[TokenType::Division],
    &[TokenType::Multiplication],
    &[TokenType::Modulus],
    &[TokenType::Plus],
    &[TokenType::Minus],
    &[
        TokenType::Equals,
        TokenType::NotEquals,
        TokenType::GreaterThan,
        TokenType::GreaterThanOrEqualTo,
        TokenType::LessThan,
        TokenType::LessThanOrEqualTo,
    ],
];

/// Symbol used to look up and print the function an operator becomes.
pub fn symbol(token_type: TokenType) -> Option<&'static str> {
    let symbol = match token_type {
        TokenType::Order => "^",
        TokenType::Division => "/",
        TokenType::Multiplication => "*",
        TokenType::Modulus => "%",
        TokenType::Plus => "+",
        TokenType::Minus => "-",
        TokenType::Equals => "=",
        TokenType::NotEquals => "!=",
        TokenType::GreaterThan => ">",
        TokenType::GreaterThanOrEqualTo => ">=",
        TokenType::LessThan => "<",
        TokenType::LessThanOrEqualTo => "<=",
        _ => return None,
    };
    Some(symbol)
}
