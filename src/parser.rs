use std::sync::Arc;

use tracing::{debug, trace};

use crate::ast::operators::{self, PRECEDENCE};
use crate::ast::{Expression, FieldIndex, Token, TokenType};
use crate::cache::Caches;
use crate::config::EngineConfig;
use crate::error::{ParseError, Result};
use crate::functions::binder::{Binder, Raw, RawCall};
use crate::functions::{self, bracket_def, field_def, negate_def};
use crate::lexer::tokenize;
use crate::value::Val;

/// A partially reduced argument: operators still waiting for operands, and
/// operands with the byte position they started at.
#[derive(Debug)]
enum Item<'a> {
    Op(Token<'a>),
    Operand(Raw, usize),
}

/// Turns formula text into a bound [`Expression`].
///
/// The parser owns the caches and configuration used while binding, so
/// several parsers can share one set of caches through [`Parser::with_caches`].
pub struct Parser {
    caches: Arc<Caches>,
    config: EngineConfig,
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new(EngineConfig::default())
    }
}

impl Parser {
    pub fn new(config: EngineConfig) -> Self {
        let caches = Arc::new(Caches::new(&config));
        Parser { caches, config }
    }

    pub fn with_caches(config: EngineConfig, caches: Arc<Caches>) -> Self {
        Parser { caches, config }
    }

    pub fn caches(&self) -> &Arc<Caches> {
        &self.caches
    }

    /// Parse and bind `formula`, registering any field it references in
    /// `fields`. Whitespace-only input yields an expression that evaluates
    /// to null.
    pub fn parse(&self, formula: &str, fields: &mut FieldIndex) -> Result<Expression> {
        trace!(formula, "parsing expression");
        let result = self.parse_inner(formula, fields);
        if let Err(e) = &result {
            debug!(formula, error = %e, "failed to parse expression");
        }
        result
    }

    fn parse_inner(&self, formula: &str, fields: &mut FieldIndex) -> Result<Expression> {
        let tokens = tokenize(formula);
        let mut pos = 0;
        let items = collect(&tokens, &mut pos, None, fields)?;

        let mut args = split_args(items)?;
        if args.len() > 1 {
            let position = args[1].first().map(item_position).unwrap_or(formula.len());
            return Err(ParseError::UnexpectedToken {
                found: "','".to_string(),
                position: position.saturating_sub(1),
            });
        }

        let root = match args.pop() {
            None => None,
            Some(arg) => {
                let raw = reduce(arg)?;
                let mut binder = Binder::new(Arc::clone(&self.caches), &self.config);
                Some(binder.bind(raw)?)
            }
        };
        Ok(Expression::new(root))
    }
}

fn item_position(item: &Item<'_>) -> usize {
    match item {
        Item::Op(t) => t.start,
        Item::Operand(_, pos) => *pos,
    }
}

fn unexpected(token: &Token<'_>) -> ParseError {
    ParseError::UnexpectedToken {
        found: format!("'{}'", token.text()),
        position: token.start,
    }
}

/// Gather tokens up to the bracket closing `open`, building nested calls as
/// they are completed.
fn collect<'a>(
    tokens: &[Token<'a>],
    pos: &mut usize,
    open: Option<&Token<'a>>,
    fields: &mut FieldIndex,
) -> Result<Vec<Item<'a>>> {
    let mut items = Vec::new();
    while *pos < tokens.len() {
        let token = tokens[*pos];
        *pos += 1;
        match token.token_type {
            TokenType::FunctionStart => {
                let inner = collect(tokens, pos, Some(&token), fields)?;
                let call = build_call(&token, inner)?;
                items.push(Item::Operand(call, token.start));
            }
            TokenType::FunctionEnd => {
                if open.is_none() {
                    return Err(ParseError::UnbalancedBracket {
                        position: token.start,
                    });
                }
                return Ok(items);
            }
            TokenType::Whitespace => {}
            TokenType::String => {
                items.push(Item::Operand(Raw::Val(Val::String(token.unquoted())), token.start));
            }
            TokenType::Number => {
                let text: String = token.text().chars().filter(|c| !c.is_whitespace()).collect();
                let number = text.parse::<f64>().map_err(|_| unexpected(&token))?;
                items.push(Item::Operand(Raw::Val(Val::Double(number)), token.start));
            }
            TokenType::FieldRef => {
                let name = token.field_name();
                let position = fields.create(name);
                items.push(Item::Operand(
                    Raw::Call(RawCall {
                        name: name.to_string(),
                        def: field_def(),
                        args: Vec::new(),
                        position: token.start,
                        field: Some(position),
                    }),
                    token.start,
                ));
            }
            TokenType::Unidentified => {
                if token.text().starts_with('\'') {
                    return Err(ParseError::UnterminatedString {
                        position: token.start,
                    });
                }
                return Err(unexpected(&token));
            }
            _ => items.push(Item::Op(token)),
        }
    }

    match open {
        Some(open) => Err(ParseError::UnbalancedBracket {
            position: open.start,
        }),
        None => Ok(items),
    }
}

fn build_call(open: &Token<'_>, inner: Vec<Item<'_>>) -> Result<Raw> {
    let name = open.function_name();
    let args = split_args(inner)?
        .into_iter()
        .map(reduce)
        .collect::<Result<Vec<_>>>()?;

    if name.is_empty() {
        if args.len() != 1 {
            return Err(ParseError::UnexpectedToken {
                found: "empty brackets".to_string(),
                position: open.start,
            });
        }
        return Ok(Raw::Call(RawCall {
            name: String::new(),
            def: bracket_def(),
            args,
            position: open.start,
            field: None,
        }));
    }

    let def = functions::lookup(name).ok_or_else(|| ParseError::UnknownFunction {
        name: name.to_string(),
        position: open.start,
    })?;
    Ok(Raw::Call(RawCall {
        name: name.to_string(),
        def,
        args,
        position: open.start,
        field: None,
    }))
}

/// Split on top-level commas. An empty argument is an error, an empty list
/// is not.
fn split_args(items: Vec<Item<'_>>) -> Result<Vec<Vec<Item<'_>>>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let mut args = vec![Vec::new()];
    let mut last_comma = None;
    for item in items {
        match item {
            Item::Op(t) if t.token_type == TokenType::Comma => {
                if args.last().is_some_and(Vec::is_empty) {
                    return Err(unexpected(&t));
                }
                last_comma = Some(t);
                args.push(Vec::new());
            }
            other => {
                if let Some(arg) = args.last_mut() {
                    arg.push(other);
                }
            }
        }
    }

    if let (Some(comma), Some(true)) = (last_comma, args.last().map(Vec::is_empty)) {
        return Err(unexpected(&comma));
    }
    Ok(args)
}

/// Reduce one argument to a single operand.
fn reduce(items: Vec<Item<'_>>) -> Result<Raw> {
    let mut items = apply_signs(items)?;
    for tier in PRECEDENCE {
        items = reduce_tier(items, tier)?;
    }

    let mut iter = items.into_iter();
    match (iter.next(), iter.next()) {
        (Some(Item::Operand(raw, _)), None) => Ok(raw),
        (Some(Item::Op(t)), _) => Err(unexpected(&t)),
        (Some(_), Some(next)) => Err(ParseError::UnexpectedToken {
            found: "operand without an operator".to_string(),
            position: item_position(&next),
        }),
        (None, _) => Err(ParseError::Empty),
    }
}

/// Fold unary `+`/`-` into the operand that follows. A sign is unary at the
/// start of an argument or straight after another operator.
fn apply_signs(items: Vec<Item<'_>>) -> Result<Vec<Item<'_>>> {
    let mut out: Vec<Item<'_>> = Vec::with_capacity(items.len());
    let mut iter = items.into_iter();
    while let Some(item) = iter.next() {
        let sign = match &item {
            Item::Op(t)
                if matches!(t.token_type, TokenType::Plus | TokenType::Minus)
                    && out.last().is_none_or(|prev| matches!(prev, Item::Op(_))) =>
            {
                *t
            }
            _ => {
                out.push(item);
                continue;
            }
        };

        match iter.next() {
            Some(Item::Operand(raw, _)) => {
                let raw = if sign.token_type == TokenType::Plus {
                    raw
                } else {
                    negate(raw, sign.start)
                };
                out.push(Item::Operand(raw, sign.start));
            }
            Some(Item::Op(next)) => return Err(unexpected(&next)),
            None => {
                return Err(ParseError::UnexpectedToken {
                    found: format!("trailing operator '{}'", sign.text()),
                    position: sign.start,
                });
            }
        }
    }
    Ok(out)
}

fn negate(raw: Raw, position: usize) -> Raw {
    match raw {
        Raw::Val(Val::Double(d)) => Raw::Val(Val::Double(-d)),
        other => Raw::Call(RawCall {
            name: "-".to_string(),
            def: negate_def(),
            args: vec![other],
            position,
            field: None,
        }),
    }
}

/// Replace every `operand op operand` run for operators in `tier`, leftmost
/// first.
fn reduce_tier<'a>(mut items: Vec<Item<'a>>, tier: &[TokenType]) -> Result<Vec<Item<'a>>> {
    loop {
        let found = items.iter().enumerate().find_map(|(i, item)| match item {
            Item::Op(t) if tier.contains(&t.token_type) => Some((i, *t)),
            _ => None,
        });
        let Some((i, op)) = found else {
            return Ok(items);
        };

        let has_left = i > 0 && matches!(items[i - 1], Item::Operand(..));
        let has_right = matches!(items.get(i + 1), Some(Item::Operand(..)));
        if !has_right && i + 1 >= items.len() {
            return Err(ParseError::UnexpectedToken {
                found: format!("trailing operator '{}'", op.text()),
                position: op.start,
            });
        }
        if !has_left || !has_right {
            return Err(unexpected(&op));
        }

        let symbol = operators::symbol(op.token_type).ok_or_else(|| unexpected(&op))?;
        let def = functions::lookup(symbol).ok_or_else(|| unexpected(&op))?;

        let mut operands = items.drain(i - 1..=i + 1);
        let (left, start) = match operands.next() {
            Some(Item::Operand(raw, start)) => (raw, start),
            _ => return Err(unexpected(&op)),
        };
        operands.next();
        let right = match operands.next() {
            Some(Item::Operand(raw, _)) => raw,
            _ => return Err(unexpected(&op)),
        };
        drop(operands);

        let call = Raw::Call(RawCall {
            name: symbol.to_string(),
            def,
            args: vec![left, right],
            position: op.start,
            field: None,
        });
        items.insert(i - 1, Item::Operand(call, start));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(formula: &str) -> Result<Expression> {
        Parser::default().parse(formula, &mut FieldIndex::new())
    }

    #[test]
    fn test_operand_without_operator() {
        assert!(matches!(
            parse("1 2"),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_trailing_operator() {
        let err = parse("1+").unwrap_err();
        assert!(err.to_string().contains("trailing operator"), "{err}");
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(parse("concat('abc").unwrap_err(), ParseError::UnterminatedString { position: 7 });
    }

    #[test]
    fn test_whitespace_only_is_null() {
        let expression = parse("   ").unwrap();
        assert!(expression.root().is_none());
        assert_eq!(expression.create_generator().eval(), Val::Null);
    }
}
