use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::ast::{Token, TokenType};

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(\.\d*)?|\.\d+)([eE]\d+)?$").expect("number pattern is valid"));

const OPERATORS: [(&str, TokenType); 13] = [
    (">=", TokenType::GreaterThanOrEqualTo),
    ("<=", TokenType::LessThanOrEqualTo),
    ("!=", TokenType::NotEquals),
    (",", TokenType::Comma),
    ("^", TokenType::Order),
    ("/", TokenType::Division),
    ("*", TokenType::Multiplication),
    ("%", TokenType::Modulus),
    ("+", TokenType::Plus),
    ("-", TokenType::Minus),
    ("=", TokenType::Equals),
    (">", TokenType::GreaterThan),
    ("<", TokenType::LessThan),
];

/// A span of the input; `kind == None` means not yet classified.
#[derive(Debug, Clone, Copy)]
struct Span {
    kind: Option<TokenType>,
    start: usize,
    end: usize,
}

impl Span {
    fn unknown(start: usize, end: usize) -> Self {
        Span { kind: None, start, end }
    }

    fn of(kind: TokenType, start: usize, end: usize) -> Self {
        Span { kind: Some(kind), start, end }
    }
}

/// Splits formula text into tokens.
///
/// Lexing runs as a series of passes. Each pass only looks at the parts of
/// the input that earlier passes left unclassified, so a quote inside a
/// string literal is never mistaken for an operator and so on. Lexing never
/// fails; anything that cannot be classified comes out as
/// [`TokenType::Unidentified`] for the parser to report.
pub struct Lexer<'a> {
    source: &'a str,
    spans: Vec<Span>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let spans = if source.is_empty() {
            Vec::new()
        } else {
            vec![Span::unknown(0, source.len())]
        };
        Lexer { source, spans }
    }

    pub fn tokenize(mut self) -> Vec<Token<'a>> {
        self.refine(split_quoted_strings);
        self.refine(split_field_refs);
        self.refine(split_brackets);
        self.refine(split_operators);
        self.refine(split_whitespace);
        self.refine(classify_remaining);

        let source = self.source;
        let tokens = self
            .spans
            .into_iter()
            .map(|s| Token::new(s.kind.unwrap_or(TokenType::Unidentified), source, s.start, s.end))
            .collect();
        let tokens = fold_negative_numbers(tokens);
        trace!(count = tokens.len(), "tokenized expression");
        tokens
    }

    fn refine(&mut self, pass: fn(&[u8], usize, usize) -> Vec<Span>) {
        let source = self.source;
        let bytes = source.as_bytes();
        let mut out = Vec::with_capacity(self.spans.len());
        for span in self.spans.drain(..) {
            match span.kind {
                Some(_) => out.push(span),
                None => out.extend(pass(bytes, span.start, span.end)),
            }
        }
        self.spans = out;
    }
}

/// Tokenize formula text.
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    Lexer::new(source).tokenize()
}

fn split_quoted_strings(bytes: &[u8], start: usize, end: usize) -> Vec<Span> {
    let mut out = Vec::new();
    let mut last = start;
    let mut i = start;
    while i < end {
        if bytes[i] != b'\'' {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        let mut close = None;
        while j < end {
            if bytes[j] == b'\'' {
                if j + 1 < end && bytes[j + 1] == b'\'' {
                    j += 2;
                    continue;
                }
                close = Some(j);
                break;
            }
            j += 1;
        }

        if i > last {
            out.push(Span::unknown(last, i));
        }
        match close {
            Some(j) => {
                out.push(Span::of(TokenType::String, i, j + 1));
                i = j + 1;
                last = i;
            }
            None => {
                // Unterminated: swallow the rest so later passes leave it alone.
                out.push(Span::of(TokenType::Unidentified, i, end));
                last = end;
                break;
            }
        }
    }
    if last < end {
        out.push(Span::unknown(last, end));
    }
    out
}

fn split_field_refs(bytes: &[u8], start: usize, end: usize) -> Vec<Span> {
    let mut out = Vec::new();
    let mut last = start;
    let mut i = start;
    while i + 1 < end {
        if bytes[i] == b'$' && bytes[i + 1] == b'{' {
            if let Some(offset) = bytes[i + 2..end].iter().position(|&b| b == b'}') {
                let close = i + 2 + offset;
                if i > last {
                    out.push(Span::unknown(last, i));
                }
                out.push(Span::of(TokenType::FieldRef, i, close + 1));
                i = close + 1;
                last = i;
                continue;
            }
        }
        i += 1;
    }
    if last < end {
        out.push(Span::unknown(last, end));
    }
    out
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn split_brackets(bytes: &[u8], start: usize, end: usize) -> Vec<Span> {
    let mut out = Vec::new();
    let mut last = start;
    for i in start..end {
        match bytes[i] {
            b'(' => {
                let mut name_start = i;
                while name_start > last && is_name_byte(bytes[name_start - 1]) {
                    name_start -= 1;
                }
                if name_start > last {
                    out.push(Span::unknown(last, name_start));
                }
                out.push(Span::of(TokenType::FunctionStart, name_start, i + 1));
                last = i + 1;
            }
            b')' => {
                if i > last {
                    out.push(Span::unknown(last, i));
                }
                out.push(Span::of(TokenType::FunctionEnd, i, i + 1));
                last = i + 1;
            }
            _ => {}
        }
    }
    if last < end {
        out.push(Span::unknown(last, end));
    }
    out
}

fn split_operators(bytes: &[u8], start: usize, end: usize) -> Vec<Span> {
    let mut out = Vec::new();
    let mut last = start;
    let mut i = start;
    'scan: while i < end {
        for (op, kind) in OPERATORS {
            let op = op.as_bytes();
            if bytes[i..end].starts_with(op) {
                if i > last {
                    out.push(Span::unknown(last, i));
                }
                out.push(Span::of(kind, i, i + op.len()));
                i += op.len();
                last = i;
                continue 'scan;
            }
        }
        i += 1;
    }
    if last < end {
        out.push(Span::unknown(last, end));
    }
    out
}

fn split_whitespace(bytes: &[u8], start: usize, end: usize) -> Vec<Span> {
    let mut out = Vec::new();
    let mut last = start;
    let mut i = start;
    while i < end {
        if bytes[i].is_ascii_whitespace() {
            let run_start = i;
            while i < end && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if run_start > last {
                out.push(Span::unknown(last, run_start));
            }
            out.push(Span::of(TokenType::Whitespace, run_start, i));
            last = i;
        } else {
            i += 1;
        }
    }
    if last < end {
        out.push(Span::unknown(last, end));
    }
    out
}

fn classify_remaining(bytes: &[u8], start: usize, end: usize) -> Vec<Span> {
    let kind = match std::str::from_utf8(&bytes[start..end]) {
        Ok(text) if NUMBER.is_match(text) => TokenType::Number,
        _ => TokenType::Unidentified,
    };
    vec![Span::of(kind, start, end)]
}

/// Merge `-` followed by a number into a single negative number, unless the
/// `-` follows something that ends an operand, in which case it subtracts.
fn fold_negative_numbers(tokens: Vec<Token<'_>>) -> Vec<Token<'_>> {
    let mut out: Vec<Token<'_>> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if token.token_type == TokenType::Number
            && let Some(minus) = last_significant(&out)
            && out[minus].token_type == TokenType::Minus
            && last_significant(&out[..minus]).is_none_or(|p| !out[p].token_type.ends_operand())
        {
            let start = out[minus].start;
            out.truncate(minus);
            out.push(Token::new(TokenType::Number, token.source(), start, token.end));
            continue;
        }
        out.push(token);
    }
    out
}

fn last_significant(tokens: &[Token<'_>]) -> Option<usize> {
    tokens
        .iter()
        .rposition(|t| t.token_type != TokenType::Whitespace)
}

#[test]
fn test_function_start_carries_name() {
    let tokens = tokenize("count()");
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].token_type, TokenType::FunctionStart);
    assert_eq!(tokens[0].function_name(), "count");
    assert_eq!(tokens[1].token_type, TokenType::FunctionEnd);
}

#[test]
fn test_quote_inside_string_is_not_an_operator() {
    let tokens = tokenize("'a+b' + 'c'");
    let kinds: Vec<_> = tokens.iter().map(|t| t.token_type).collect();
    assert_eq!(
        kinds,
        vec![
            TokenType::String,
            TokenType::Whitespace,
            TokenType::Plus,
            TokenType::Whitespace,
            TokenType::String
        ]
    );
}
