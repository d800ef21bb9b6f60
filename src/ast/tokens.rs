/// Classification of a lexed span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// Single-quoted string literal, quotes included
    ///
    /// # Examples
    /// ```text
    /// 'hello'
    /// 'it''s'
    /// ```
    String,

    /// Field reference
    ///
    /// # Examples
    /// ```text
    /// ${EventTime}
    /// ```
    FieldRef,

    /// Opening bracket, together with the function name before it (if any)
    ///
    /// # Examples
    /// ```text
    /// count(
    /// (
    /// ```
    FunctionStart,

    /// `)`
    FunctionEnd,

    /// `,`
    Comma,

    // Arithmetic operators
    /// `^`
    Order,
    /// `/`
    Division,
    /// `*`
    Multiplication,
    /// `%`
    Modulus,
    /// `+`
    Plus,
    /// `-`
    Minus,

    // Equality operators
    /// `=`
    Equals,
    /// `!=`
    NotEquals,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqualTo,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqualTo,

    Whitespace,

    /// Unsigned, or negative after sign folding
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 3.14
    /// -10
    /// ```
    Number,

    /// Anything the lexer could not classify
    Unidentified,
}

impl TokenType {
    pub fn is_operator(self) -> bool {
        self.is_arithmetic() || self.is_equality()
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            TokenType::Order
                | TokenType::Division
                | TokenType::Multiplication
                | TokenType::Modulus
                | TokenType::Plus
                | TokenType::Minus
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(
            self,
            TokenType::Equals
                | TokenType::NotEquals
                | TokenType::GreaterThan
                | TokenType::GreaterThanOrEqualTo
                | TokenType::LessThan
                | TokenType::LessThanOrEqualTo
        )
    }

    /// Tokens after which a `-` must be a subtraction
    pub fn ends_operand(self) -> bool {
        matches!(
            self,
            TokenType::Number | TokenType::String | TokenType::FieldRef | TokenType::FunctionEnd
        )
    }
}

/// A classified slice of the formula text.
///
/// Tokens borrow the source; `start..end` is a byte range into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub token_type: TokenType,
    pub start: usize,
    pub end: usize,
    source: &'a str,
}

impl<'a> Token<'a> {
    pub fn new(token_type: TokenType, source: &'a str, start: usize, end: usize) -> Self {
        Token {
            token_type,
            start,
            end,
            source,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn text(&self) -> &'a str {
        &self.source[self.start..self.end]
    }

    /// Function name for a [`TokenType::FunctionStart`] token; empty for a
    /// bare bracket.
    pub fn function_name(&self) -> &'a str {
        let text = self.text();
        text.strip_suffix('(').unwrap_or(text)
    }

    /// Contents of a string literal with doubled quotes unescaped
    pub fn unquoted(&self) -> String {
        let text = self.text();
        let inner = text
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
            .unwrap_or(text);
        inner.replace("''", "'")
    }

    /// Field name inside a `${...}` reference
    pub fn field_name(&self) -> &'a str {
        let text = self.text();
        text.strip_prefix("${")
            .and_then(|t| t.strip_suffix('}'))
            .unwrap_or(text)
    }
}
