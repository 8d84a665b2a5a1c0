use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::Span;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\n\r\f]+")] // Skip whitespace
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("#(")]
    LambdaOpen,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[regex(r"[0-9]+", |lex| {
        let slice = lex.slice();
        slice
            .parse::<i64>()
            .map_err(|_| LexerErrorKind::IntegerOverflow(slice.to_string()))
    })]
    Integer(i64),
    // Covers plain names, `:symbol` literals and positional arguments like `%0`
    #[regex(r"[a-zA-Z:%][a-zA-Z0-9:%]*")]
    Identifier,
}

impl TokenKind {
    /// True for both `(` and `#(`.
    pub fn is_open(self) -> bool {
        matches!(self, TokenKind::LParen | TokenKind::LambdaOpen)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LambdaOpen => write!(f, "#("),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Identifier => write!(f, "identifier"),
        }
    }
}

/// A lexical unit borrowing its text from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub span: Span,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Error)]
pub enum LexerErrorKind {
    #[error("Invalid character encountered: '{0}'")]
    InvalidCharacter(char),
    #[error("Integer literal out of range: '{0}'")]
    IntegerOverflow(String),
    #[default]
    #[error("Invalid Token")]
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error} at position {}", .span.start)]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
}

impl LexerError {
    /// Byte offset of the offending input.
    pub fn position(&self) -> usize {
        self.span.start
    }
}

// Result type alias for convenience
pub type LexerResult<T> = Result<T, LexerError>;

/// Lazy token stream over a source string. Stops for good after the first error.
pub struct Lexer<'src> {
    inner: logos::SpannedIter<'src, TokenKind>,
    source: &'src str,
    failed: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer {
            inner: TokenKind::lexer(source).spanned(),
            source,
            failed: false,
        }
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = LexerResult<Token<'src>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (result, range) = self.inner.next()?;
        match result {
            Ok(kind) => Some(Ok(Token {
                kind,
                text: self.source.get(range.clone()).unwrap_or_default(),
                span: Span::new(range.start, range.end),
            })),
            Err(error) => {
                self.failed = true;
                let offending = self.source.get(range.start..).and_then(|s| s.chars().next());
                let (error, span) = match (error, offending) {
                    (LexerErrorKind::InvalidToken, Some(c)) => (
                        LexerErrorKind::InvalidCharacter(c),
                        Span::new(range.start, range.start + c.len_utf8()),
                    ),
                    (error, _) => (error, Span::new(range.start, range.end)),
                };
                Some(Err(LexerError { error, span }))
            }
        }
    }
}

// Helper function to tokenize a string directly (useful for tests and parser)
pub fn tokenize(input: &str) -> LexerResult<Vec<Token<'_>>> {
    Lexer::new(input).collect()
}
