use crate::Span;
use crate::lexer::{LexerError, Token, TokenKind};
use crate::types::Node;
use thiserror::Error;

/// Deepest bracket nesting the recursive parser will descend into.
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Parse Error [at {0}]: Unclosed parenthesis")]
    UnbalancedParen(Span), // Span of the opener that never closes
    #[error("Parse Error [at {0}]: Unexpected ')' with no matching opener")]
    UnexpectedClose(Span),
    #[error("Parse Error [at {0}]: Nesting deeper than {max} levels", max = MAX_NESTING)]
    NestingTooDeep(Span),
    #[error("Lexer Error during parse: {0}")]
    LexerError(#[from] LexerError), // Propagate lexer errors when parsing directly from a string
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnbalancedParen(span)
            | ParseError::UnexpectedClose(span)
            | ParseError::NestingTooDeep(span) => *span,
            ParseError::LexerError(lex_err) => lex_err.span,
        }
    }
}

// Result type alias for convenience
pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'t, 'src> {
    tokens: &'t [Token<'src>],
}

impl<'t, 'src> Parser<'t, 'src> {
    pub fn new(tokens: &'t [Token<'src>]) -> Self {
        Parser { tokens }
    }

    /// Parses every top-level form in the token stream.
    pub fn parse(self) -> ParseResult<Vec<Node>> {
        parse_sequence(self.tokens, 0)
    }
}

/// Parses a run of sibling forms. Each bracketed form is delimited by depth
/// counting and its interior is parsed by a recursive call.
fn parse_sequence(tokens: &[Token<'_>], nesting: usize) -> ParseResult<Vec<Node>> {
    let mut nodes = Vec::new();
    let mut index = 0;
    while let Some(token) = tokens.get(index) {
        match token.kind {
            kind if kind.is_open() => {
                if nesting >= MAX_NESTING {
                    return Err(ParseError::NestingTooDeep(token.span));
                }
                let close = matching_close(tokens, index)?;
                let children = parse_sequence(&tokens[index + 1..close], nesting + 1)?;
                let span = token.span.merge(tokens[close].span);
                nodes.push(if kind == TokenKind::LambdaOpen {
                    Node::new_lambda(children, span)
                } else {
                    Node::new_list(children, span)
                });
                index = close + 1;
            }
            TokenKind::RParen => return Err(ParseError::UnexpectedClose(token.span)),
            TokenKind::Integer(n) => {
                nodes.push(Node::new_integer(n, token.span));
                index += 1;
            }
            _ => {
                nodes.push(match token.text.strip_prefix(':') {
                    Some(name) => Node::new_symbol(name, token.span),
                    None => Node::new_identifier(token.text, token.span),
                });
                index += 1;
            }
        }
    }
    Ok(nodes)
}

/// Index of the `)` matching the opener at `open`. Depth starts at 1 after the
/// opener and the match is where it drops back to 0.
fn matching_close(tokens: &[Token<'_>], open: usize) -> ParseResult<usize> {
    let mut depth = 1usize;
    for (offset, token) in tokens[open + 1..].iter().enumerate() {
        if token.kind.is_open() {
            depth += 1;
        } else if token.kind == TokenKind::RParen {
            depth -= 1;
            if depth == 0 {
                return Ok(open + 1 + offset);
            }
        }
    }
    Err(ParseError::UnbalancedParen(tokens[open].span))
}

pub fn parse(tokens: &[Token<'_>]) -> ParseResult<Vec<Node>> {
    Parser::new(tokens).parse()
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Vec<Node>> {
    let tokens = crate::lexer::tokenize(input)?;
    parse(&tokens)
}
