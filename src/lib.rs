// Declare modules publicly so they are part of the library interface
pub mod config;
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod source;
pub mod types;
pub mod value;

pub use config::InterpreterConfig;
pub use environment::{Scope, ScopeError};
pub use evaluator::{EvalError, EvalResult, Interpreter, evaluate_root};
pub use lexer::{Lexer, LexerError, LexerErrorKind, Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, parse, parse_str};
pub use source::Span;
pub use types::{Node, NodeKind};
pub use value::{Procedure, Value};

use thiserror::Error;

/// Any failure along the text → tokens → AST → values pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("Lexer Error: {0}")]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl Error {
    pub fn span(&self) -> Span {
        match self {
            Error::Lexer(lex_err) => lex_err.span,
            Error::Parse(parse_err) => parse_err.span(),
            Error::Eval(eval_err) => eval_err.span(),
        }
    }
}

/// Tokenizes, parses and evaluates `source` with a default interpreter.
pub fn run(source: &str) -> Result<Vec<Value>, Error> {
    run_with(&mut Interpreter::new(), source)
}

/// Like [`run`], on a caller-supplied interpreter (custom output or limits).
pub fn run_with(interpreter: &mut Interpreter, source: &str) -> Result<Vec<Value>, Error> {
    let tokens = tokenize(source)?;
    let forest = parse(&tokens)?;
    Ok(interpreter.evaluate_root(&forest)?)
}
