use std::io;
use std::ops::Range;

use ariadne::{Label, Report, ReportKind, Source};

use crate::{Error, EvalError, LexerError, ParseError, ScopeError, Span};

fn build<'a>(
    name: &'a str,
    span: Span,
    message: String,
    label: String,
) -> Report<'a, (&'a str, Range<usize>)> {
    Report::build(ReportKind::Error, (name, span.to_range()))
        .with_message(message)
        .with_label(Label::new((name, span.to_range())).with_message(label))
        .finish()
}

impl LexerError {
    pub fn pretty_print(&self, name: &str, input: &str) -> io::Result<()> {
        build(
            name,
            self.span,
            "Lexer Error".to_string(),
            self.error.to_string(),
        )
        .eprint((name, Source::from(input)))
    }
}

impl ParseError {
    pub fn pretty_print(&self, name: &str, input: &str) -> io::Result<()> {
        let report = match self {
            ParseError::LexerError(lex_err) => return lex_err.pretty_print(name, input),
            ParseError::UnbalancedParen(span) => build(
                name,
                *span,
                "Unclosed parenthesis".to_string(),
                "This opener has no matching ')'".to_string(),
            ),
            ParseError::UnexpectedClose(span) => build(
                name,
                *span,
                "Unexpected ')'".to_string(),
                "Nothing is open here".to_string(),
            ),
            ParseError::NestingTooDeep(span) => build(
                name,
                *span,
                "Nesting too deep".to_string(),
                format!(
                    "Brackets nest more than {} levels here",
                    crate::parser::MAX_NESTING
                ),
            ),
        };
        report.eprint((name, Source::from(input)))
    }
}

impl EvalError {
    pub fn pretty_print(&self, name: &str, input: &str) -> io::Result<()> {
        let span = self.span();
        let report = match self {
            EvalError::Scope(ScopeError::UnboundName(symbol, _)) => build(
                name,
                span,
                format!("Unbound name `{}`", symbol),
                "This name is not defined in the current scope".to_string(),
            ),
            EvalError::Scope(ScopeError::Sealed(symbol, _)) => build(
                name,
                span,
                format!("Cannot define `{}`", symbol),
                "Built-ins live in a read-only scope".to_string(),
            ),
            EvalError::NotCallable(value, _) => build(
                name,
                span,
                format!("Not a function: {}", value),
                format!("This evaluates to a {}, which cannot be called", value.type_name()),
            ),
            EvalError::TypeMismatch {
                name: primitive,
                expected,
                found,
                ..
            } => build(
                name,
                span,
                format!("Type mismatch in `{}`", primitive),
                format!("Expected {}, found {}", expected, found),
            ),
            EvalError::EmptyList(primitive, _) => build(
                name,
                span,
                format!("`{}` of an empty list", primitive),
                "This list has no elements".to_string(),
            ),
            EvalError::InvalidArguments(message, _) => build(
                name,
                span,
                "Invalid arguments".to_string(),
                message.clone(),
            ),
            EvalError::EmptyForm(_) => build(
                name,
                span,
                "Empty form".to_string(),
                "A call needs a function in head position".to_string(),
            ),
            EvalError::IntegerOverflow(primitive, _) => build(
                name,
                span,
                format!("Integer overflow in `{}`", primitive),
                "The result does not fit in 64 bits".to_string(),
            ),
            EvalError::RecursionLimit(limit, _) => build(
                name,
                span,
                "Recursion limit exceeded".to_string(),
                format!("More than {} nested calls; is a base case missing?", limit),
            ),
            EvalError::Output(message) => build(
                name,
                span,
                "Output error".to_string(),
                message.clone(),
            ),
        };
        report.eprint((name, Source::from(input)))
    }
}

impl Error {
    pub fn pretty_print(&self, name: &str, input: &str) -> io::Result<()> {
        match self {
            Error::Lexer(lex_err) => lex_err.pretty_print(name, input),
            Error::Parse(parse_err) => parse_err.pretty_print(name, input),
            Error::Eval(eval_err) => eval_err.pretty_print(name, input),
        }
    }
}
