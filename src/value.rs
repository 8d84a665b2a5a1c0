use crate::environment::Scope;
use crate::evaluator::{EvalResult, Interpreter};
use crate::source::Span;
use crate::types::Node;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub const TRUE: &str = "true";
pub const FALSE: &str = "false";
pub const NIL: &str = "nil";

/// A runtime value. Produced only by evaluation, never by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Symbol(String), // `true`, `false` and `nil` double as sentinels
    List(Vec<Value>),
    Function(Procedure),
}

impl Value {
    pub fn symbol(name: impl Into<String>) -> Value {
        Value::Symbol(name.into())
    }

    pub fn nil() -> Value {
        Value::symbol(NIL)
    }

    pub fn boolean(b: bool) -> Value {
        Value::symbol(if b { TRUE } else { FALSE })
    }

    /// Only the exact `true` symbol counts as true.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Symbol(s) if s == TRUE)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Function(_) => "function",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "(")?;
                let mut first = true;
                for item in items {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                    first = false;
                }
                write!(f, ")")
            }
            Value::Function(procedure) => write!(f, "{}", procedure),
        }
    }
}

/// Built-ins receive the interpreter (for output, nested calls and the depth
/// counter), the already-evaluated arguments, the caller's scope and the span
/// of the call form.
pub type PrimitiveFunc =
    fn(&mut Interpreter, Vec<Value>, &Rc<RefCell<Scope>>, Span) -> EvalResult;

#[derive(Clone)]
pub enum Procedure {
    Primitive(PrimitiveFunc, &'static str), // The function pointer and its name
    Closure(Rc<Closure>),
}

/// A `#(...)` form paired with the scope it was evaluated in.
pub struct Closure {
    pub body: Rc<[Node]>,
    pub env: Rc<RefCell<Scope>>,
    pub span: Span,
}

impl Closure {
    pub fn new(body: Rc<[Node]>, env: Rc<RefCell<Scope>>, span: Span) -> Self {
        Closure { body, env, span }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Primitive(_, name) => write!(f, "#<primitive:{}>", name),
            Procedure::Closure(_) => write!(f, "#<lambda>"),
        }
    }
}

// The captured scope can hold this very closure, so Debug must not walk it.
impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Primitive(_, name) => write!(f, "Primitive({})", name),
            Procedure::Closure(closure) => {
                write!(f, "Closure(#(")?;
                let mut first = true;
                for node in closure.body.iter() {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", node)?;
                    first = false;
                }
                write!(f, "))")
            }
        }
    }
}

// Primitives compare by name, closures by identity.
impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Procedure::Primitive(_, n1), Procedure::Primitive(_, n2)) => n1 == n2,
            (Procedure::Closure(c1), Procedure::Closure(c2)) => Rc::ptr_eq(c1, c2),
            _ => false,
        }
    }
}
