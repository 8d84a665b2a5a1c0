use crate::config::InterpreterConfig;
use crate::environment::{Scope, ScopeError};
use crate::source::Span;
use crate::types::{Node, NodeKind};
use crate::value::{Closure, Procedure, Value};
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace};

// Headroom left on the native stack before `evaluate` moves onto a fresh segment.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

// --- Evaluation Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Scope(#[from] ScopeError), // Unbound names and writes to the sealed root
    #[error("Evaluation Error: Expected a function, but got: {0}")]
    NotCallable(Value, Span),
    #[error("Type mismatch: '{name}' expects {expected}, got {found}")]
    TypeMismatch {
        name: &'static str,
        expected: &'static str,
        found: &'static str,
        span: Span,
    },
    #[error("Evaluation Error: '{0}' called on an empty list")]
    EmptyList(&'static str, Span),
    #[error("Evaluation Error: Invalid arguments - {0}")]
    InvalidArguments(String, Span), // Arity mismatch
    #[error("Evaluation Error: Cannot evaluate an empty form")]
    EmptyForm(Span),
    #[error("Evaluation Error: Integer overflow in '{0}'")]
    IntegerOverflow(&'static str, Span),
    #[error("Recursion limit exceeded: more than {0} nested calls")]
    RecursionLimit(usize, Span),
    #[error("Failed to write output: {0}")]
    Output(String),
}

impl EvalError {
    pub fn span(&self) -> Span {
        match self {
            EvalError::Scope(scope_err) => scope_err.span(),
            EvalError::NotCallable(_, span)
            | EvalError::TypeMismatch { span, .. }
            | EvalError::EmptyList(_, span)
            | EvalError::InvalidArguments(_, span)
            | EvalError::EmptyForm(span)
            | EvalError::IntegerOverflow(_, span)
            | EvalError::RecursionLimit(_, span) => *span,
            EvalError::Output(_) => Span::default(),
        }
    }
}

impl From<io::Error> for EvalError {
    fn from(err: io::Error) -> Self {
        EvalError::Output(err.to_string())
    }
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

/// Tree-walking evaluator. Owns the sealed root scope, the `print` sink and
/// the call-depth counter.
pub struct Interpreter {
    config: InterpreterConfig,
    root: Rc<RefCell<Scope>>,
    output: Box<dyn Write>,
    depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Interpreter {
            config,
            root: Scope::new_root_populated(),
            output: Box::new(io::stdout()),
            depth: 0,
        }
    }

    /// Redirects `print` output, e.g. into a buffer for tests.
    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn root_scope(&self) -> Rc<RefCell<Scope>> {
        self.root.clone()
    }

    /// A fresh child of the root scope for one program run.
    pub fn session_scope(&self) -> Rc<RefCell<Scope>> {
        Scope::new_enclosed(self.root.clone())
    }

    /// Current closure nesting; zero between top-level evaluations.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Evaluates each top-level node in order in a fresh session scope.
    pub fn evaluate_root(&mut self, forest: &[Node]) -> EvalResult<Vec<Value>> {
        let scope = self.session_scope();
        self.evaluate_all(forest, &scope)
    }

    /// Evaluates nodes in order against one shared scope, so `def`s carry forward.
    pub fn evaluate_all(
        &mut self,
        forest: &[Node],
        scope: &Rc<RefCell<Scope>>,
    ) -> EvalResult<Vec<Value>> {
        forest.iter().map(|node| self.evaluate(node, scope)).collect()
    }

    /// Evaluates a single node within the given scope. Deep nesting grows the
    /// native stack on the heap, so only `max_call_depth` bounds recursion.
    pub fn evaluate(&mut self, node: &Node, scope: &Rc<RefCell<Scope>>) -> EvalResult {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || {
            self.evaluate_node(node, scope)
        })
    }

    fn evaluate_node(&mut self, node: &Node, scope: &Rc<RefCell<Scope>>) -> EvalResult {
        match &node.kind {
            NodeKind::Integer(n) => Ok(Value::Integer(*n)),
            NodeKind::Symbol(name) => Ok(Value::Symbol(name.clone())),
            NodeKind::Identifier(name) => Ok(scope.borrow().get(name, node.span)?),
            // Not run here: the body only executes when the closure is applied.
            NodeKind::Lambda(body) => Ok(Value::Function(Procedure::Closure(Rc::new(
                Closure::new(body.clone(), scope.clone(), node.span),
            )))),
            NodeKind::List(children) => self.evaluate_call(children, scope, node.span),
        }
    }

    /// Head evaluates to the callee, then every argument is evaluated eagerly,
    /// left to right, before the call.
    fn evaluate_call(
        &mut self,
        children: &[Node],
        scope: &Rc<RefCell<Scope>>,
        span: Span,
    ) -> EvalResult {
        let [head, operands @ ..] = children else {
            return Err(EvalError::EmptyForm(span));
        };

        let procedure = match self.evaluate(head, scope)? {
            Value::Function(procedure) => procedure,
            other => return Err(EvalError::NotCallable(other, head.span)),
        };

        let mut args = Vec::with_capacity(operands.len());
        for operand in operands {
            args.push(self.evaluate(operand, scope)?);
        }

        self.apply(&procedure, args, scope, span)
    }

    /// Invokes a function value with already-evaluated arguments.
    pub fn apply(
        &mut self,
        procedure: &Procedure,
        args: Vec<Value>,
        scope: &Rc<RefCell<Scope>>,
        span: Span,
    ) -> EvalResult {
        match procedure {
            Procedure::Primitive(func, _) => func(self, args, scope, span),
            Procedure::Closure(closure) => self.invoke_closure(closure, args, span),
        }
    }

    // The frame hangs off the scope captured at definition, not the caller's.
    fn invoke_closure(&mut self, closure: &Closure, args: Vec<Value>, span: Span) -> EvalResult {
        if self.depth >= self.config.max_call_depth {
            debug!(limit = self.config.max_call_depth, "recursion limit reached");
            return Err(EvalError::RecursionLimit(self.config.max_call_depth, span));
        }

        let frame = Scope::new_enclosed(closure.env.clone());
        {
            let mut frame = frame.borrow_mut();
            for (index, arg) in args.into_iter().enumerate() {
                frame.define(format!("%{}", index), arg, span)?;
            }
        }
        trace!(depth = self.depth, span = %closure.span, "invoking closure");

        self.depth += 1;
        let result = self.evaluate_call(&closure.body, &frame, closure.span);
        self.depth -= 1;
        result
    }

    /// Writes one line to the `print` sink.
    pub fn write_line(&mut self, text: &str) -> EvalResult<()> {
        writeln!(self.output, "{}", text)?;
        self.output.flush()?;
        Ok(())
    }
}

/// Evaluates a parsed program with a default interpreter writing to stdout.
pub fn evaluate_root(forest: &[Node]) -> EvalResult<Vec<Value>> {
    Interpreter::new().evaluate_root(forest)
}
